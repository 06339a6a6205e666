//! Producer-consumer queue: a fixed set of workers share a channel of directory paths, an atomic
//! running total and an atomic pending count.
//!
//! A directory is pending from the moment it is counted (just before it is enqueued) until the
//! worker that dequeued it has finished, its own enqueues included. Workers that find the queue
//! empty keep polling while anything is pending, since in-flight directories may still produce
//! work; they exit once pending reaches 0.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use log::debug;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread;

use crate::StrategyKind;
use crate::error::AggregateError;
use crate::pipeline::{TraversalContext, scan_dir};
use crate::utils::config::{PackagePaths, PoolConsts};

use super::Aggregator;

#[derive(Clone, Copy, Debug, Default)]
pub struct Queue;

impl Aggregator for Queue {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Queue
    }

    fn aggregate(&self, ctx: &TraversalContext, root: &Path) -> Result<u64, AggregateError> {
        let shared = Shared {
            ctx,
            total: AtomicU64::new(0),
            pending: AtomicUsize::new(0),
        };
        let (tx, rx) = unbounded::<PathBuf>();
        shared.enqueue(&tx, root.to_path_buf());

        let dead = thread::scope(|s| {
            let mut workers = Vec::with_capacity(ctx.parallelism);
            for i in 0..ctx.parallelism.max(1) {
                let (tx, rx) = (tx.clone(), rx.clone());
                let shared = &shared;
                let spawned = thread::Builder::new()
                    .name(PackagePaths::get().thread_name("queue", i))
                    .spawn_scoped(s, move || shared.worker_loop(&tx, &rx));
                match spawned {
                    Ok(handle) => workers.push(handle),
                    Err(e) => {
                        // Started workers see the stop and drain out; the scope joins them.
                        let err = AggregateError::scheduling(format!(
                            "spawn queue worker {}: {}",
                            i, e
                        ));
                        ctx.cancel.abort_with(err.clone());
                        return Err(err);
                    }
                }
            }
            ctx.notify_pool_started(workers.len());
            Ok(workers
                .into_iter()
                .map(|w| w.join())
                .filter(Result::is_err)
                .count())
        })?;

        ctx.notify_pending(shared.pending.load(Ordering::Acquire));
        if dead > 0 {
            return Err(AggregateError::scheduling(format!(
                "{} queue worker(s) died",
                dead
            )));
        }
        Ok(shared.total.load(Ordering::Acquire))
    }
}

/// Call-scoped state shared by the workers of one traversal.
struct Shared<'a> {
    ctx: &'a TraversalContext,
    total: AtomicU64,
    pending: AtomicUsize,
}

impl Shared<'_> {
    /// Count `dir` as pending, then enqueue it.
    fn enqueue(&self, tx: &Sender<PathBuf>, dir: PathBuf) {
        let now = self.pending.fetch_add(1, Ordering::AcqRel) + 1;
        self.ctx.notify_pending(now);
        if tx.send(dir).is_err() {
            self.finish_one();
        }
    }

    fn finish_one(&self) {
        let left = self.pending.fetch_sub(1, Ordering::AcqRel) - 1;
        self.ctx.notify_pending(left);
    }

    fn worker_loop(&self, tx: &Sender<PathBuf>, rx: &Receiver<PathBuf>) {
        let ctx = self.ctx;
        let mut subdirs = Vec::new();
        loop {
            match rx.recv_timeout(PoolConsts::QUEUE_POLL_INTERVAL) {
                Ok(dir) => {
                    let _done = PendingGuard(self);
                    if ctx.cancel.should_stop() {
                        // Drain without listing so pending still reaches 0.
                        continue;
                    }
                    let partial = scan_dir(ctx, &dir, &mut subdirs);
                    self.total.fetch_add(partial, Ordering::AcqRel);
                    for sub in subdirs.drain(..) {
                        self.enqueue(tx, sub);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if self.pending.load(Ordering::Acquire) == 0 {
                        break;
                    }
                    if ctx.cancel.should_stop() {
                        debug!("Queue worker stopping early");
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }
}

/// Marks the dequeued directory finished on every exit path, unwinding included.
struct PendingGuard<'s, 'a>(&'s Shared<'a>);

impl Drop for PendingGuard<'_, '_> {
    fn drop(&mut self) {
        self.0.finish_one();
    }
}
