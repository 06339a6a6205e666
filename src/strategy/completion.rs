//! Completion-queue strategies: tasks run on a bounded pool and report to one coordinator through
//! a completion channel. No thread ever waits on another task, only the coordinator waits.
//!
//! - [`CompletionQueue`]: tasks submit their own subdirectory tasks and keep an atomic pending
//!   count; the coordinator only sums and decrements.
//! - [`CompletionRelay`]: tasks only list; the coordinator submits every task and keeps the
//!   pending count as a plain local.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use log::debug;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use crate::StrategyKind;
use crate::engine::reducer::merge;
use crate::error::{AbsorbedErrorKind, AggregateError};
use crate::pipeline::{
    DirScan, PoolHandle, ScopedPool, TraversalContext, panic_message, scan_dir, scan_dir_owned,
};
use crate::utils::config::PoolConsts;

use super::Aggregator;

/// How a task ended. Panics are absorbed by the coordinator; fatal errors end the call.
enum TaskFailure {
    Panicked(String),
    Fatal(AggregateError),
}

struct Completion<T> {
    dir: PathBuf,
    result: Result<T, TaskFailure>,
}

/// Run `f`, turning a panic into [`TaskFailure::Panicked`].
fn run_guarded<T>(f: impl FnOnce() -> Result<T, AggregateError>) -> Result<T, TaskFailure> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) => Err(TaskFailure::Fatal(e)),
        Err(payload) => Err(TaskFailure::Panicked(panic_message(payload.as_ref()))),
    }
}

/// Next completion, or None once the call is stopping. Waits in deadline-bounded slices.
fn next_completion<T>(
    ctx: &TraversalContext,
    done_rx: &Receiver<Completion<T>>,
) -> Result<Option<Completion<T>>, AggregateError> {
    loop {
        let wait = ctx
            .cancel
            .wait_slice(PoolConsts::COORDINATOR_POLL_INTERVAL);
        match done_rx.recv_timeout(wait) {
            Ok(c) => return Ok(Some(c)),
            Err(RecvTimeoutError::Timeout) => {
                if ctx.cancel.should_stop() {
                    return Ok(None);
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(AggregateError::scheduling("completion channel closed"));
            }
        }
    }
}

// ---- Completion-queue: tasks submit, atomic pending ----

#[derive(Clone, Copy, Debug, Default)]
pub struct CompletionQueue;

impl Aggregator for CompletionQueue {
    fn kind(&self) -> StrategyKind {
        StrategyKind::CompletionQueue
    }

    fn aggregate(&self, ctx: &TraversalContext, root: &Path) -> Result<u64, AggregateError> {
        let pending = AtomicUsize::new(0);
        let (done_tx, done_rx) = unbounded::<Completion<u64>>();
        thread::scope(|s| {
            let pool = ScopedPool::spawn(s, ctx.parallelism, "cq")?;
            ctx.notify_pool_started(pool.size());
            let result = coordinate(ctx, &pool.handle(), &pending, &done_tx, &done_rx, root);
            if let Err(e) = &result {
                ctx.cancel.abort_with(e.clone());
            }
            pool.shutdown()?;
            ctx.notify_pending(pending.load(Ordering::Acquire));
            result
        })
    }
}

fn coordinate<'env>(
    ctx: &'env TraversalContext,
    pool: &PoolHandle<'env>,
    pending: &'env AtomicUsize,
    done_tx: &'env Sender<Completion<u64>>,
    done_rx: &Receiver<Completion<u64>>,
    root: &Path,
) -> Result<u64, AggregateError> {
    submit(ctx, pool, pending, done_tx, root.to_path_buf())?;

    let mut total = 0_u64;
    while pending.load(Ordering::Acquire) > 0 {
        let Some(completion) = next_completion(ctx, done_rx)? else {
            debug!(
                "Coordinator stopping with {} tasks pending",
                pending.load(Ordering::Acquire)
            );
            break;
        };
        match completion.result {
            Ok(partial) => total = merge(total, partial),
            Err(TaskFailure::Panicked(msg)) => {
                ctx.errors
                    .record(&completion.dir, AbsorbedErrorKind::TaskFailed, &msg)
            }
            Err(TaskFailure::Fatal(e)) => return Err(e),
        }
        // Only after the task's own submissions were counted, so this cannot hit 0 early.
        let left = pending.fetch_sub(1, Ordering::AcqRel) - 1;
        ctx.notify_pending(left);
    }
    Ok(total)
}

/// Count the task as pending, then submit it. The count is undone if submission fails.
fn submit<'env>(
    ctx: &'env TraversalContext,
    pool: &PoolHandle<'env>,
    pending: &'env AtomicUsize,
    done_tx: &'env Sender<Completion<u64>>,
    dir: PathBuf,
) -> Result<(), AggregateError> {
    let now = pending.fetch_add(1, Ordering::AcqRel) + 1;
    ctx.notify_pending(now);
    let task_pool = pool.clone();
    pool.submit(move || {
        let result = run_guarded(|| list_and_submit(ctx, &task_pool, pending, done_tx, &dir));
        let _ = done_tx.send(Completion { dir, result });
    })
    .inspect_err(|_| {
        let left = pending.fetch_sub(1, Ordering::AcqRel) - 1;
        ctx.notify_pending(left);
    })
}

fn list_and_submit<'env>(
    ctx: &'env TraversalContext,
    pool: &PoolHandle<'env>,
    pending: &'env AtomicUsize,
    done_tx: &'env Sender<Completion<u64>>,
    dir: &Path,
) -> Result<u64, AggregateError> {
    if ctx.cancel.should_stop() {
        return Ok(0);
    }
    let mut subdirs = Vec::new();
    let partial = scan_dir(ctx, dir, &mut subdirs);
    for sub in subdirs {
        submit(ctx, pool, pending, done_tx, sub)?;
    }
    Ok(partial)
}

// ---- Completion-relay: coordinator submits, no shared counters ----

#[derive(Clone, Copy, Debug, Default)]
pub struct CompletionRelay;

impl Aggregator for CompletionRelay {
    fn kind(&self) -> StrategyKind {
        StrategyKind::CompletionRelay
    }

    fn aggregate(&self, ctx: &TraversalContext, root: &Path) -> Result<u64, AggregateError> {
        let (done_tx, done_rx) = unbounded::<Completion<DirScan>>();
        thread::scope(|s| {
            let pool = ScopedPool::spawn(s, ctx.parallelism, "relay")?;
            ctx.notify_pool_started(pool.size());
            let result = relay(ctx, &pool.handle(), &done_tx, &done_rx, root);
            if let Err(e) = &result {
                ctx.cancel.abort_with(e.clone());
            }
            pool.shutdown()?;
            result
        })
    }
}

fn relay<'env>(
    ctx: &'env TraversalContext,
    pool: &PoolHandle<'env>,
    done_tx: &'env Sender<Completion<DirScan>>,
    done_rx: &Receiver<Completion<DirScan>>,
    root: &Path,
) -> Result<u64, AggregateError> {
    let submit_scan = move |dir: PathBuf| {
        pool.submit(move || {
            let result = run_guarded(|| {
                if ctx.cancel.should_stop() {
                    return Ok(DirScan::default());
                }
                Ok(scan_dir_owned(ctx, &dir))
            });
            let _ = done_tx.send(Completion { dir, result });
        })
    };

    let mut pending = 1_usize;
    ctx.notify_pending(pending);
    submit_scan(root.to_path_buf())?;

    let mut total = 0_u64;
    while pending > 0 {
        let Some(completion) = next_completion(ctx, done_rx)? else {
            debug!("Relay stopping with {} tasks pending", pending);
            break;
        };
        match completion.result {
            Ok(scan) => {
                total = merge(total, scan.partial);
                pending += scan.subdirs.len();
                for sub in scan.subdirs {
                    submit_scan(sub)?;
                }
            }
            Err(TaskFailure::Panicked(msg)) => {
                ctx.errors
                    .record(&completion.dir, AbsorbedErrorKind::TaskFailed, &msg)
            }
            Err(TaskFailure::Fatal(e)) => return Err(e),
        }
        pending -= 1;
        ctx.notify_pending(pending);
    }
    Ok(total)
}
