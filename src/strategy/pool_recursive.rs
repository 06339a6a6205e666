//! Fork-wait on a bounded pool: every directory task submits one task per subdirectory, then
//! blocks until all of them have answered.
//!
//! A bounded pool whose workers block on their children stalls once every worker waits on a
//! child that no worker is free to run. Each child job therefore carries a claim flag: a waiting
//! parent first claims and runs inline any child no worker has started, and only waits on
//! children that are already running elsewhere. Nesting is bounded by tree depth.

use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};
use log::{debug, error};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

use crate::StrategyKind;
use crate::engine::reducer::merge;
use crate::error::AggregateError;
use crate::pipeline::{PoolHandle, ScopedPool, TraversalContext, scan_dir};
use crate::utils::config::PoolConsts;

use super::Aggregator;

type TaskResult = Result<u64, AggregateError>;

#[derive(Clone, Copy, Debug, Default)]
pub struct PoolRecursive;

impl Aggregator for PoolRecursive {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PoolRecursive
    }

    fn aggregate(&self, ctx: &TraversalContext, root: &Path) -> Result<u64, AggregateError> {
        thread::scope(|s| {
            let pool = ScopedPool::spawn(s, ctx.parallelism, "pr")?;
            ctx.notify_pool_started(pool.size());
            let result = run_task(ctx, &pool.handle(), root);
            if let Err(e) = &result {
                ctx.cancel.abort_with(e.clone());
            }
            pool.shutdown()?;
            result
        })
    }
}

/// A submitted subdirectory. Whoever flips `claimed` first runs it.
struct ChildSlot {
    dir: PathBuf,
    claimed: AtomicBool,
}

impl ChildSlot {
    fn claim(&self) -> bool {
        !self.claimed.swap(true, Ordering::AcqRel)
    }
}

struct Child {
    slot: Arc<ChildSlot>,
    rx: Receiver<TaskResult>,
}

/// Listing → Dispatching → Awaiting → Done for one directory.
fn run_task<'env>(ctx: &'env TraversalContext, pool: &PoolHandle<'env>, dir: &Path) -> TaskResult {
    if ctx.cancel.should_stop() {
        return Ok(0);
    }

    let mut subdirs = Vec::new();
    let mut total = scan_dir(ctx, dir, &mut subdirs);

    let mut children = Vec::with_capacity(subdirs.len());
    for sub in subdirs {
        children.push(dispatch(ctx, pool, sub)?);
    }

    // Workers take jobs from the front of the queue; take ours from the back.
    for child in children.into_iter().rev() {
        let value = if child.slot.claim() {
            run_task(ctx, pool, &child.slot.dir)?
        } else {
            await_child(ctx, &child)?
        };
        total = merge(total, value);
    }
    Ok(total)
}

fn dispatch<'env>(
    ctx: &'env TraversalContext,
    pool: &PoolHandle<'env>,
    dir: PathBuf,
) -> Result<Child, AggregateError> {
    let slot = Arc::new(ChildSlot {
        dir,
        claimed: AtomicBool::new(false),
    });
    let (tx, rx) = bounded::<TaskResult>(1);
    let job_slot = Arc::clone(&slot);
    let job_pool = pool.clone();
    pool.submit(move || {
        if !job_slot.claim() {
            return;
        }
        let result = run_task(ctx, &job_pool, &job_slot.dir);
        if let Err(e) = &result {
            ctx.cancel.abort_with(e.clone());
        }
        // The parent may already have given up; nobody to tell then.
        let _ = tx.send(result);
    })?;
    Ok(Child { slot, rx })
}

/// Wait for a child that a worker is running. A child that exceeds the task timeout is fatal.
fn await_child(ctx: &TraversalContext, child: &Child) -> TaskResult {
    let started = Instant::now();
    loop {
        let left = ctx.task_timeout.saturating_sub(started.elapsed());
        let wait = ctx
            .cancel
            .wait_slice(left.min(PoolConsts::COORDINATOR_POLL_INTERVAL));
        match child.rx.recv_timeout(wait) {
            Ok(result) => return result,
            Err(RecvTimeoutError::Timeout) => {
                if ctx.cancel.should_stop() {
                    debug!(
                        "Abandoning wait on {} (call stopping)",
                        child.slot.dir.display()
                    );
                    return Ok(0);
                }
                if started.elapsed() >= ctx.task_timeout {
                    error!(
                        "No result for {} after {:?}",
                        child.slot.dir.display(),
                        ctx.task_timeout
                    );
                    let err = AggregateError::Timeout {
                        after: ctx.task_timeout,
                    };
                    ctx.cancel.abort_with(err.clone());
                    return Err(err);
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                let err = AggregateError::scheduling(format!(
                    "task for {} died before answering",
                    child.slot.dir.display()
                ));
                ctx.cancel.abort_with(err.clone());
                return Err(err);
            }
        }
    }
}
