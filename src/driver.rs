//! Driver: validate the root, size the workers, run one strategy, and turn its outcome into a
//! report or a fatal error.

use log::debug;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::error::AggregateError;
use crate::pipeline::{Cancellation, FileSystem, LocalFs, TraversalContext, panic_message};
use crate::utils::config::WorkerThreadLimits;
use crate::utils::fd_limit::cap_threads_by_fd_limit;
use crate::{Aggregate, AggregateOpts, AggregateReport, FileKind, StrategyKind};

/// Aggregate the tree under `root` with `strategy`, using `parallelism` workers (default: the
/// available hardware parallelism). Returns the total and the number of absorbed I/O errors.
pub fn aggregate(
    root: &Path,
    strategy: StrategyKind,
    parallelism: Option<usize>,
) -> Result<Aggregate, AggregateError> {
    let opts = AggregateOpts {
        strategy,
        parallelism,
        ..AggregateOpts::default()
    };
    aggregate_with(root, &opts).map(|report| report.aggregate())
}

/// Aggregate the tree under `root` with full options.
///
/// Fails only with an invalid root, a bad parallelism value, a timeout, an interruption, or a
/// scheduling failure. Per-entry I/O errors are absorbed into [`AggregateReport::error_count`].
pub fn aggregate_with(
    root: &Path,
    opts: &AggregateOpts,
) -> Result<AggregateReport, AggregateError> {
    let fs: Arc<dyn FileSystem> = opts.fs.clone().unwrap_or_else(|| Arc::new(LocalFs));
    validate_root(fs.as_ref(), root)?;
    let parallelism = resolve_parallelism(opts.strategy, opts.parallelism)?;
    let reducer = opts
        .custom_reducer
        .clone()
        .unwrap_or_else(|| opts.reducer.reducer());
    let reducer_name = reducer.name();

    let ctx = TraversalContext::new(
        fs,
        reducer,
        parallelism,
        opts.task_timeout,
        opts.max_recorded_errors,
    )
    .with_cancellation(Cancellation::new(opts.timeout, opts.cancel.clone()))
    .with_observer(opts.observer.clone());

    let aggregator = opts.strategy.aggregator();
    debug!(
        "Aggregating {} with {} ({} reducer, {} threads)",
        root.display(),
        aggregator.kind(),
        reducer_name,
        parallelism
    );
    let start = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| aggregator.aggregate(&ctx, root)));
    let elapsed = start.elapsed();

    let total = match outcome {
        Ok(result) => result,
        Err(payload) => Err(AggregateError::scheduling(format!(
            "{} strategy panicked: {}",
            opts.strategy,
            panic_message(payload.as_ref())
        ))),
    };
    // A stopped call's total is partial. The first fatal error wins, then the stop reason.
    if let Some(err) = ctx.cancel.fatal() {
        return Err(err.clone());
    }
    if ctx.cancel.interrupted() {
        return Err(AggregateError::Interrupted);
    }
    if ctx.cancel.timed_out() {
        return Err(AggregateError::Timeout {
            after: opts.timeout.unwrap_or(elapsed),
        });
    }
    let total = total?;

    ctx.errors.summarize();
    debug!(
        "{}: total {} with {} absorbed errors in {:?}",
        opts.strategy,
        total,
        ctx.errors.count(),
        elapsed
    );

    let stats = ctx.stats.snapshot();
    let error_count = ctx.errors.count();
    Ok(AggregateReport {
        root: root.to_path_buf(),
        total,
        error_count,
        errors: ctx.errors.into_errors(),
        stats,
        strategy: opts.strategy,
        reducer: reducer_name,
        parallelism,
        elapsed,
    })
}

/// Root must exist and be a directory. A link to a directory is accepted as root; links
/// below the root are never followed.
pub fn validate_root(fs: &dyn FileSystem, root: &Path) -> Result<(), AggregateError> {
    match fs.kind_of(root, true) {
        Ok(FileKind::Directory) => Ok(()),
        Ok(kind) => Err(AggregateError::InvalidRoot {
            path: root.to_path_buf(),
            reason: format!("not a directory ({:?})", kind),
        }),
        Err(e) => Err(AggregateError::InvalidRoot {
            path: root.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

/// Worker count for `strategy`: the requested value or the available parallelism, capped by the
/// FD limit. Sequential always runs on one thread.
pub fn resolve_parallelism(
    strategy: StrategyKind,
    requested: Option<usize>,
) -> Result<usize, AggregateError> {
    let wanted = match requested {
        Some(0) => return Err(AggregateError::InvalidParallelism),
        Some(n) => n,
        None => {
            let limits = WorkerThreadLimits::current();
            limits.all_threads.max(limits.floor)
        }
    };
    if !strategy.is_concurrent() {
        return Ok(1);
    }
    Ok(cap_threads_by_fd_limit(wanted))
}
