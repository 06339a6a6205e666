use log::debug;
use rayon::prelude::*;
use std::path::Path;

use crate::StrategyKind;
use crate::engine::reducer::merge;
use crate::error::AggregateError;
use crate::pipeline::{TraversalContext, scan_dir};
use crate::utils::config::PackagePaths;

use super::Aggregator;

/// Divide and conquer on a work-stealing pool: each directory forks one task per subdirectory
/// and joins them. A blocked join steals other work, so depth and fan-out never stall the pool.
///
/// The pool is built per call and dropped before returning; rayon's global pool is never used.
#[derive(Clone, Copy, Debug, Default)]
pub struct ForkJoin;

impl Aggregator for ForkJoin {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ForkJoin
    }

    fn aggregate(&self, ctx: &TraversalContext, root: &Path) -> Result<u64, AggregateError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(ctx.parallelism)
            .thread_name(|i| PackagePaths::get().thread_name("fj", i))
            .build()
            .map_err(|e| AggregateError::scheduling(format!("build fork-join pool: {}", e)))?;
        ctx.notify_pool_started(pool.current_num_threads());
        debug!(
            "Fork-join pool with {} threads",
            pool.current_num_threads()
        );
        Ok(pool.install(|| total(ctx, root)))
    }
}

fn total(ctx: &TraversalContext, dir: &Path) -> u64 {
    if ctx.cancel.should_stop() {
        return 0;
    }
    let mut subdirs = Vec::new();
    let files = scan_dir(ctx, dir, &mut subdirs);
    let nested = subdirs
        .par_iter()
        .map(|sub| total(ctx, sub))
        .reduce(|| 0, merge);
    merge(files, nested)
}
