use std::path::Path;

use crate::StrategyKind;
use crate::engine::reducer::merge;
use crate::error::AggregateError;
use crate::pipeline::{TraversalContext, scan_dir};

use super::Aggregator;

/// Depth-first recursion on the calling thread. The reference result for every other strategy.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sequential;

impl Aggregator for Sequential {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Sequential
    }

    fn aggregate(&self, ctx: &TraversalContext, root: &Path) -> Result<u64, AggregateError> {
        Ok(total(ctx, root))
    }
}

fn total(ctx: &TraversalContext, dir: &Path) -> u64 {
    if ctx.cancel.should_stop() {
        return 0;
    }
    let mut subdirs = Vec::new();
    let mut sum = scan_dir(ctx, dir, &mut subdirs);
    for sub in &subdirs {
        sum = merge(sum, total(ctx, sub));
    }
    sum
}
