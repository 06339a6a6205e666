//! Concurrency strategies. Each one walks the same tree with [`scan_dir`](crate::pipeline::scan_dir)
//! and must return the same total as [`Sequential`] on an unchanging tree.

pub mod completion;
pub mod fork_join;
pub mod pool_recursive;
pub mod queue;
pub mod sequential;

use std::path::Path;

use crate::StrategyKind;
use crate::error::AggregateError;
use crate::pipeline::TraversalContext;

pub use completion::{CompletionQueue, CompletionRelay};
pub use fork_join::ForkJoin;
pub use pool_recursive::PoolRecursive;
pub use queue::Queue;
pub use sequential::Sequential;

/// One way of scheduling the traversal of a tree.
///
/// Implementations own whatever pool they need for the duration of `aggregate` and release it
/// before returning. On cancellation they stop early and return whatever they have; the driver
/// turns that into the matching error, so a partial total never reaches the caller.
pub trait Aggregator: Sync {
    fn kind(&self) -> StrategyKind;

    fn aggregate(&self, ctx: &TraversalContext, root: &Path) -> Result<u64, AggregateError>;
}

impl StrategyKind {
    pub fn aggregator(self) -> &'static dyn Aggregator {
        match self {
            StrategyKind::Sequential => &Sequential,
            StrategyKind::PoolRecursive => &PoolRecursive,
            StrategyKind::CompletionQueue => &CompletionQueue,
            StrategyKind::CompletionRelay => &CompletionRelay,
            StrategyKind::Queue => &Queue,
            StrategyKind::ForkJoin => &ForkJoin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_maps_to_its_own_aggregator() {
        for kind in StrategyKind::ALL {
            assert_eq!(kind.aggregator().kind(), kind);
        }
    }
}
