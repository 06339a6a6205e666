//! Treesum: aggregate a directory tree (total size by default) with interchangeable
//! concurrency strategies that all return the same total.

pub mod driver;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod strategy;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use driver::{aggregate, aggregate_with};
pub use engine::reducer::{Reducer, merge};
pub use error::{AbsorbedError, AbsorbedErrorKind, AggregateError};
pub use pipeline::{CancelToken, FileSystem, LocalFs, TraversalObserver};
pub use strategy::Aggregator;

/// Result alias used by the public treesum API
pub type Result<T> = std::result::Result<T, AggregateError>;
