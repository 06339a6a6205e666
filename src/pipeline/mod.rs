//! Pipeline components: traversal context, tree walker, error sink, worker pool.

pub mod context;
pub mod error_handler;
pub mod pool;
pub mod walk;

pub use context::{CancelToken, Cancellation, TraversalContext, TraversalObserver, TraversalStats};
pub use error_handler::ErrorLog;
pub use pool::{PoolHandle, ScopedPool, panic_message};
pub use walk::{DirScan, FileSystem, LocalFs, scan_dir, scan_dir_owned};
