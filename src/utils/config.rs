//! Application configuration constants.
//! Tuning and thresholds in one place.

use std::sync::OnceLock;
use std::time::Duration;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    config_filename: String,
    thread_prefix: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                config_filename: format!(".{pkg}.toml"),
                thread_prefix: pkg.to_string(),
            }
        })
    }

    /// Per-directory config file read by the CLI (e.g. `.treesum.toml`).
    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }

    /// Worker thread name for `role` and index `i`, e.g. `treesum-queue-3`.
    pub fn thread_name(&self, role: &str, i: usize) -> String {
        format!("{}-{}-{}", self.thread_prefix, role, i)
    }
}

// ---- Worker threads ----

/// Thread limits used when resolving parallelism.
/// Use [`WorkerThreadLimits::current()`] to fill `all_threads` from the OS; the rest are const.
#[derive(Clone, Copy, Debug)]
pub struct WorkerThreadLimits {
    /// Available hardware parallelism; set by [`WorkerThreadLimits::current()`].
    pub all_threads: usize,
    /// Never go below this many workers.
    pub floor: usize,
}

impl Default for WorkerThreadLimits {
    fn default() -> Self {
        Self {
            all_threads: 0, // use current() to set from the OS
            floor: Self::FLOOR_THREADS,
        }
    }
}

impl WorkerThreadLimits {
    pub const FLOOR_THREADS: usize = 1;

    /// Build limits with `all_threads` set from `std::thread::available_parallelism()`.
    /// Does not touch rayon's global pool.
    pub fn current() -> Self {
        let all_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(Self::FLOOR_THREADS);
        Self {
            all_threads,
            ..Self::default()
        }
    }
}

// ---- Pools / coordination ----

/// Timeouts and polling intervals for the pool-based strategies.
pub struct PoolConsts;

impl PoolConsts {
    /// How long a pool-recursive task waits on one subdirectory result. A subtree slower than
    /// this fails the whole call, so large trees may need a higher `--task-timeout`.
    pub const TASK_TIMEOUT: Duration = Duration::from_secs(30);
    /// Queue workers re-check the pending count this often while the queue is empty.
    pub const QUEUE_POLL_INTERVAL: Duration = Duration::from_millis(5);
    /// Longest single wait of a coordinator before it re-checks the deadline.
    pub const COORDINATOR_POLL_INTERVAL: Duration = Duration::from_millis(50);
    /// Absorbed errors kept in the report (all of them are still counted).
    pub const MAX_RECORDED_ERRORS: usize = 1000;
}

// ---- Hashing ----

/// Hashing I/O thresholds and buffer sizes.
pub struct HashingConsts;

impl HashingConsts {
    /// File size above which hashing uses memory-mapped I/O (bytes). 100 MB.
    pub const HASH_MMAP_THRESHOLD: u64 = 100 * 1024 * 1024;
    /// Chunk size for reading files below mmap threshold (bytes). 1 MB.
    pub const HASH_READ_CHUNK_SIZE: usize = 1024 * 1024;
}

// ---- Sizes ----

pub const KILOBYTE: u64 = 1024;
pub const MEGABYTE: u64 = 1024 * KILOBYTE;
pub const GIGABYTE: u64 = 1024 * MEGABYTE;
