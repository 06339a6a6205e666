//! Public and internal types for the treesum API and strategies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::reducer::Reducer;
use crate::error::AbsorbedError;
use crate::pipeline::{CancelToken, FileSystem, TraversalObserver};
use crate::utils::config::PoolConsts;

/// Classification of one directory entry. Links are never followed when classifying.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum FileKind {
    RegularFile,
    Directory,
    SymbolicLink,
    Other,
}

impl From<std::fs::FileType> for FileKind {
    fn from(ft: std::fs::FileType) -> Self {
        if ft.is_symlink() {
            FileKind::SymbolicLink
        } else if ft.is_dir() {
            FileKind::Directory
        } else if ft.is_file() {
            FileKind::RegularFile
        } else {
            FileKind::Other
        }
    }
}

/// One entry of a directory listing. Produced fresh per listing and never cached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    pub kind: FileKind,
}

/// Concurrency strategy used to walk and reduce the tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Single-threaded depth-first recursion.
    Sequential,
    /// Bounded pool; each directory task waits for its subdirectory tasks.
    PoolRecursive,
    /// Bounded pool drained by one coordinator, with an atomic pending count.
    CompletionQueue,
    /// Like [`StrategyKind::CompletionQueue`], but only the coordinator submits work.
    CompletionRelay,
    /// Shared queue of directory paths consumed by a fixed set of workers.
    Queue,
    /// Divide and conquer on a work-stealing pool.
    #[default]
    ForkJoin,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 6] = [
        StrategyKind::Sequential,
        StrategyKind::PoolRecursive,
        StrategyKind::CompletionQueue,
        StrategyKind::CompletionRelay,
        StrategyKind::Queue,
        StrategyKind::ForkJoin,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Sequential => "sequential",
            StrategyKind::PoolRecursive => "pool-recursive",
            StrategyKind::CompletionQueue => "completion-queue",
            StrategyKind::CompletionRelay => "completion-relay",
            StrategyKind::Queue => "queue",
            StrategyKind::ForkJoin => "fork-join",
        }
    }

    pub fn is_concurrent(&self) -> bool {
        !matches!(self, StrategyKind::Sequential)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        StrategyKind::ALL
            .into_iter()
            .find(|k| k.name() == wanted)
            .ok_or_else(|| {
                let names: Vec<&str> = StrategyKind::ALL.iter().map(|k| k.name()).collect();
                format!("unknown strategy '{}' (expected one of: {})", s, names.join(", "))
            })
    }
}

/// Built-in per-file reductions. All of them combine with wrapping addition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReducerKind {
    /// File size in bytes.
    #[default]
    Bytes,
    /// One per regular file.
    Count,
    /// Order-independent content fingerprint (blake3 prefix per file).
    Digest,
}

impl ReducerKind {
    pub fn name(&self) -> &'static str {
        match self {
            ReducerKind::Bytes => "bytes",
            ReducerKind::Count => "count",
            ReducerKind::Digest => "digest",
        }
    }
}

impl fmt::Display for ReducerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReducerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bytes" | "size" => Ok(ReducerKind::Bytes),
            "count" | "files" => Ok(ReducerKind::Count),
            "digest" | "hash" => Ok(ReducerKind::Digest),
            other => Err(format!(
                "unknown reducer '{}' (expected one of: bytes, count, digest)",
                other
            )),
        }
    }
}

/// Minimal result of [`aggregate`](crate::aggregate): the reduced total and how many
/// I/O errors were absorbed while computing it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Aggregate {
    pub total: u64,
    pub error_count: usize,
}

/// Entry counts observed during one traversal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Directories successfully listed (root included).
    pub directories: u64,
    /// Regular files successfully reduced.
    pub files: u64,
    /// Symbolic links seen and not followed.
    pub symlinks: u64,
    /// Sockets, fifos, devices and the like.
    pub other: u64,
}

/// Full result of [`aggregate_with`](crate::aggregate_with).
#[derive(Clone, Debug, Serialize)]
pub struct AggregateReport {
    pub root: PathBuf,
    pub total: u64,
    pub error_count: usize,
    /// First absorbed errors, capped at [`AggregateOpts::max_recorded_errors`].
    pub errors: Vec<AbsorbedError>,
    pub stats: StatsSnapshot,
    pub strategy: StrategyKind,
    pub reducer: &'static str,
    pub parallelism: usize,
    pub elapsed: Duration,
}

impl AggregateReport {
    pub fn aggregate(&self) -> Aggregate {
        Aggregate {
            total: self.total,
            error_count: self.error_count,
        }
    }
}

/// Options for [`aggregate_with`](crate::aggregate_with). Everything is per call; nothing is cached.
#[derive(Clone)]
pub struct AggregateOpts {
    pub strategy: StrategyKind,
    /// Worker count. When None, the available hardware parallelism (capped by the FD limit).
    pub parallelism: Option<usize>,
    pub reducer: ReducerKind,
    /// Overrides [`Self::reducer`] with a caller-supplied reduction.
    pub custom_reducer: Option<Arc<dyn Reducer>>,
    /// Deadline for the whole call. On expiry the call fails with a timeout, never a partial total.
    pub timeout: Option<Duration>,
    /// How long a pool-recursive task waits for one subdirectory result before giving up.
    pub task_timeout: Duration,
    /// External cancellation (e.g. Ctrl+C).
    pub cancel: Option<CancelToken>,
    /// Hook notified of scans, pending-count changes and pool start-up.
    pub observer: Option<Arc<dyn TraversalObserver>>,
    /// Filesystem to traverse. When None, the local filesystem.
    pub fs: Option<Arc<dyn FileSystem>>,
    /// Absorbed errors beyond this many are counted but not kept.
    pub max_recorded_errors: usize,
}

impl Default for AggregateOpts {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            parallelism: None,
            reducer: ReducerKind::default(),
            custom_reducer: None,
            timeout: None,
            task_timeout: PoolConsts::TASK_TIMEOUT,
            cancel: None,
            observer: None,
            fs: None,
            max_recorded_errors: PoolConsts::MAX_RECORDED_ERRORS,
        }
    }
}

impl AggregateOpts {
    pub fn with_strategy(strategy: StrategyKind) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }
}

impl fmt::Debug for AggregateOpts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateOpts")
            .field("strategy", &self.strategy)
            .field("parallelism", &self.parallelism)
            .field("reducer", &self.reducer)
            .field("custom_reducer", &self.custom_reducer.as_ref().map(|r| r.name()))
            .field("timeout", &self.timeout)
            .field("task_timeout", &self.task_timeout)
            .field("cancel", &self.cancel.is_some())
            .field("observer", &self.observer.is_some())
            .field("fs", &self.fs.is_some())
            .field("max_recorded_errors", &self.max_recorded_errors)
            .finish()
    }
}

/// Which strategies a CLI run covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrategyChoice {
    All,
    One(StrategyKind),
}

impl StrategyChoice {
    pub fn kinds(&self) -> Vec<StrategyKind> {
        match self {
            StrategyChoice::All => StrategyKind::ALL.to_vec(),
            StrategyChoice::One(kind) => vec![*kind],
        }
    }
}

impl Default for StrategyChoice {
    fn default() -> Self {
        StrategyChoice::One(StrategyKind::default())
    }
}

impl FromStr for StrategyChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(StrategyChoice::All)
        } else {
            s.parse().map(StrategyChoice::One)
        }
    }
}

/// Full options for the CLI (file config merged with flags). Use [`AggregateOpts`] for lib.
#[derive(Clone, Debug)]
pub struct Opts {
    pub strategy: StrategyChoice,
    pub threads: Option<usize>,
    pub timeout: Option<Duration>,
    pub task_timeout: Duration,
    pub reducer: ReducerKind,
    /// Runs per strategy; timings are reported when > 1.
    pub repeat: usize,
    /// Print the directory tree before aggregating.
    pub tree: bool,
    pub json: bool,
    pub list_errors: bool,
    pub verbose: bool,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            strategy: StrategyChoice::default(),
            threads: None,
            timeout: None,
            task_timeout: PoolConsts::TASK_TIMEOUT,
            reducer: ReducerKind::default(),
            repeat: 1,
            tree: false,
            json: false,
            list_errors: false,
            verbose: false,
        }
    }
}

impl Opts {
    /// Library options for one strategy of this run.
    pub fn aggregate_opts(&self, strategy: StrategyKind, cancel: Option<CancelToken>) -> AggregateOpts {
        AggregateOpts {
            strategy,
            parallelism: self.threads,
            reducer: self.reducer,
            timeout: self.timeout,
            task_timeout: self.task_timeout,
            cancel,
            ..AggregateOpts::default()
        }
    }
}
