//! Traversal context: call-scoped state shared by every task of one aggregation.

use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::StatsSnapshot;
use crate::engine::reducer::Reducer;
use crate::error::AggregateError;

use super::error_handler::ErrorLog;
use super::walk::FileSystem;

/// Observable hook into a traversal. All methods default to no-ops; implementations must be cheap
/// since they run on worker threads.
pub trait TraversalObserver: Send + Sync {
    /// A directory was listed and its files reduced to `partial`.
    fn directory_scanned(&self, _dir: &Path, _partial: u64) {}
    /// The pending-task count changed to `pending` (completion-queue, completion-relay, queue).
    fn pending_changed(&self, _pending: usize) {}
    /// A pool with `workers` threads was started.
    fn pool_started(&self, _workers: usize) {}
}

/// Cloneable external cancel switch (e.g. wired to Ctrl+C).
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-call stop state: caller deadline, external token, and internal abort after a fatal error.
#[derive(Debug, Default)]
pub struct Cancellation {
    deadline: Option<Instant>,
    token: Option<CancelToken>,
    stopped: AtomicBool,
    timed_out: AtomicBool,
    interrupted: AtomicBool,
    fatal: OnceLock<AggregateError>,
}

impl Cancellation {
    pub fn new(timeout: Option<Duration>, token: Option<CancelToken>) -> Self {
        Self {
            deadline: timeout.map(|t| Instant::now() + t),
            token,
            ..Self::default()
        }
    }

    /// True once the call should stop scheduling work. Checks the deadline and the token.
    pub fn should_stop(&self) -> bool {
        if self.stopped.load(Ordering::Acquire) {
            return true;
        }
        if self.token.as_ref().is_some_and(CancelToken::is_cancelled) {
            self.interrupted.store(true, Ordering::Release);
            self.stopped.store(true, Ordering::Release);
            return true;
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            self.timed_out.store(true, Ordering::Release);
            self.stopped.store(true, Ordering::Release);
            return true;
        }
        false
    }

    /// Stop the call so other tasks bail out.
    pub fn abort(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    /// Stop the call and keep `err` as its outcome. Only the first fatal error is kept.
    pub fn abort_with(&self, err: AggregateError) {
        let _ = self.fatal.set(err);
        self.abort();
    }

    /// First error passed to [`Cancellation::abort_with`], if any.
    pub fn fatal(&self) -> Option<&AggregateError> {
        self.fatal.get()
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out.load(Ordering::Acquire)
    }

    /// True only if the token stopped the call; a token tripped after the work finished
    /// does not count.
    pub fn interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Acquire)
    }

    /// Bound a blocking wait of at most `max` by the time left until the deadline.
    pub fn wait_slice(&self, max: Duration) -> Duration {
        match self.deadline {
            Some(d) => d.saturating_duration_since(Instant::now()).min(max),
            None => max,
        }
    }
}

/// Atomic entry counters. Snapshotted into the report at the end of the call.
#[derive(Debug, Default)]
pub struct TraversalStats {
    pub directories: AtomicU64,
    pub files: AtomicU64,
    pub symlinks: AtomicU64,
    pub other: AtomicU64,
}

impl TraversalStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            directories: self.directories.load(Ordering::Relaxed),
            files: self.files.load(Ordering::Relaxed),
            symlinks: self.symlinks.load(Ordering::Relaxed),
            other: self.other.load(Ordering::Relaxed),
        }
    }
}

/// Everything one aggregation call shares between its tasks. Built by the driver, borrowed by
/// the strategy, dropped when the call returns.
pub struct TraversalContext {
    pub fs: Arc<dyn FileSystem>,
    pub reducer: Arc<dyn Reducer>,
    pub errors: ErrorLog,
    pub stats: TraversalStats,
    pub cancel: Cancellation,
    pub observer: Option<Arc<dyn TraversalObserver>>,
    /// Worker count for the pool-based strategies.
    pub parallelism: usize,
    pub task_timeout: Duration,
}

impl TraversalContext {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        reducer: Arc<dyn Reducer>,
        parallelism: usize,
        task_timeout: Duration,
        max_recorded_errors: usize,
    ) -> Self {
        Self {
            fs,
            reducer,
            errors: ErrorLog::new(max_recorded_errors),
            stats: TraversalStats::default(),
            cancel: Cancellation::default(),
            observer: None,
            parallelism,
            task_timeout,
        }
    }

    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_observer(mut self, observer: Option<Arc<dyn TraversalObserver>>) -> Self {
        self.observer = observer;
        self
    }

    pub fn notify_pending(&self, pending: usize) {
        if let Some(obs) = &self.observer {
            obs.pending_changed(pending);
        }
    }

    pub fn notify_pool_started(&self, workers: usize) {
        if let Some(obs) = &self.observer {
            obs.pool_started(workers);
        }
    }
}
