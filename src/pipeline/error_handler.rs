use log::{debug, warn};
use std::fmt::Display;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{AbsorbedError, AbsorbedErrorKind};

/// Sink for absorbed errors. Every error is counted; the first `max_recorded` are kept for the
/// report. The mutex is only held for the push.
#[derive(Debug)]
pub struct ErrorLog {
    count: AtomicUsize,
    recorded: Mutex<Vec<AbsorbedError>>,
    max_recorded: usize,
}

impl ErrorLog {
    pub fn new(max_recorded: usize) -> Self {
        Self {
            count: AtomicUsize::new(0),
            recorded: Mutex::new(Vec::new()),
            max_recorded,
        }
    }

    /// Count and log an error at `path`; the subtree or entry contributes 0.
    pub fn record(&self, path: &Path, kind: AbsorbedErrorKind, err: &dyn Display) {
        let n = self.count.fetch_add(1, Ordering::Relaxed);
        warn!("Skipping {} ({}): {}", path.display(), kind, err);
        if n < self.max_recorded {
            self.recorded
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(AbsorbedError {
                    path: path.to_path_buf(),
                    kind,
                    message: err.to_string(),
                });
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    /// Recorded errors, consuming the log.
    pub fn into_errors(self) -> Vec<AbsorbedError> {
        self.recorded
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Log a one-line summary. Call once after the strategy finished.
    pub fn summarize(&self) {
        let count = self.count();
        if count > 0 {
            warn!(
                "Skipped {} paths due to permission errors or access issues",
                count
            );
            if count > self.max_recorded {
                debug!("Only the first {} errors were kept", self.max_recorded);
            }
        }
    }
}
