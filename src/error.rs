//! Error types: fatal errors that abort a call, and absorbed errors that only get counted.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Fatal errors. Per-entry I/O failures never show up here; see [`AbsorbedError`].
#[derive(Debug, Clone, Error)]
pub enum AggregateError {
    /// Root is missing, unreadable or not a directory. Caller misuse, never absorbed.
    #[error("invalid root {}: {reason}", path.display())]
    InvalidRoot { path: PathBuf, reason: String },

    #[error("parallelism must be at least 1")]
    InvalidParallelism,

    /// The call deadline elapsed, or a subdirectory task did not answer in time.
    #[error("timed out after {after:?}")]
    Timeout { after: Duration },

    /// Pool creation or task submission failed, or a worker died.
    #[error("scheduling failed: {0}")]
    Scheduling(String),

    /// Cancelled through a [`CancelToken`](crate::CancelToken).
    #[error("interrupted")]
    Interrupted,
}

impl AggregateError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, AggregateError::Timeout { .. })
    }

    pub(crate) fn scheduling(msg: impl Into<String>) -> Self {
        AggregateError::Scheduling(msg.into())
    }
}

/// Where an absorbed error happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum AbsorbedErrorKind {
    /// Directory could not be listed; its whole subtree contributes nothing.
    ListDir,
    /// A regular file could not be stat'ed or read by the reducer.
    ReduceFile,
    /// A completion-queue task failed (panicked) and contributed nothing.
    TaskFailed,
}

impl fmt::Display for AbsorbedErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AbsorbedErrorKind::ListDir => "list",
            AbsorbedErrorKind::ReduceFile => "reduce",
            AbsorbedErrorKind::TaskFailed => "task",
        };
        f.write_str(s)
    }
}

/// An I/O failure that was logged and contributed zero to the aggregate.
#[derive(Clone, Debug, Serialize)]
pub struct AbsorbedError {
    pub path: PathBuf,
    pub kind: AbsorbedErrorKind,
    pub message: String,
}

impl fmt::Display for AbsorbedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.path.display(), self.message)
    }
}
