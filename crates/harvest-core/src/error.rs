//! Typed errors for the fetch-and-persist pipeline.
//!
//! Per-task failures are captured as `TaskError` values and recorded on the
//! task; they never unwind out of the scheduler. Only `SetupError` escapes the
//! batch entry point, because it prevents any task from running.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Classification of a task failure, as reported in the batch report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Raw input could not be resolved to an absolute http(s) locator.
    MalformedLocator,
    /// Connection refused, DNS failure, reset, truncated body.
    Network,
    /// Well-formed response outside 200-299.
    HttpStatus,
    /// Fetch exceeded its budget.
    Timeout,
    /// Disk full, permission denied, destination collision.
    Storage,
    /// A worker panicked while running the task.
    Internal,
}

impl ErrorKind {
    /// Whether a retry could plausibly change the outcome.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Network | ErrorKind::Timeout)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::MalformedLocator => "malformed_locator",
            ErrorKind::Network => "network",
            ErrorKind::HttpStatus => "http_status",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Storage => "storage",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw input rejected by the locator normalizer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed locator {input:?}: {reason}")]
pub struct MalformedLocatorError {
    /// The offending input, untrimmed.
    pub input: String,
    pub reason: String,
}

impl MalformedLocatorError {
    pub(crate) fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failure of a single task. Caught at the worker boundary.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error(transparent)]
    MalformedLocator(#[from] MalformedLocatorError),
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP {status}")]
    HttpStatus { status: u32 },
    #[error("timed out after {elapsed_ms} ms: {detail}")]
    Timeout { elapsed_ms: u128, detail: String },
    #[error("storage error: {context}: {source}")]
    Storage {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("worker panicked: {0}")]
    Internal(String),
}

impl TaskError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TaskError::MalformedLocator(_) => ErrorKind::MalformedLocator,
            TaskError::Network(_) => ErrorKind::Network,
            TaskError::HttpStatus { .. } => ErrorKind::HttpStatus,
            TaskError::Timeout { .. } => ErrorKind::Timeout,
            TaskError::Storage { .. } => ErrorKind::Storage,
            TaskError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn storage(context: impl Into<String>, source: std::io::Error) -> Self {
        TaskError::Storage {
            context: context.into(),
            source,
        }
    }
}

/// Batch-level error: nothing was admitted.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("invalid base URI {input:?}: {reason}")]
    InvalidBase { input: String, reason: String },
    #[error("output root {path} is not usable: {source}")]
    OutputRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("batch runner failed: {0}")]
    Runner(String),
}
