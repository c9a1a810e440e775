//! Batch report and the aggregator that builds it.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ErrorKind, MalformedLocatorError};
use crate::task::{ErrorDescriptor, TaskOutcome};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessEntry {
    pub locator: String,
    pub destination: PathBuf,
    pub bytes: u64,
    pub sha256: String,
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEntry {
    /// Normalized locator, or the raw input when normalization rejected it.
    pub locator: String,
    pub error_kind: ErrorKind,
    pub error_message: String,
    /// 0 when the locator never reached the scheduler.
    pub attempts: u32,
}

impl FailureEntry {
    pub fn rejected(err: &MalformedLocatorError) -> Self {
        Self {
            locator: err.input.clone(),
            error_kind: ErrorKind::MalformedLocator,
            error_message: err.to_string(),
            attempts: 0,
        }
    }
}

/// Final accounting for one batch. Entry order carries no meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    total: usize,
    succeeded_count: usize,
    succeeded: Vec<SuccessEntry>,
    failed: Vec<FailureEntry>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn succeeded_count(&self) -> usize {
        self.succeeded_count
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn succeeded(&self) -> &[SuccessEntry] {
        &self.succeeded
    }

    pub fn failed(&self) -> &[FailureEntry] {
        &self.failed
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Emit the report through tracing: one summary line, one warn per failure.
    pub fn log_summary(&self) {
        tracing::info!(
            total = self.total,
            succeeded = self.succeeded_count,
            failed = self.failed.len(),
            "batch finished"
        );
        for f in &self.failed {
            tracing::warn!(locator = %f.locator, kind = %f.error_kind, "{}", f.error_message);
        }
    }
}

/// Accumulates terminal outcomes into a `BatchReport`.
///
/// Only the completion path (`finish`) yields a report, and only once every
/// expected task has been recorded.
#[derive(Debug)]
pub struct ReportAggregator {
    expected: usize,
    recorded: usize,
    succeeded: Vec<SuccessEntry>,
    failed: Vec<FailureEntry>,
}

impl ReportAggregator {
    /// `rejected` are locators the normalizer refused; they count toward the
    /// total but were never tasks.
    pub fn new(expected_tasks: usize, rejected: Vec<FailureEntry>) -> Self {
        Self {
            expected: expected_tasks,
            recorded: 0,
            succeeded: Vec::with_capacity(expected_tasks),
            failed: rejected,
        }
    }

    pub fn record(&mut self, outcome: TaskOutcome) {
        self.recorded += 1;
        let locator = outcome.locator.to_string();
        match outcome.result {
            Ok(p) => {
                tracing::debug!(task = outcome.id, %locator, bytes = p.bytes, "task succeeded");
                self.succeeded.push(SuccessEntry {
                    locator,
                    destination: p.destination,
                    bytes: p.bytes,
                    sha256: p.sha256,
                    attempts: outcome.attempts,
                });
            }
            Err(e) => {
                let d = ErrorDescriptor::from(&e);
                tracing::warn!(task = outcome.id, %locator, kind = %d.kind, "task failed: {}", d.message);
                self.failed.push(FailureEntry {
                    locator,
                    error_kind: d.kind,
                    error_message: d.message,
                    attempts: outcome.attempts,
                });
            }
        }
    }

    /// Record a failure that has no task outcome (e.g. a lost worker).
    pub(crate) fn record_failure(&mut self, entry: FailureEntry) {
        self.recorded += 1;
        self.failed.push(entry);
    }

    pub fn is_complete(&self) -> bool {
        self.recorded >= self.expected
    }

    /// Seal the report. `None` while tasks are still outstanding.
    pub fn finish(self) -> Option<BatchReport> {
        if !self.is_complete() {
            return None;
        }
        Some(self.into_report())
    }

    pub(crate) fn into_report(self) -> BatchReport {
        let succeeded_count = self.succeeded.len();
        BatchReport {
            total: succeeded_count + self.failed.len(),
            succeeded_count,
            succeeded: self.succeeded,
            failed: self.failed,
        }
    }
}
