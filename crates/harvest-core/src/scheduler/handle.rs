//! Completion handle for a dispatched batch.

use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::error::ErrorKind;
use crate::report::{BatchReport, FailureEntry, ReportAggregator};
use crate::task::{TaskBoard, TaskOutcome};

/// A running batch. `wait` blocks until every admitted task is terminal.
pub struct BatchHandle {
    pub(super) rx: Receiver<TaskOutcome>,
    pub(super) aggregator: ReportAggregator,
    pub(super) board: Arc<TaskBoard>,
    pub(super) workers: Vec<JoinHandle<()>>,
    /// Locator of each task, by id.
    pub(super) roster: Vec<String>,
}

impl BatchHandle {
    /// Pollable per-task state; the only window onto partial progress.
    pub fn board(&self) -> Arc<TaskBoard> {
        Arc::clone(&self.board)
    }

    pub fn task_count(&self) -> usize {
        self.roster.len()
    }

    /// Block until every task has reported, then seal the report.
    pub fn wait(self) -> BatchReport {
        let BatchHandle {
            rx,
            mut aggregator,
            board,
            workers,
            roster,
        } = self;

        let mut seen = vec![false; roster.len()];
        while !aggregator.is_complete() {
            match rx.recv() {
                Ok(outcome) => {
                    if let Some(flag) = seen.get_mut(outcome.id) {
                        *flag = true;
                    }
                    aggregator.record(outcome);
                }
                // Every worker is gone.
                Err(_) => break,
            }
        }

        for w in workers {
            if w.join().is_err() {
                tracing::error!("scheduler worker panicked outside a task");
            }
        }

        // A worker that died without reporting still owes its task a failure.
        for (id, locator) in roster.into_iter().enumerate() {
            if !seen[id] && !aggregator.is_complete() {
                tracing::error!(task = id, %locator, "task lost without an outcome");
                board.set(id, crate::task::TaskState::Failed);
                aggregator.record_failure(FailureEntry {
                    locator,
                    error_kind: ErrorKind::Internal,
                    error_message: "worker exited before reporting an outcome".to_string(),
                    attempts: 0,
                });
            }
        }

        aggregator.into_report()
    }
}
