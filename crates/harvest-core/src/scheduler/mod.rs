//! Bounded-concurrency task scheduler.
//!
//! Admits every task of a batch into a FIFO queue and runs at most
//! `concurrency` fetch+persist pairs at once on dedicated worker threads.
//! Each worker runs one task to a terminal state before taking the next;
//! outcomes flow to the batch handle over a channel. A failed task never
//! blocks or cancels its siblings.

mod handle;
mod worker;

pub use handle::BatchHandle;

use std::collections::VecDeque;
use std::path::Path;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::SetupError;
use crate::fetch::Fetch;
use crate::report::{FailureEntry, ReportAggregator};
use crate::retry::RetryPolicy;
use crate::task::{DownloadTask, TaskBoard};

use worker::{worker_loop, WorkerContext};

/// Default number of concurrent fetches.
pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct SchedulerOptions {
    /// Maximum simultaneously in-flight tasks (values below 1 mean 1).
    pub concurrency: usize,
    /// Budget for one fetch attempt, connection through last body byte.
    pub fetch_timeout: Duration,
    /// Replace destinations that already exist on disk.
    pub overwrite: bool,
    pub retry: RetryPolicy,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            fetch_timeout: Duration::from_secs(60),
            overwrite: false,
            retry: RetryPolicy::default(),
        }
    }
}

pub struct Scheduler {
    fetcher: Arc<dyn Fetch>,
    temp_dir: Arc<Path>,
    options: SchedulerOptions,
}

impl Scheduler {
    /// `temp_dir` must already exist on the same filesystem as every
    /// destination.
    pub fn new(fetcher: Arc<dyn Fetch>, temp_dir: &Path, options: SchedulerOptions) -> Self {
        Self {
            fetcher,
            temp_dir: Arc::from(temp_dir),
            options,
        }
    }

    pub fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    /// Admit `tasks` (ids `0..tasks.len()`, in admission order) and start
    /// the worker pool. `rejected` are inputs the normalizer refused; they go
    /// straight into the report.
    pub fn dispatch(
        &self,
        tasks: Vec<DownloadTask>,
        rejected: Vec<FailureEntry>,
    ) -> Result<BatchHandle, SetupError> {
        let count = tasks.len();
        let roster: Vec<String> = tasks.iter().map(|t| t.locator().to_string()).collect();
        debug_assert!(tasks.iter().enumerate().all(|(i, t)| t.id() == i));

        let board = Arc::new(TaskBoard::new(count));
        let queue: Arc<Mutex<VecDeque<DownloadTask>>> =
            Arc::new(Mutex::new(tasks.into_iter().collect()));
        let (tx, rx) = mpsc::channel();

        let num_workers = self.options.concurrency.max(1).min(count);
        tracing::debug!(tasks = count, workers = num_workers, "dispatching batch");
        let mut workers = Vec::with_capacity(num_workers);
        for i in 0..num_workers {
            let ctx = WorkerContext {
                queue: Arc::clone(&queue),
                fetcher: Arc::clone(&self.fetcher),
                board: Arc::clone(&board),
                temp_dir: Arc::clone(&self.temp_dir),
                options: self.options,
            };
            let tx = tx.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("harvest-worker-{}", i))
                .spawn(move || worker_loop(ctx, tx));
            match spawned {
                Ok(h) => workers.push(h),
                Err(e) if workers.is_empty() => {
                    return Err(SetupError::Runner(format!("spawn worker: {}", e)));
                }
                Err(e) => {
                    tracing::warn!("could only start {} of {} workers: {}", workers.len(), num_workers, e);
                    break;
                }
            }
        }
        drop(tx);

        Ok(BatchHandle {
            rx,
            aggregator: ReportAggregator::new(count, rejected),
            board,
            workers,
            roster,
        })
    }
}
