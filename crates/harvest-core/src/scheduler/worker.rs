//! One worker: pull a task, fetch into a partial artifact, promote, report.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::TaskError;
use crate::fetch::Fetch;
use crate::locator::ResourceLocator;
use crate::retry::run_with_retry;
use crate::storage::{PartialArtifact, Persisted};
use crate::task::{DownloadTask, TaskBoard, TaskOutcome, TaskState};

use super::SchedulerOptions;

/// State shared by every worker of one batch.
pub(super) struct WorkerContext {
    pub(super) queue: Arc<Mutex<VecDeque<DownloadTask>>>,
    pub(super) fetcher: Arc<dyn Fetch>,
    pub(super) board: Arc<TaskBoard>,
    pub(super) temp_dir: Arc<Path>,
    pub(super) options: SchedulerOptions,
}

/// Runs tasks until the queue is empty or the aggregator hangs up.
pub(super) fn worker_loop(ctx: WorkerContext, tx: Sender<TaskOutcome>) {
    loop {
        let next = ctx
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let Some(task) = next else {
            break;
        };
        let outcome = run_task(task, &ctx);
        if tx.send(outcome).is_err() {
            tracing::debug!("result channel closed; worker exiting");
            break;
        }
    }
}

fn run_task(task: DownloadTask, ctx: &WorkerContext) -> TaskOutcome {
    let id = task.id();
    let mut flying = task.begin();
    ctx.board.set(id, TaskState::InFlight);
    tracing::debug!(task = id, locator = %flying.locator(), "task started");

    let caught = panic::catch_unwind(AssertUnwindSafe(|| {
        run_with_retry(&ctx.options.retry, |_| {
            flying.start_attempt();
            let r = fetch_and_persist(
                ctx.fetcher.as_ref(),
                flying.locator(),
                flying.destination(),
                &ctx.temp_dir,
                &ctx.options,
            );
            if let Err(e) = &r {
                flying.record_error(e);
            }
            r
        })
    }));

    let outcome = match caught {
        Ok(Ok(persisted)) => flying.succeed(persisted),
        Ok(Err(e)) => flying.fail(e),
        Err(payload) => flying.fail(TaskError::Internal(panic_message(payload.as_ref()))),
    };
    ctx.board.set(id, outcome.state());
    outcome
}

/// Fetcher then writer for one attempt. The artifact is dropped (and its
/// temp file deleted) on every early return.
fn fetch_and_persist(
    fetcher: &dyn Fetch,
    locator: &ResourceLocator,
    destination: &Path,
    temp_dir: &Path,
    options: &SchedulerOptions,
) -> Result<Persisted, TaskError> {
    let mut artifact = PartialArtifact::create(temp_dir)?;
    let meta = fetcher.fetch(locator, options.fetch_timeout, &mut artifact)?;
    if let Some(expected) = meta.size_hint {
        let got = artifact.bytes_written();
        if got != expected {
            return Err(TaskError::Network(format!(
                "body truncated: received {} of {} bytes",
                got, expected
            )));
        }
    }
    artifact.promote(destination, options.overwrite)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
