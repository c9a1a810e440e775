//! Task lifecycle and the shared task board.
//!
//! A task moves `Pending → InFlight → {Succeeded | Failed}`. Each stage is a
//! separate type: only a pending `DownloadTask` can `begin()`, and only an
//! `InFlightTask` can be consumed into a terminal `TaskOutcome`, so a
//! terminal task can never be started again.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{ErrorKind, TaskError};
use crate::locator::ResourceLocator;
use crate::storage::Persisted;

/// Batch-local task id (admission index).
pub type TaskId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    InFlight,
    Succeeded,
    Failed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed)
    }
}

/// Kind and message of a failure, detached from its source error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&TaskError> for ErrorDescriptor {
    fn from(e: &TaskError) -> Self {
        Self {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

/// An admitted task waiting for a worker.
#[derive(Debug, Clone)]
pub struct DownloadTask {
    id: TaskId,
    locator: ResourceLocator,
    destination: PathBuf,
}

impl DownloadTask {
    pub(crate) fn new(id: TaskId, locator: ResourceLocator, destination: PathBuf) -> Self {
        Self {
            id,
            locator,
            destination,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn locator(&self) -> &ResourceLocator {
        &self.locator
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn state(&self) -> TaskState {
        TaskState::Pending
    }

    /// Hand the task to the worker that will run it.
    pub fn begin(self) -> InFlightTask {
        InFlightTask {
            id: self.id,
            locator: self.locator,
            destination: self.destination,
            attempt: 0,
            last_error: None,
        }
    }
}

/// A task owned by exactly one worker.
#[derive(Debug)]
pub struct InFlightTask {
    id: TaskId,
    locator: ResourceLocator,
    destination: PathBuf,
    attempt: u32,
    last_error: Option<ErrorDescriptor>,
}

impl InFlightTask {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn locator(&self) -> &ResourceLocator {
        &self.locator
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn state(&self) -> TaskState {
        TaskState::InFlight
    }

    /// Attempts started so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn last_error(&self) -> Option<&ErrorDescriptor> {
        self.last_error.as_ref()
    }

    /// Start the next attempt; returns its 1-based number.
    pub fn start_attempt(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    pub fn record_error(&mut self, err: &TaskError) {
        self.last_error = Some(err.into());
    }

    pub fn succeed(self, persisted: Persisted) -> TaskOutcome {
        self.finish(Ok(persisted))
    }

    pub fn fail(mut self, err: TaskError) -> TaskOutcome {
        self.record_error(&err);
        self.finish(Err(err))
    }

    fn finish(self, result: Result<Persisted, TaskError>) -> TaskOutcome {
        TaskOutcome {
            id: self.id,
            locator: self.locator,
            destination: self.destination,
            attempts: self.attempt,
            result,
        }
    }
}

/// Terminal record of a task, sent by its worker to the aggregator.
#[derive(Debug)]
pub struct TaskOutcome {
    pub id: TaskId,
    pub locator: ResourceLocator,
    pub destination: PathBuf,
    pub attempts: u32,
    pub result: Result<Persisted, TaskError>,
}

impl TaskOutcome {
    pub fn state(&self) -> TaskState {
        match self.result {
            Ok(_) => TaskState::Succeeded,
            Err(_) => TaskState::Failed,
        }
    }
}

/// Counts by state at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoardCounts {
    pub pending: usize,
    pub in_flight: usize,
    pub succeeded: usize,
    pub failed: usize,
}

struct BoardInner {
    states: Vec<TaskState>,
    in_flight: usize,
    peak_in_flight: usize,
}

/// Pollable per-task state for a running batch.
///
/// Each slot is written only by the worker currently holding that task.
pub struct TaskBoard {
    inner: Mutex<BoardInner>,
}

impl TaskBoard {
    pub fn new(task_count: usize) -> Self {
        Self {
            inner: Mutex::new(BoardInner {
                states: vec![TaskState::Pending; task_count],
                in_flight: 0,
                peak_in_flight: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BoardInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set(&self, id: TaskId, state: TaskState) {
        let mut inner = self.lock();
        let Some(prev) = inner.states.get(id).copied() else {
            tracing::warn!(task = id, "state update for unknown task");
            return;
        };
        if prev == state {
            return;
        }
        if prev == TaskState::InFlight {
            inner.in_flight -= 1;
        }
        if state == TaskState::InFlight {
            inner.in_flight += 1;
            inner.peak_in_flight = inner.peak_in_flight.max(inner.in_flight);
        }
        inner.states[id] = state;
    }

    pub fn state(&self, id: TaskId) -> Option<TaskState> {
        self.lock().states.get(id).copied()
    }

    pub fn snapshot(&self) -> Vec<TaskState> {
        self.lock().states.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    /// Highest number of simultaneously in-flight tasks seen so far.
    pub fn peak_in_flight(&self) -> usize {
        self.lock().peak_in_flight
    }

    pub fn counts(&self) -> BoardCounts {
        let inner = self.lock();
        let mut c = BoardCounts::default();
        for s in &inner.states {
            match s {
                TaskState::Pending => c.pending += 1,
                TaskState::InFlight => c.in_flight += 1,
                TaskState::Succeeded => c.succeeded += 1,
                TaskState::Failed => c.failed += 1,
            }
        }
        c
    }
}
