pub mod config;
pub mod logging;

pub mod checksum;
pub mod error;
pub mod fetch;
pub mod links;
pub mod locator;
pub mod pipeline;
pub mod report;
pub mod retry;
pub mod scheduler;
pub mod storage;
pub mod task;
pub mod url_model;

pub use error::{ErrorKind, SetupError, TaskError};
pub use links::LinkBatch;
pub use pipeline::{run_batch, run_batch_async, BatchOptions, DuplicatePolicy};
pub use report::BatchReport;
