//! Retry and backoff policy.
//!
//! Retrying happens inside a task's in-flight window: the attempt counter
//! grows but the task never leaves `InFlight` until its final attempt
//! resolves.

mod policy;
mod run;

pub use policy::{RetryDecision, RetryPolicy};
pub use run::run_with_retry;
