//! Retry loop: run an attempt until success or the policy says stop.

use super::policy::{RetryDecision, RetryPolicy};
use crate::error::TaskError;

/// Runs `attempt` until it succeeds or `policy` refuses another try.
///
/// `attempt` receives the 1-based attempt number. Sleeps on the calling
/// thread between attempts.
pub fn run_with_retry<T, F>(policy: &RetryPolicy, mut attempt: F) -> Result<T, TaskError>
where
    F: FnMut(u32) -> Result<T, TaskError>,
{
    let mut n = 1u32;
    loop {
        match attempt(n) {
            Ok(v) => return Ok(v),
            Err(e) => match policy.decide(n, e.kind()) {
                RetryDecision::NoRetry => return Err(e),
                RetryDecision::RetryAfter(d) => {
                    tracing::debug!(attempt = n, delay_ms = d.as_millis() as u64, "retrying after {}", e);
                    std::thread::sleep(d);
                    n += 1;
                }
            },
        }
    }
}
