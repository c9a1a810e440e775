//! Single-resource retrieval.
//!
//! A fetcher streams one response body into a caller-supplied sink. Bodies of
//! non-2xx responses are never handed to the sink; they fail the task with
//! `TaskError::HttpStatus`.

mod easy;
mod head;

pub use easy::CurlFetcher;
pub use head::ResponseHead;

use crate::error::TaskError;
use crate::locator::ResourceLocator;
use std::io::Write;
use std::time::Duration;

/// Metadata of a successful response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseMeta {
    /// Final status after redirects.
    pub status: u32,
    /// `Content-Length` of the final response, if sent.
    pub size_hint: Option<u64>,
    pub content_type: Option<String>,
}

/// Transport capability used by scheduler workers.
///
/// Implementations open one connection per call, write the body into `sink`
/// as it arrives and close the connection before returning. The whole call
/// must finish within `budget`, otherwise it fails with `TaskError::Timeout`.
pub trait Fetch: Send + Sync {
    fn fetch(
        &self,
        locator: &ResourceLocator,
        budget: Duration,
        sink: &mut dyn Write,
    ) -> Result<ResponseMeta, TaskError>;
}

pub fn is_success(status: u32) -> bool {
    (200..300).contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_range() {
        assert!(is_success(200));
        assert!(is_success(204));
        assert!(is_success(299));
        assert!(!is_success(0));
        assert!(!is_success(199));
        assert!(!is_success(301));
        assert!(!is_success(404));
        assert!(!is_success(500));
    }
}
