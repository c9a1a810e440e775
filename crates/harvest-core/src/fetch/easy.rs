//! libcurl-backed fetcher: one easy handle per fetch.

use std::cell::RefCell;
use std::io::{self, Write};
use std::str;
use std::time::{Duration, Instant};

use super::head::ResponseHead;
use super::{is_success, Fetch, ResponseMeta};
use crate::error::TaskError;
use crate::locator::ResourceLocator;

const MAX_REDIRECTS: u32 = 10;
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const MIN_BUDGET: Duration = Duration::from_millis(1);

/// Streaming HTTP GET over libcurl.
///
/// Blocking; run it on worker threads or `spawn_blocking`.
#[derive(Debug, Clone)]
pub struct CurlFetcher {
    connect_timeout: Duration,
    user_agent: String,
}

impl Default for CurlFetcher {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent: concat!("harvest/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl CurlFetcher {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            ..Self::default()
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// libcurl reads a zero timeout as "never"; a zero budget must still expire.
pub(crate) fn effective_budget(budget: Duration) -> Duration {
    budget.max(MIN_BUDGET)
}

impl Fetch for CurlFetcher {
    fn fetch(
        &self,
        locator: &ResourceLocator,
        budget: Duration,
        sink: &mut dyn Write,
    ) -> Result<ResponseMeta, TaskError> {
        let started = Instant::now();
        let setup = |e: curl::Error| TaskError::Network(format!("curl setup: {}", e));

        let mut easy = curl::easy::Easy::new();
        easy.url(locator.as_str()).map_err(setup)?;
        easy.follow_location(true).map_err(setup)?;
        easy.max_redirections(MAX_REDIRECTS).map_err(setup)?;
        easy.useragent(&self.user_agent).map_err(setup)?;
        let budget = effective_budget(budget);
        easy.connect_timeout(effective_budget(self.connect_timeout).min(budget))
            .map_err(setup)?;
        easy.timeout(budget).map_err(setup)?;

        let head = RefCell::new(ResponseHead::default());
        let mut sink_error: Option<io::Error> = None;

        let performed = {
            let mut transfer = easy.transfer();
            transfer
                .header_function(|line| {
                    if let Ok(s) = str::from_utf8(line) {
                        head.borrow_mut().push_line(s);
                    }
                    true
                })
                .map_err(setup)?;
            transfer
                .write_function(|data| {
                    // Error page: abort instead of streaming it as content.
                    if !is_success(head.borrow().status) {
                        return Ok(0);
                    }
                    match sink.write_all(data) {
                        Ok(()) => Ok(data.len()),
                        Err(e) => {
                            sink_error = Some(e);
                            Ok(0)
                        }
                    }
                })
                .map_err(setup)?;
            transfer.perform()
        };

        let status = easy.response_code().unwrap_or(0);
        if let Err(e) = performed {
            if let Some(io_err) = sink_error {
                return Err(TaskError::storage("write body", io_err));
            }
            if e.is_write_error() && status != 0 && !is_success(status) {
                return Err(TaskError::HttpStatus { status });
            }
            return Err(classify_curl_error(&e, started.elapsed()));
        }

        if !is_success(status) {
            return Err(TaskError::HttpStatus { status });
        }

        let head = head.into_inner();
        Ok(ResponseMeta {
            status,
            size_hint: head.content_length,
            content_type: head.content_type,
        })
    }
}

/// Map a transfer error onto the task error taxonomy.
pub(crate) fn classify_curl_error(e: &curl::Error, elapsed: Duration) -> TaskError {
    if e.is_operation_timedout() {
        return TaskError::Timeout {
            elapsed_ms: elapsed.as_millis(),
            detail: e.to_string(),
        };
    }
    if e.is_partial_file() {
        return TaskError::Network(format!("body truncated: {}", e));
    }
    TaskError::Network(e.to_string())
}
