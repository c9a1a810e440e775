//! Incremental response header parsing.

/// Status and selected headers of the most recent response seen on a
/// transfer. A new status line (redirect hop, `100 Continue`) resets it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u32,
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
}

impl ResponseHead {
    /// Feed one raw header line as delivered by libcurl.
    pub fn push_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        if line.starts_with("HTTP/") {
            let status = line
                .split_whitespace()
                .nth(1)
                .and_then(|s| s.parse::<u32>().ok())
                .unwrap_or(0);
            *self = ResponseHead {
                status,
                ..ResponseHead::default()
            };
            return;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                self.content_length = value.parse::<u64>().ok();
            } else if name.eq_ignore_ascii_case("content-type") {
                self.content_type = Some(value.to_string());
            }
        }
    }
}
