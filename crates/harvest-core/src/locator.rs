//! Locator normalization.
//!
//! Turns raw link text into absolute http(s) locators. Relative references
//! are resolved against the page's base only when they are explicitly
//! path-shaped (`/x`, `./x`, `../x`) or network-path (`//host/x`); anything
//! else without a scheme is rejected instead of guessed at.

use crate::error::{MalformedLocatorError, SetupError};
use std::fmt;
use url::Url;

/// A validated absolute http(s) locator with a host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceLocator(Url);

impl ResourceLocator {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn url(&self) -> &Url {
        &self.0
    }

    pub fn host(&self) -> &str {
        self.0.host_str().unwrap_or_default()
    }
}

impl fmt::Display for ResourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Parses the page's base URI. A malformed base is a batch-setup error.
pub fn parse_base(input: &str) -> Result<ResourceLocator, SetupError> {
    let trimmed = input.trim();
    let url = Url::parse(trimmed).map_err(|e| SetupError::InvalidBase {
        input: input.to_string(),
        reason: e.to_string(),
    })?;
    check_absolute(url).map_err(|reason| SetupError::InvalidBase {
        input: input.to_string(),
        reason,
    })
}

/// Normalizes one raw locator, resolving relative references against `base`.
pub fn normalize(
    raw: &str,
    base: Option<&ResourceLocator>,
) -> Result<ResourceLocator, MalformedLocatorError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(MalformedLocatorError::new(raw, "empty locator"));
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(MalformedLocatorError::new(raw, "contains whitespace"));
    }

    let url = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            if !is_explicit_relative(trimmed) {
                return Err(MalformedLocatorError::new(raw, "missing scheme"));
            }
            let base = base.ok_or_else(|| {
                MalformedLocatorError::new(raw, "relative locator without a base URI")
            })?;
            base.0
                .join(trimmed)
                .map_err(|e| MalformedLocatorError::new(raw, e.to_string()))?
        }
        Err(e) => return Err(MalformedLocatorError::new(raw, e.to_string())),
    };

    check_absolute(url).map_err(|reason| MalformedLocatorError::new(raw, reason))
}

fn is_explicit_relative(s: &str) -> bool {
    s.starts_with('/') || s.starts_with("./") || s.starts_with("../")
}

fn check_absolute(mut url: Url) -> Result<ResourceLocator, String> {
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme {:?}", other)),
    }
    match url.host_str() {
        Some(h) if !h.is_empty() => {}
        _ => return Err("missing host".to_string()),
    }
    // Never sent to the server.
    url.set_fragment(None);
    Ok(ResourceLocator(url))
}
