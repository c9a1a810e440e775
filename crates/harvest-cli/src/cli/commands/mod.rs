//! CLI command handlers, one per file.

mod checksum;
mod config;
mod fetch;

pub use checksum::run_checksum;
pub use config::run_config;
pub use fetch::{run_fetch, FetchOverrides};
