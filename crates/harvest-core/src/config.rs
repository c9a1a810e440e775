use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::pipeline::DuplicatePolicy;
use crate::retry::RetryPolicy;

/// Output directory used when neither config nor flags name one.
pub const DEFAULT_OUTPUT_DIR: &str = "downloads";

/// Page the links were scraped from.
pub const ENV_TARGET_URL: &str = "TARGET_URL";
/// Output directory.
pub const ENV_OUTPUT_PATH: &str = "OUTPUT_PATH";

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per task (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 0.25,
            max_delay_secs: 30,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(c: &RetryConfig) -> Self {
        Self {
            max_attempts: c.max_attempts.max(1),
            base_delay: Duration::from_secs_f64(c.base_delay_secs.max(0.0)),
            max_delay: Duration::from_secs(c.max_delay_secs),
        }
    }
}

/// Global configuration loaded from `~/.config/harvest/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Base URI of the scraped page; resolves relative links.
    #[serde(default)]
    pub target_url: Option<String>,
    /// Output root for persisted bodies.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Maximum simultaneous fetches.
    pub concurrency: usize,
    /// Budget for one fetch, connect through last byte.
    pub fetch_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// "disambiguate" (default) or "fetch_once".
    #[serde(default)]
    pub duplicates: DuplicatePolicy,
    /// Replace files already present at a destination.
    #[serde(default)]
    pub overwrite: bool,
    /// Optional retry policy; if missing, each task gets a single attempt.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            target_url: None,
            output_dir: None,
            concurrency: 4,
            fetch_timeout_secs: 60,
            connect_timeout_secs: 15,
            duplicates: DuplicatePolicy::Disambiguate,
            overwrite: false,
            retry: None,
        }
    }
}

impl HarvestConfig {
    /// Applies `TARGET_URL` / `OUTPUT_PATH` on top of the file values.
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var(ENV_TARGET_URL).ok(),
            std::env::var(ENV_OUTPUT_PATH).ok(),
        );
    }

    fn apply_overrides(&mut self, target_url: Option<String>, output_path: Option<String>) {
        if let Some(url) = target_url.filter(|s| !s.trim().is_empty()) {
            self.target_url = Some(url);
        }
        if let Some(path) = output_path.filter(|s| !s.trim().is_empty()) {
            self.output_dir = Some(PathBuf::from(path));
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("harvest")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
/// Environment overrides are applied to the result.
pub fn load_or_init() -> Result<HarvestConfig> {
    let path = config_path()?;
    let mut cfg = load_or_init_at(&path)?;
    cfg.apply_env();
    Ok(cfg)
}

/// `load_or_init` against an explicit path, without environment overrides.
pub fn load_or_init_at(path: &Path) -> Result<HarvestConfig> {
    if !path.exists() {
        let default_cfg = HarvestConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create config dir {}", parent.display()))?;
        }
        fs::write(path, toml).with_context(|| format!("write {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: HarvestConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}
