//! Batch entry points: plan, start, wait.
//!
//! `run_batch` is the blocking form, `run_batch_async` moves the same work onto
//! tokio's blocking pool. Both return only after every admitted task is
//! terminal. Only a `SetupError` (bad base URI, unusable output root) is
//! returned as an error; per-task failures live in the report.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::HarvestConfig;
use crate::error::SetupError;
use crate::fetch::{CurlFetcher, Fetch};
use crate::links::LinkBatch;
use crate::locator::{normalize, parse_base};
use crate::report::{BatchReport, FailureEntry};
use crate::retry::RetryPolicy;
use crate::scheduler::{BatchHandle, Scheduler, SchedulerOptions, DEFAULT_CONCURRENCY};
use crate::storage::{self, BatchTempDir};
use crate::task::{DownloadTask, TaskBoard};
use crate::url_model::DestinationNamer;

/// What to do with locators that normalize to the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Every occurrence is its own task; later copies get `-2`, `-3` names.
    #[default]
    Disambiguate,
    /// Repeats collapse into the first occurrence's task.
    FetchOnce,
}

/// Runtime options for one batch.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Overrides `LinkBatch::base` when set.
    pub base_url: Option<String>,
    pub output_root: PathBuf,
    pub concurrency: usize,
    pub fetch_timeout: Duration,
    pub connect_timeout: Duration,
    pub duplicates: DuplicatePolicy,
    pub overwrite: bool,
    pub retry: RetryPolicy,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            base_url: None,
            output_root: PathBuf::from(crate::config::DEFAULT_OUTPUT_DIR),
            concurrency: DEFAULT_CONCURRENCY,
            fetch_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(15),
            duplicates: DuplicatePolicy::default(),
            overwrite: false,
            retry: RetryPolicy::default(),
        }
    }
}

impl BatchOptions {
    pub fn from_config(cfg: &HarvestConfig) -> Self {
        Self {
            base_url: cfg.target_url.clone(),
            output_root: cfg
                .output_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(crate::config::DEFAULT_OUTPUT_DIR)),
            concurrency: cfg.concurrency,
            // Zero would mean "no limit" to libcurl.
            fetch_timeout: Duration::from_secs(cfg.fetch_timeout_secs.max(1)),
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs.max(1)),
            duplicates: cfg.duplicates,
            overwrite: cfg.overwrite,
            retry: cfg.retry.as_ref().map(RetryPolicy::from).unwrap_or_default(),
        }
    }

    fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            concurrency: self.concurrency,
            fetch_timeout: self.fetch_timeout,
            overwrite: self.overwrite,
            retry: self.retry,
        }
    }
}

/// Tasks to admit plus inputs the normalizer refused.
#[derive(Debug)]
pub struct BatchPlan {
    pub tasks: Vec<DownloadTask>,
    pub rejected: Vec<FailureEntry>,
}

/// Normalizes and names every raw locator. Pure: touches neither network
/// nor disk.
pub fn plan_batch(links: &LinkBatch, opts: &BatchOptions) -> Result<BatchPlan, SetupError> {
    let base = match opts.base_url.as_deref().or(links.base.as_deref()) {
        Some(b) => Some(parse_base(b)?),
        None => None,
    };

    let mut namer = DestinationNamer::new(&opts.output_root);
    let mut seen = HashSet::new();
    let mut tasks = Vec::new();
    let mut rejected = Vec::new();

    for raw in &links.raw {
        let locator = match normalize(raw, base.as_ref()) {
            Ok(l) => l,
            Err(e) => {
                tracing::debug!(input = %raw, "rejected: {}", e.reason);
                rejected.push(FailureEntry::rejected(&e));
                continue;
            }
        };
        if opts.duplicates == DuplicatePolicy::FetchOnce && !seen.insert(locator.clone()) {
            tracing::debug!(%locator, "duplicate locator skipped");
            continue;
        }
        let destination = namer.assign(&locator);
        tasks.push(DownloadTask::new(tasks.len(), locator, destination));
    }

    Ok(BatchPlan { tasks, rejected })
}

/// A dispatched batch bound to its output root.
pub struct RunningBatch {
    handle: BatchHandle,
    output_root: PathBuf,
    temp: BatchTempDir,
}

impl RunningBatch {
    pub fn board(&self) -> Arc<TaskBoard> {
        self.handle.board()
    }

    pub fn task_count(&self) -> usize {
        self.handle.task_count()
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Blocks until every task is terminal, then removes this batch's
    /// scratch directory.
    pub fn wait(self) -> BatchReport {
        let report = self.handle.wait();
        self.temp.close();
        report.log_summary();
        report
    }
}

/// Plans the batch, prepares the output root and starts the workers.
pub fn start_batch(
    links: &LinkBatch,
    opts: &BatchOptions,
    fetcher: Arc<dyn Fetch>,
) -> Result<RunningBatch, SetupError> {
    let plan = plan_batch(links, opts)?;
    let temp = storage::prepare_output_root(&opts.output_root)?;
    tracing::info!(
        root = %opts.output_root.display(),
        tasks = plan.tasks.len(),
        rejected = plan.rejected.len(),
        concurrency = opts.concurrency,
        "starting batch"
    );
    let scheduler = Scheduler::new(fetcher, temp.path(), opts.scheduler_options());
    let handle = match scheduler.dispatch(plan.tasks, plan.rejected) {
        Ok(h) => h,
        Err(e) => {
            temp.close();
            return Err(e);
        }
    };
    Ok(RunningBatch {
        handle,
        output_root: opts.output_root.clone(),
        temp,
    })
}

/// Runs one batch to completion on the calling thread.
pub fn run_batch(
    links: &LinkBatch,
    opts: &BatchOptions,
    fetcher: Arc<dyn Fetch>,
) -> Result<BatchReport, SetupError> {
    Ok(start_batch(links, opts, fetcher)?.wait())
}

/// `run_batch` on tokio's blocking pool.
pub async fn run_batch_async(
    links: LinkBatch,
    opts: BatchOptions,
    fetcher: Arc<dyn Fetch>,
) -> Result<BatchReport, SetupError> {
    tokio::task::spawn_blocking(move || run_batch(&links, &opts, fetcher))
        .await
        .map_err(|e| SetupError::Runner(e.to_string()))?
}

/// The libcurl fetcher configured from `opts`.
pub fn default_fetcher(opts: &BatchOptions) -> Arc<dyn Fetch> {
    Arc::new(CurlFetcher::new(opts.connect_timeout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn opts(root: &Path) -> BatchOptions {
        BatchOptions {
            output_root: root.to_path_buf(),
            ..BatchOptions::default()
        }
    }

    fn links(base: Option<&str>, raw: &[&str]) -> LinkBatch {
        LinkBatch::new(
            base.map(str::to_string),
            raw.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn mixed_batch_splits_tasks_and_rejections() {
        let o = opts(Path::new("/out"));
        let plan = plan_batch(
            &links(
                Some("https://example.com/gallery/"),
                &["https://h/a.jpg", "not a url", "/img/b.jpg", "img.jpg"],
            ),
            &o,
        )
        .unwrap();
        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(plan.rejected.len(), 2);
        assert!(plan
            .rejected
            .iter()
            .all(|r| r.error_kind == ErrorKind::MalformedLocator));
        assert_eq!(plan.tasks[1].locator().as_str(), "https://example.com/img/b.jpg");
        assert_eq!(plan.tasks[1].destination(), Path::new("/out/b.jpg"));
        let ids: Vec<usize> = plan.tasks.iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn duplicates_are_disambiguated_by_default() {
        let o = opts(Path::new("/out"));
        let plan = plan_batch(&links(None, &["https://h/a.jpg", "https://h/a.jpg"]), &o).unwrap();
        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(plan.tasks[0].destination(), Path::new("/out/a.jpg"));
        assert_eq!(plan.tasks[1].destination(), Path::new("/out/a-2.jpg"));
    }

    #[test]
    fn fetch_once_collapses_duplicates() {
        let o = BatchOptions {
            duplicates: DuplicatePolicy::FetchOnce,
            ..opts(Path::new("/out"))
        };
        let plan = plan_batch(
            &links(None, &["https://h/a.jpg", "https://h/a.jpg#x", "https://g/a.jpg"]),
            &o,
        )
        .unwrap();
        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(plan.tasks[1].destination(), Path::new("/out/a-2.jpg"));
    }

    #[test]
    fn options_base_overrides_link_base() {
        let o = BatchOptions {
            base_url: Some("https://override.example/".into()),
            ..opts(Path::new("/out"))
        };
        let plan = plan_batch(&links(Some("https://page.example/"), &["/x.png"]), &o).unwrap();
        assert_eq!(plan.tasks[0].locator().host(), "override.example");
    }

    #[test]
    fn malformed_base_is_setup_error() {
        let o = opts(Path::new("/out"));
        let err = plan_batch(&links(Some("::nope::"), &["https://h/a.jpg"]), &o).unwrap_err();
        assert!(matches!(err, SetupError::InvalidBase { .. }));
    }

    #[test]
    fn unusable_output_root_fails_before_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let file_root = dir.path().join("occupied");
        std::fs::write(&file_root, b"not a dir").unwrap();
        let o = opts(&file_root);
        let fetcher = default_fetcher(&o);
        let err = run_batch(&links(None, &["https://h/a.jpg"]), &o, fetcher)
            .err()
            .unwrap();
        assert!(matches!(err, SetupError::OutputRoot { .. }));
    }

    #[test]
    fn options_from_config() {
        let mut cfg = HarvestConfig::default();
        cfg.concurrency = 9;
        cfg.output_dir = Some(PathBuf::from("/data/img"));
        cfg.duplicates = DuplicatePolicy::FetchOnce;
        cfg.retry = Some(crate::config::RetryConfig {
            max_attempts: 3,
            base_delay_secs: 0.5,
            max_delay_secs: 4,
        });
        let o = BatchOptions::from_config(&cfg);
        assert_eq!(o.concurrency, 9);
        assert_eq!(o.output_root, PathBuf::from("/data/img"));
        assert_eq!(o.duplicates, DuplicatePolicy::FetchOnce);
        assert_eq!(o.retry.max_attempts, 3);
        assert_eq!(o.retry.base_delay, Duration::from_millis(500));
        assert_eq!(o.fetch_timeout, Duration::from_secs(60));
    }

    #[test]
    fn zero_timeouts_from_config_are_clamped() {
        let cfg = HarvestConfig {
            fetch_timeout_secs: 0,
            connect_timeout_secs: 0,
            ..HarvestConfig::default()
        };
        let o = BatchOptions::from_config(&cfg);
        assert_eq!(o.fetch_timeout, Duration::from_secs(1));
        assert_eq!(o.connect_timeout, Duration::from_secs(1));
    }
}
