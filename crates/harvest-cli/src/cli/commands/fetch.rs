//! `harvest fetch`: run one batch and print the report.

use anyhow::{bail, Context, Result};
use harvest_core::config::HarvestConfig;
use harvest_core::links::read_link_list;
use harvest_core::pipeline::default_fetcher;
use harvest_core::{run_batch_async, BatchOptions, BatchReport, DuplicatePolicy, LinkBatch};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Command-line values that override the config file.
#[derive(Debug, Default, Clone)]
pub struct FetchOverrides {
    pub base: Option<String>,
    pub output: Option<PathBuf>,
    pub jobs: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub fetch_once: bool,
    pub overwrite: bool,
}

impl FetchOverrides {
    pub fn apply(self, mut opts: BatchOptions) -> BatchOptions {
        if let Some(base) = self.base {
            opts.base_url = Some(base);
        }
        if let Some(output) = self.output {
            opts.output_root = output;
        }
        if let Some(jobs) = self.jobs {
            opts.concurrency = jobs.max(1);
        }
        if let Some(secs) = self.timeout_secs {
            opts.fetch_timeout = Duration::from_secs(secs.max(1));
        }
        if self.fetch_once {
            opts.duplicates = DuplicatePolicy::FetchOnce;
        }
        if self.overwrite {
            opts.overwrite = true;
        }
        opts
    }
}

/// Positional locators first, then the contents of `input` in file order.
pub fn collect_locators(mut locators: Vec<String>, input: Option<&Path>) -> Result<Vec<String>> {
    match input {
        Some(p) if p == Path::new("-") => {
            locators.extend(read_link_list(io::stdin().lock()).context("read links from stdin")?);
        }
        Some(p) => {
            let f = File::open(p).with_context(|| format!("open link list {}", p.display()))?;
            locators.extend(read_link_list(BufReader::new(f))?);
        }
        None => {}
    }
    Ok(locators)
}

pub async fn run_fetch(
    cfg: &HarvestConfig,
    locators: Vec<String>,
    input: Option<&Path>,
    overrides: FetchOverrides,
    report_path: Option<&Path>,
) -> Result<()> {
    let raw = collect_locators(locators, input)?;
    if raw.is_empty() {
        bail!("no locators given (pass them as arguments or with --input)");
    }

    let opts = overrides.apply(BatchOptions::from_config(cfg));
    let fetcher = default_fetcher(&opts);
    let output_root = opts.output_root.clone();
    let report = run_batch_async(LinkBatch::new(None, raw), opts, fetcher).await?;

    print_report(&report, &output_root);
    if let Some(path) = report_path {
        let json = report.to_json_pretty().context("serialize report")?;
        std::fs::write(path, json).with_context(|| format!("write report {}", path.display()))?;
        println!("Report written to {}", path.display());
    }
    Ok(())
}

fn print_report(report: &BatchReport, output_root: &Path) {
    println!(
        "Fetched {}/{} into {} ({} failed)",
        report.succeeded_count(),
        report.total(),
        output_root.display(),
        report.failed_count()
    );
    for f in report.failed() {
        println!("  FAILED [{}] {}: {}", f.error_kind, f.locator, f.error_message);
    }
}
