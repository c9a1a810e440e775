//! CLI for harvest.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use harvest_core::config;
use std::path::{Path, PathBuf};

use commands::{run_checksum, run_config, run_fetch, FetchOverrides};

/// Top-level CLI for harvest.
#[derive(Debug, Parser)]
#[command(name = "harvest")]
#[command(about = "harvest: fetch scraped resource links to disk, concurrently", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Fetch a batch of locators into the output directory.
    Fetch {
        /// Locators to fetch (absolute, or relative to --base).
        locators: Vec<String>,

        /// Read more locators from a file, one per line ("-" for stdin).
        #[arg(long, short = 'i', value_name = "FILE")]
        input: Option<PathBuf>,

        /// URI of the page the links were scraped from (overrides TARGET_URL).
        #[arg(long, value_name = "URL")]
        base: Option<String>,

        /// Output directory (overrides OUTPUT_PATH and config).
        #[arg(long, short = 'o', value_name = "DIR")]
        output: Option<PathBuf>,

        /// Maximum simultaneous fetches.
        #[arg(long, short = 'j', value_name = "N")]
        jobs: Option<usize>,

        /// Per-fetch timeout in seconds.
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Fetch repeated locators once instead of saving each copy.
        #[arg(long)]
        fetch_once: bool,

        /// Replace files that already exist in the output directory.
        #[arg(long)]
        overwrite: bool,

        /// Write the JSON batch report to this file.
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,
    },

    /// Compute SHA-256 of a file (e.g. after download).
    Checksum {
        /// Path to the file.
        path: String,
    },

    /// Show the config file path and the effective configuration.
    Config,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Fetch {
                locators,
                input,
                base,
                output,
                jobs,
                timeout,
                fetch_once,
                overwrite,
                report,
            } => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                let overrides = FetchOverrides {
                    base,
                    output,
                    jobs,
                    timeout_secs: timeout,
                    fetch_once,
                    overwrite,
                };
                run_fetch(&cfg, locators, input.as_deref(), overrides, report.as_deref()).await?;
            }
            CliCommand::Checksum { path } => run_checksum(Path::new(&path)).await?,
            CliCommand::Config => run_config()?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
