//! # Run Command Implementation
//!
//! Drives every merge item of the configuration file, in file order. The
//! command fails (non-zero exit) if any item failed or had an invalid
//! configuration; disabled items do not count as failures.

use anyhow::{bail, Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

use mergerobot::config;
use mergerobot::defaults::{Timeouts, DEFAULT_CACHE_DIR};
use mergerobot::orchestrator::MergeOutcome;
use mergerobot::run::{self, RunOptions};

/// Run all configured merges
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the merge configuration file.
    #[arg(long, value_name = "FILE", env = "MERGEROBOT_CONFIG")]
    pub config: PathBuf,

    /// Directory holding cached working copies between runs.
    #[arg(
        short,
        long,
        value_name = "DIR",
        env = "MERGEROBOT_CACHE",
        default_value = DEFAULT_CACHE_DIR
    )]
    pub cache_dir: PathBuf,

    /// Keep every working directory, even for successful merges.
    #[arg(short, long)]
    pub keep: bool,

    /// Probe both remotes before cloning.
    #[arg(long)]
    pub check_connection: bool,

    /// Parent directory for the run's scratch directory (defaults to the
    /// system temp directory).
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// Timeout for a single clone, in seconds.
    #[arg(long, value_name = "SECS")]
    pub clone_timeout: Option<u64>,
}

/// Execute the `run` command.
pub fn execute(args: RunArgs) -> Result<()> {
    let plan = config::from_file(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;

    let mut timeouts = Timeouts::default();
    if let Some(secs) = args.clone_timeout {
        timeouts.clone = Duration::from_secs(secs);
    }
    let options = RunOptions {
        cache_dir: args.cache_dir,
        keep: args.keep,
        check_connection: args.check_connection,
        work_dir: args.work_dir,
        timeouts,
    };

    let summary = run::run(&plan, options).context("Merge run could not be started")?;

    for report in &summary.reports {
        let verdict = match &report.outcome {
            MergeOutcome::Succeeded => "succeeded".to_string(),
            MergeOutcome::Skipped => "skipped (disabled)".to_string(),
            MergeOutcome::Invalid { error } => format!("invalid configuration: {}", error),
            MergeOutcome::Failed { state, error, .. } => {
                format!("failed after {}: {}", state, error)
            }
        };
        println!("{}: {}", report.item, verdict);
        if let Some(path) = &report.retained {
            println!("  working directory: {}", path.display());
        }
    }

    let failed = summary.reports.iter().filter(|r| r.is_failure()).count();
    if failed > 0 {
        bail!("{} of {} merge items failed", failed, summary.reports.len());
    }
    Ok(())
}
