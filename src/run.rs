//! # Run Driver
//!
//! Drives every configured merge item, one after another, inside a single
//! run-scoped [`RunContext`].
//!
//! The context owns the process-wide scratch root. It is created when the
//! run starts and, when the run ends, either deleted or renamed to a
//! `.keep` sibling: the latter happens in keep mode or when any item left a
//! working directory behind for inspection. One item's failure never stops
//! the following items from being attempted.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{error, info};
use tempfile::TempDir;

use crate::config::{MergePlan, RawOptions};
use crate::defaults::{default_cache_dir, workdir_name, Timeouts, KEEP_SUFFIX};
use crate::error::Result;
use crate::filesystem::with_suffix;
use crate::orchestrator::{MergeOutcome, MergeReport, Merger};
use crate::repository::{DefaultGitOperations, GitOperations};

/// Run-level options.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub cache_dir: PathBuf,
    /// Preserve every item's working directory.
    pub keep: bool,
    /// Probe both remotes before cloning.
    pub check_connection: bool,
    /// Parent directory of the scratch root; the system temp dir if unset.
    pub work_dir: Option<PathBuf>,
    pub timeouts: Timeouts,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            keep: false,
            check_connection: false,
            work_dir: None,
            timeouts: Timeouts::default(),
        }
    }
}

/// State shared by every item of one run.
pub struct RunContext {
    scratch: TempDir,
    global: RawOptions,
    options: RunOptions,
    retain_root: bool,
}

impl RunContext {
    /// Creates the scratch root for a new run.
    pub fn new(global: RawOptions, options: RunOptions) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("mergerobot-");
        let scratch = match &options.work_dir {
            Some(parent) => {
                // git runs inside the working copies, so paths must be absolute
                fs::create_dir_all(parent)?;
                builder.tempdir_in(fs::canonicalize(parent)?)?
            }
            None => builder.tempdir()?,
        };
        Ok(Self {
            scratch,
            global,
            options,
            retain_root: false,
        })
    }

    pub fn scratch_root(&self) -> &Path {
        self.scratch.path()
    }

    /// Working directory of `item` inside the scratch root.
    pub fn item_dir(&self, item: &str) -> PathBuf {
        self.scratch.path().join(workdir_name(item))
    }

    pub fn global(&self) -> &RawOptions {
        &self.global
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Records that an item directory was preserved.
    pub fn mark_retained(&mut self) {
        self.retain_root = true;
    }

    /// Deletes the scratch root, or renames it to `<root>.keep` and returns
    /// the new location.
    pub fn finish(self) -> Result<Option<PathBuf>> {
        if !(self.retain_root || self.options.keep) {
            self.scratch.close()?;
            return Ok(None);
        }
        let path = self.scratch.keep();
        let kept = with_suffix(&path, KEEP_SUFFIX);
        fs::rename(&path, &kept)?;
        Ok(Some(kept))
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub reports: Vec<MergeReport>,
    /// Where the scratch root was preserved, if it was.
    pub kept_root: Option<PathBuf>,
}

impl RunSummary {
    /// True if any item failed or could not be configured.
    pub fn has_failures(&self) -> bool {
        self.reports.iter().any(MergeReport::is_failure)
    }

    pub fn count(&self, predicate: impl Fn(&MergeOutcome) -> bool) -> usize {
        self.reports.iter().filter(|r| predicate(&r.outcome)).count()
    }
}

/// Runs every item of `plan` with the system `git`.
pub fn run(plan: &MergePlan, options: RunOptions) -> Result<RunSummary> {
    let git: Arc<dyn GitOperations> = Arc::new(DefaultGitOperations::new(options.timeouts));
    let merger = Merger::new(git, options.cache_dir.clone());
    run_with(plan, options, &merger)
}

/// Runs every item of `plan` with the given merger.
pub fn run_with(plan: &MergePlan, options: RunOptions, merger: &Merger) -> Result<RunSummary> {
    let mut ctx = RunContext::new(plan.global.clone(), options)?;
    info!("Working dir at: {}", ctx.scratch_root().display());

    let mut reports = Vec::with_capacity(plan.items.len());
    for item in &plan.items {
        info!("================ Processing merge {} ================", item.name);
        reports.push(merger.merge_item(&mut ctx, item));
    }

    let scratch = ctx.scratch_root().to_path_buf();
    let kept_root = match ctx.finish() {
        Ok(kept_root) => kept_root,
        Err(e) => {
            error!("Could not finalize working dir {}: {}", scratch.display(), e);
            None
        }
    };
    if let Some(root) = &kept_root {
        info!("Saved working dir at: {}", root.display());
        for retained in reports.iter_mut().filter_map(|r| r.retained.as_mut()) {
            if let Ok(relative) = retained.strip_prefix(&scratch) {
                *retained = root.join(relative);
            }
        }
    }

    let summary = RunSummary {
        reports,
        kept_root,
    };
    info!(
        "Run finished: {} succeeded, {} failed, {} skipped",
        summary.count(|o| matches!(o, MergeOutcome::Succeeded)),
        summary.count(|o| matches!(o, MergeOutcome::Failed { .. } | MergeOutcome::Invalid { .. })),
        summary.count(|o| matches!(o, MergeOutcome::Skipped)),
    );
    Ok(summary)
}
