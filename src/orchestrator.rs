//! # Merge Orchestrator
//!
//! Drives a single merge item end to end:
//!
//! ```text
//! Init -> ConfigValid -> Cloned -> PatchesExtracted -> PatchesFiltered
//!      -> Applied -> Pushed -> Done
//! ```
//!
//! Any step may fail instead, which ends the item. The item owns exactly one
//! working directory in the scratch root, created once its configuration is
//! valid and enabled. When the item fails after both repositories were
//! cloned, or the run is in keep mode, that directory is renamed to a
//! `.keep` sibling so an operator can inspect it and finish the port by
//! hand. Otherwise it is deleted as soon as the item ends.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{error, info, warn};

use crate::config::{resolve, MergeItemConfig, RawItem};
use crate::defaults::{
    FILTERED_PATCH_DIR, KEEP_SUFFIX, PATCH_DIR, ROBOT_IDENTITY, SOURCE_DIR, TARGET_DIR,
};
use crate::error::{Error, ErrorKind, Result};
use crate::filesystem::{remove_dir_if_exists, with_suffix};
use crate::patches;
use crate::publish;
use crate::repository::{GitOperations, RepositoryManager};
use crate::run::RunContext;

/// Progress of one merge item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MergeState {
    Init,
    ConfigValid,
    Cloned,
    PatchesExtracted,
    PatchesFiltered,
    Applied,
    Pushed,
    Done,
}

impl MergeState {
    /// Whether a failure from this state leaves work worth inspecting.
    pub fn retains_on_failure(self) -> bool {
        self >= MergeState::Cloned
    }
}

impl fmt::Display for MergeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MergeState::Init => "init",
            MergeState::ConfigValid => "config-valid",
            MergeState::Cloned => "cloned",
            MergeState::PatchesExtracted => "patches-extracted",
            MergeState::PatchesFiltered => "patches-filtered",
            MergeState::Applied => "applied",
            MergeState::Pushed => "pushed",
            MergeState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Final result of one merge item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Succeeded,
    /// The item is disabled.
    Skipped,
    /// The item's configuration is missing or invalid.
    Invalid { error: String },
    /// A step failed; `state` is the last state reached.
    Failed {
        state: MergeState,
        kind: ErrorKind,
        error: String,
    },
}

/// Report for one merge item.
#[derive(Debug, Clone)]
pub struct MergeReport {
    pub item: String,
    pub outcome: MergeOutcome,
    /// Preserved working directory, if any.
    pub retained: Option<PathBuf>,
}

impl MergeReport {
    pub fn is_failure(&self) -> bool {
        matches!(
            self.outcome,
            MergeOutcome::Failed { .. } | MergeOutcome::Invalid { .. }
        )
    }
}

/// Runs merge items against one git implementation and repository cache.
pub struct Merger {
    git: Arc<dyn GitOperations>,
    repos: RepositoryManager,
}

impl Merger {
    /// Creates a merger whose cache lives at `cache_dir`.
    pub fn new(git: Arc<dyn GitOperations>, cache_dir: PathBuf) -> Self {
        let repos = RepositoryManager::new(git.clone(), cache_dir);
        Self { git, repos }
    }

    /// Processes one merge item from raw configuration to pushed result.
    pub fn merge_item(&self, ctx: &mut RunContext, raw: &RawItem) -> MergeReport {
        let report = |outcome, retained| MergeReport {
            item: raw.name.clone(),
            outcome,
            retained,
        };

        let config = match resolve(&raw.name, &raw.options, ctx.global()) {
            Ok(config) => config,
            Err(e) => {
                error!("[{}] invalid configuration, skipping: {}", raw.name, e);
                return report(
                    MergeOutcome::Invalid {
                        error: e.to_string(),
                    },
                    None,
                );
            }
        };
        if !config.enabled {
            info!("[{}] merge is not enabled, skipping", config.name);
            return report(MergeOutcome::Skipped, None);
        }

        let workdir = ctx.item_dir(&config.name);
        let mut state = MergeState::ConfigValid;
        let result = fs::create_dir_all(&workdir)
            .map_err(Error::from)
            .and_then(|()| self.drive(ctx, &config, &workdir, &mut state));

        let (outcome, retain) = match result {
            Ok(()) => {
                info!("[{}] merge succeeded", config.name);
                (MergeOutcome::Succeeded, ctx.options().keep)
            }
            Err(e) => {
                error!(
                    "[{}] merge failed after reaching state {}: {}",
                    config.name, state, e
                );
                let retain = ctx.options().keep || state.retains_on_failure();
                if state.retains_on_failure() {
                    error!(
                        "[{}] please check the errors above or resolve by hand in the saved working directory",
                        config.name
                    );
                }
                let outcome = MergeOutcome::Failed {
                    state,
                    kind: e.kind(),
                    error: e.to_string(),
                };
                (outcome, retain)
            }
        };

        let retained = self.finish_workdir(ctx, &config.name, &workdir, retain);
        report(outcome, retained)
    }

    fn drive(
        &self,
        ctx: &RunContext,
        config: &MergeItemConfig,
        workdir: &Path,
        state: &mut MergeState,
    ) -> Result<()> {
        let name = &config.name;
        let source = &config.source;
        let target = &config.target;

        if ctx.options().check_connection {
            self.check_connections(config)?;
        }

        let src_dir = workdir.join(SOURCE_DIR);
        let tgt_dir = workdir.join(TARGET_DIR);
        let src = self
            .repos
            .acquire(name, &source.endpoint, &source.branch, &src_dir);
        if let Err(e) = &src {
            error!("[{}] source acquisition failed: {}", name, e);
        }
        let tgt = self
            .repos
            .acquire(name, &target.endpoint, &target.branch, &tgt_dir);
        if let Err(e) = &tgt {
            error!("[{}] target acquisition failed: {}", name, e);
        }
        src?;
        tgt?;
        *state = MergeState::Cloned;

        let raw = patches::extract(
            self.git.as_ref(),
            &src_dir,
            &source.revision_range,
            &workdir.join(PATCH_DIR),
        )?;
        *state = MergeState::PatchesExtracted;

        let filtered = patches::filter(&raw, &workdir.join(FILTERED_PATCH_DIR), ROBOT_IDENTITY)?;
        *state = MergeState::PatchesFiltered;

        publish::apply(self.git.as_ref(), &tgt_dir, &filtered)?;
        *state = MergeState::Applied;

        publish::push(self.git.as_ref(), &tgt_dir, &target.branch)?;
        *state = MergeState::Pushed;

        *state = MergeState::Done;
        Ok(())
    }

    fn check_connections(&self, config: &MergeItemConfig) -> Result<()> {
        let sides = [
            ("source", &config.source.endpoint, &config.source.branch),
            ("target", &config.target.endpoint, &config.target.branch),
        ];
        let mut first_error = None;
        for (side, endpoint, branch) in sides {
            match self.repos.check_connection(endpoint, branch) {
                Ok(()) => info!("[{}] git {} connection SUCCESS", config.name, side),
                Err(e) => {
                    info!("[{}] git {} connection FAILED: {}", config.name, side, e);
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn finish_workdir(
        &self,
        ctx: &mut RunContext,
        item: &str,
        workdir: &Path,
        retain: bool,
    ) -> Option<PathBuf> {
        if !workdir.exists() {
            return None;
        }
        if retain {
            let kept = with_suffix(workdir, KEEP_SUFFIX);
            ctx.mark_retained();
            return match fs::rename(workdir, &kept) {
                Ok(()) => {
                    info!("[{}] working directory saved at {}", item, kept.display());
                    Some(kept)
                }
                Err(e) => {
                    warn!(
                        "[{}] could not rename {}: {}; leaving it in place",
                        item,
                        workdir.display(),
                        e
                    );
                    Some(workdir.to_path_buf())
                }
            };
        }
        if let Err(e) = remove_dir_if_exists(workdir) {
            warn!("[{}] could not clean up {}: {}", item, workdir.display(), e);
        }
        None
    }
}
