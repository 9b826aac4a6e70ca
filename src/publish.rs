//! Apply and push stage.
//!
//! Patches are applied as one mailbox session in lexical file order, which
//! matches commit order by construction. A failed session is aborted so the
//! target branch is left exactly as it was; there is no partial series and
//! no automatic retry.

use std::path::Path;

use log::{error, info};

use crate::error::{Error, Result};
use crate::patches::PatchSet;
use crate::repository::GitOperations;

/// Applies `patches` onto the current branch of `target`.
pub fn apply(git: &dyn GitOperations, target: &Path, patches: &PatchSet) -> Result<()> {
    if !target.is_dir() {
        return Err(Error::Apply {
            count: patches.len(),
            message: format!("target working copy {} does not exist", target.display()),
        });
    }

    let mut files = patches.files().to_vec();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    match git.apply_patches(target, &files) {
        Ok(()) => {
            info!("{} patches applied successfully", files.len());
            Ok(())
        }
        Err(e) => {
            error!("Applying patches failed, aborting: {}", e);
            if let Err(abort) = git.abort_apply(target) {
                error!(
                    "Could not abort patch application in {}: {}",
                    target.display(),
                    abort
                );
            }
            Err(Error::Apply {
                count: files.len(),
                message: e.to_string(),
            })
        }
    }
}

/// Pushes `branch` of `target` to its origin.
pub fn push(git: &dyn GitOperations, target: &Path, branch: &str) -> Result<()> {
    git.push(target, branch).map_err(|e| Error::Push {
        branch: branch.to_string(),
        message: e.to_string(),
    })?;
    info!("Push to {} succeeded", branch);
    Ok(())
}
