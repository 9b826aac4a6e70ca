//! # Repository Acquisition
//!
//! This module provides the `RepositoryManager`, which obtains a working copy
//! of a remote branch for a merge item, reusing the on-disk cache when it can.
//!
//! ## Design
//!
//! The `RepositoryManager` is built around two traits:
//!
//! - **`GitOperations`**: Every version-control action the merge engine
//!   needs (clone, branch probes, patch generation, patch application, push).
//! - **`CacheStore`** (in [`crate::cache`]): Where cached working copies live.
//!
//! In the binary, `DefaultGitOperations` and `DiskCache` are used; they wrap
//! the system `git` command and the host filesystem. Tests replace them with
//! fakes so the acquisition and merge logic can be exercised without a
//! network.
//!
//! ## Acquisition
//!
//! A cached working copy is used only if its origin URL matches exactly and
//! it can be brought up to date with the requested branch. Anything less
//! falls back to a fresh clone; a stale copy is never used silently.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::cache::{find_entry, CacheEntry, CacheStore, DiskCache};
use crate::config::RemoteEndpoint;
use crate::defaults::Timeouts;
use crate::error::{Error, Result};
use crate::filesystem::{copy_tree, remove_dir_if_exists};

/// Version-control capability used by the merge engine.
pub trait GitOperations: Send + Sync {
    /// Clones `branch` of `url` into `target_dir`.
    fn clone_branch(&self, url: &str, branch: &str, target_dir: &Path) -> Result<()>;

    /// Returns the head commit of `branch` on the remote, if the branch exists.
    fn list_branch_head(&self, url: &str, branch: &str) -> Result<Option<String>>;

    /// URL of the `origin` remote recorded in a working copy.
    fn origin_url(&self, repo: &Path) -> Result<String>;

    fn current_branch(&self, repo: &Path) -> Result<String>;

    fn checkout(&self, repo: &Path, branch: &str) -> Result<()>;

    /// Brings the current branch up to date with its upstream.
    fn pull(&self, repo: &Path) -> Result<()>;

    /// Writes one patch file per commit of `range` into `out_dir`.
    fn format_patches(&self, repo: &Path, range: &str, out_dir: &Path) -> Result<()>;

    /// Applies `patches` in order onto the current branch.
    fn apply_patches(&self, repo: &Path, patches: &[PathBuf]) -> Result<()>;

    /// Rolls back an interrupted [`GitOperations::apply_patches`].
    fn abort_apply(&self, repo: &Path) -> Result<()>;

    fn push(&self, repo: &Path, branch: &str) -> Result<()>;
}

/// The default implementation of `GitOperations`, which uses the system's
/// `git` command.
#[derive(Debug, Clone, Default)]
pub struct DefaultGitOperations {
    timeouts: Timeouts,
}

impl DefaultGitOperations {
    pub fn new(timeouts: Timeouts) -> Self {
        Self { timeouts }
    }
}

impl GitOperations for DefaultGitOperations {
    fn clone_branch(&self, url: &str, branch: &str, target_dir: &Path) -> Result<()> {
        crate::git::clone_branch(url, branch, target_dir, self.timeouts.clone)
    }

    fn list_branch_head(&self, url: &str, branch: &str) -> Result<Option<String>> {
        crate::git::list_branch_head(url, branch, self.timeouts.probe)
    }

    fn origin_url(&self, repo: &Path) -> Result<String> {
        crate::git::origin_url(repo, self.timeouts.probe)
    }

    fn current_branch(&self, repo: &Path) -> Result<String> {
        crate::git::current_branch(repo, self.timeouts.probe)
    }

    fn checkout(&self, repo: &Path, branch: &str) -> Result<()> {
        crate::git::checkout(repo, branch, self.timeouts.command)
    }

    fn pull(&self, repo: &Path) -> Result<()> {
        crate::git::pull(repo, self.timeouts.push)
    }

    fn format_patches(&self, repo: &Path, range: &str, out_dir: &Path) -> Result<()> {
        crate::git::format_patch(repo, range, out_dir, self.timeouts.patch)
    }

    fn apply_patches(&self, repo: &Path, patches: &[PathBuf]) -> Result<()> {
        crate::git::am(repo, patches, self.timeouts.patch)
    }

    fn abort_apply(&self, repo: &Path) -> Result<()> {
        crate::git::am_abort(repo, self.timeouts.command)
    }

    fn push(&self, repo: &Path, branch: &str) -> Result<()> {
        crate::git::push(repo, branch, self.timeouts.push)
    }
}

/// How a working copy was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquisition {
    /// Copied from the cache entry at the given path.
    Cached(PathBuf),
    /// Freshly cloned from the remote.
    Cloned,
}

/// Obtains working copies, consulting the cache before the network.
pub struct RepositoryManager {
    git: Arc<dyn GitOperations>,
    cache: Box<dyn CacheStore>,
}

impl RepositoryManager {
    /// Creates a manager backed by a [`DiskCache`] at `cache_root`.
    pub fn new(git: Arc<dyn GitOperations>, cache_root: PathBuf) -> Self {
        Self::with_cache(git, Box::new(DiskCache::new(cache_root)))
    }

    pub fn with_cache(git: Arc<dyn GitOperations>, cache: Box<dyn CacheStore>) -> Self {
        Self { git, cache }
    }

    /// Describes the cached working copies of `item`.
    ///
    /// Candidates whose origin cannot be read are left out.
    pub fn cache_entries(&self, item: &str) -> Result<Vec<CacheEntry>> {
        let mut entries = Vec::new();
        for path in self.cache.candidates(item)? {
            match self.git.origin_url(&path) {
                Ok(origin) => entries.push(CacheEntry { path, origin }),
                Err(e) => debug!("[{}] ignoring cache candidate {}: {}", item, path.display(), e),
            }
        }
        Ok(entries)
    }

    /// Places an up-to-date cached copy of `url`@`branch` at `destination`.
    ///
    /// Returns the cache entry used, or `None` when the cache cannot serve
    /// the request. Cache problems are logged and never fatal.
    pub fn lookup_cached(
        &self,
        item: &str,
        url: &str,
        branch: &str,
        destination: &Path,
    ) -> Option<PathBuf> {
        match self.try_lookup(item, url, branch, destination) {
            Ok(found) => found,
            Err(e) => {
                warn!("[{}] cache unavailable, falling back to clone: {}", item, e);
                None
            }
        }
    }

    fn try_lookup(
        &self,
        item: &str,
        url: &str,
        branch: &str,
        destination: &Path,
    ) -> Result<Option<PathBuf>> {
        let entries = self.cache_entries(item)?;
        let Some(entry) = find_entry(&entries, url) else {
            debug!("[{}] no cache entry matches the remote", item);
            return Ok(None);
        };

        if destination.exists() {
            return Err(Error::CacheCollision {
                path: destination.to_path_buf(),
            });
        }
        if let Err(e) = copy_tree(&entry.path, destination) {
            let _ = remove_dir_if_exists(destination);
            return Err(e);
        }

        if let Err(e) = self.sync_branch(destination, branch) {
            // A copy that cannot be synced must not be mistaken for a clone.
            let _ = remove_dir_if_exists(destination);
            return Err(Error::Cache {
                message: format!(
                    "cached copy {} could not be synced to {}: {}",
                    entry.path.display(),
                    branch,
                    e
                ),
            });
        }
        Ok(Some(entry.path.clone()))
    }

    fn sync_branch(&self, repo: &Path, branch: &str) -> Result<()> {
        let current = self.git.current_branch(repo)?;
        if current != branch {
            debug!("Switching cached copy from '{}' to '{}'", current, branch);
            self.git.checkout(repo, branch)?;
        }
        self.git.pull(repo)
    }

    /// Stores `working_copy` in the cache. Failures are logged, not fatal.
    pub fn store_cached(&self, item: &str, working_copy: &Path) -> bool {
        match self.cache.save(item, working_copy) {
            Ok(path) => {
                debug!("[{}] cached working copy at {}", item, path.display());
                true
            }
            Err(e) => {
                warn!("[{}] could not cache {}: {}", item, working_copy.display(), e);
                false
            }
        }
    }

    /// Obtains a working copy of `branch` from `endpoint` at `destination`.
    pub fn acquire(
        &self,
        item: &str,
        endpoint: &RemoteEndpoint,
        branch: &str,
        destination: &Path,
    ) -> Result<Acquisition> {
        let url = endpoint.authenticated_url();

        if let Some(entry) = self.lookup_cached(item, &url, branch, destination) {
            info!(
                "[{}] {}@{} restored from cache ({})",
                item,
                endpoint.display_url(),
                branch,
                entry.display()
            );
            return Ok(Acquisition::Cached(entry));
        }

        info!("[{}] cloning {}@{}", item, endpoint.display_url(), branch);
        self.git.clone_branch(&url, branch, destination)?;
        info!("[{}] clone of {}@{} succeeded", item, endpoint.display_url(), branch);

        self.store_cached(item, destination);
        Ok(Acquisition::Cloned)
    }

    /// Probes that `branch` exists on the remote.
    pub fn check_connection(&self, endpoint: &RemoteEndpoint, branch: &str) -> Result<()> {
        let url = endpoint.authenticated_url();
        match self.git.list_branch_head(&url, branch) {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(Error::Connection {
                url: endpoint.display_url(),
                branch: branch.to_string(),
                message: "branch not found on remote".to_string(),
            }),
            Err(e) => Err(Error::Connection {
                url: endpoint.display_url(),
                branch: branch.to_string(),
                message: e.to_string(),
            }),
        }
    }
}
