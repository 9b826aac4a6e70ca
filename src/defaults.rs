//! Default values for mergerobot.
//!
//! This module provides centralized constants used across the library and
//! the CLI, ensuring consistency and avoiding duplication.

use std::path::PathBuf;
use std::time::Duration;

/// Well-known location of the repository cache when none is configured.
///
/// This can be overridden by the `--cache-dir` CLI flag or the
/// `MERGEROBOT_CACHE` environment variable.
pub const DEFAULT_CACHE_DIR: &str = "/tmp/mergerobot.cache";

/// Config section holding defaults shared by every merge item.
pub const GLOBAL_SECTION: &str = "global_config";

/// Author identity written into every ported patch.
pub const ROBOT_IDENTITY: &str = "mergerobot <>";

/// Suffix given to working directories preserved for inspection.
pub const KEEP_SUFFIX: &str = ".keep";

/// Working-directory layout of a single merge item.
pub const SOURCE_DIR: &str = "merge_src";
pub const TARGET_DIR: &str = "merge_tgt";
pub const PATCH_DIR: &str = "patches";
pub const FILTERED_PATCH_DIR: &str = "patches_filt";

/// Returns the default cache root directory.
pub fn default_cache_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_DIR)
}

/// Directory name used for an item, both in the scratch root and the cache.
pub fn workdir_name(item: &str) -> String {
    format!("merge_{}.workdir", item)
}

/// Timeouts applied to external git commands.
///
/// Network transfers get generous limits; metadata probes are short so a
/// dead remote is noticed quickly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// `ls-remote`, `remote get-url`, `branch --show-current`
    pub probe: Duration,
    /// Local commands such as `checkout` and `am --abort`
    pub command: Duration,
    /// `format-patch` and `am`
    pub patch: Duration,
    pub clone: Duration,
    /// `push` and `pull`
    pub push: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            probe: Duration::from_secs(10),
            command: Duration::from_secs(30),
            patch: Duration::from_secs(100),
            clone: Duration::from_secs(1000),
            push: Duration::from_secs(100),
        }
    }
}
