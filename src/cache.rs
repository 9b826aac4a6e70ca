//! On-disk cache of previously cloned working copies
//!
//! The cache root holds one entry directory per merge item
//! (`merge_<item>.workdir`). Each entry directory contains any number of
//! complete working copies; a working copy describes itself through the URL
//! of its `origin` remote, so nothing else is recorded. Entries are only ever
//! added: pruning is left to the operator.
//!
//! Storage ([`CacheStore`]) is kept apart from matching ([`find_entry`]),
//! which is a pure function over [`CacheEntry`] descriptors.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};

use crate::config::redact_url;
use crate::defaults::workdir_name;
use crate::error::Result;
use crate::filesystem::copy_tree;

/// A cached working copy and the origin URL it was cloned from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    pub path: PathBuf,
    /// Serialized with credentials removed.
    #[serde(serialize_with = "serialize_redacted")]
    pub origin: String,
}

fn serialize_redacted<S: Serializer>(
    origin: &str,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&redact_url(origin))
}

/// Storage backend for cached working copies.
///
/// This allows the cache to be replaced in tests without touching the
/// real cache directory.
pub trait CacheStore: Send + Sync {
    /// Candidate working copies stored for `item`, in a stable order.
    fn candidates(&self, item: &str) -> Result<Vec<PathBuf>>;

    /// Stores a copy of `working_copy` for `item` under a new, unique name
    /// and returns its location.
    fn save(&self, item: &str, working_copy: &Path) -> Result<PathBuf>;
}

/// Returns the first entry whose origin equals `origin` exactly.
pub fn find_entry<'a>(entries: &'a [CacheEntry], origin: &str) -> Option<&'a CacheEntry> {
    entries.iter().find(|entry| entry.origin == origin)
}

/// The default [`CacheStore`], rooted at a directory on the host filesystem.
#[derive(Debug, Clone)]
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Directory holding every cached working copy of `item`.
    pub fn entry_dir(&self, item: &str) -> PathBuf {
        self.root.join(workdir_name(item))
    }

    /// Names of the items that have an entry directory, sorted.
    pub fn items(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut items = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(item) = name
                .strip_prefix("merge_")
                .and_then(|rest| rest.strip_suffix(".workdir"))
            {
                items.push(item.to_string());
            }
        }
        items.sort();
        Ok(items)
    }
}

impl CacheStore for DiskCache {
    fn candidates(&self, item: &str) -> Result<Vec<PathBuf>> {
        let dir = self.entry_dir(item);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut candidates = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                candidates.push(entry.path());
            }
        }
        candidates.sort();
        Ok(candidates)
    }

    fn save(&self, item: &str, working_copy: &Path) -> Result<PathBuf> {
        let dir = self.entry_dir(item);
        fs::create_dir_all(&dir)?;

        let base = working_copy
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "repo".to_string());
        let destination = (1..)
            .map(|n| dir.join(format!("{}-{}", base, n)))
            .find(|candidate| !candidate.exists())
            .unwrap_or_else(|| dir.join(base));

        if let Err(e) = copy_tree(working_copy, &destination) {
            // Do not leave a half-written entry behind for the next lookup.
            let _ = fs::remove_dir_all(&destination);
            return Err(e);
        }
        Ok(destination)
    }
}
