//! # Patch Pipeline
//!
//! Turns a revision range of the source working copy into an ordered series
//! of patch files, then produces an anonymized copy of that series.
//!
//! - [`extract`] writes one patch per commit (oldest first) using
//!   `format-patch` naming (`0001-subject.patch`, ...), so lexical order is
//!   commit order.
//! - [`filter`] copies the raw series and rewrites the author of every
//!   patch to the robot identity: the `From:` mail header and any in-body
//!   `From:` line that `git am` would take as the author. The rest of the
//!   commit message, the subject and the diff are left byte-for-byte
//!   untouched.
//!
//! Both directories are kept so an operator can compare them when a merge
//! has to be finished by hand.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::{Error, Result};
use crate::filesystem::{copy_tree, remove_dir_if_exists, sorted_files};
use crate::repository::GitOperations;

const PATCH_EXTENSION: &str = "patch";

/// An ordered series of single-commit patch files in one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchSet {
    dir: PathBuf,
    files: Vec<PathBuf>,
}

impl PatchSet {
    /// Reads the patch files of `dir` in lexical order.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        Ok(Self {
            dir: dir.to_path_buf(),
            files: sorted_files(dir, PATCH_EXTENSION)?,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Patch files, oldest commit first.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Generates the raw patch series for `range` into `out_dir`.
///
/// Any previous content of `out_dir` is removed first, so re-running an item
/// never mixes old and new patches.
pub fn extract(
    git: &dyn GitOperations,
    source: &Path,
    range: &str,
    out_dir: &Path,
) -> Result<PatchSet> {
    if !source.is_dir() {
        return Err(Error::Extraction {
            range: range.to_string(),
            message: format!("source working copy {} does not exist", source.display()),
        });
    }
    remove_dir_if_exists(out_dir)?;

    git.format_patches(source, range, out_dir)
        .map_err(|e| Error::Extraction {
            range: range.to_string(),
            message: e.to_string(),
        })?;

    let patches = if out_dir.is_dir() {
        PatchSet::from_dir(out_dir)?
    } else {
        PatchSet {
            dir: out_dir.to_path_buf(),
            files: Vec::new(),
        }
    };
    if patches.is_empty() {
        return Err(Error::EmptyRange {
            range: range.to_string(),
        });
    }

    info!("{} patches generated at {}", patches.len(), out_dir.display());
    Ok(patches)
}

/// Copies `raw` into `out_dir` and rewrites the author of every patch to
/// `identity`.
pub fn filter(raw: &PatchSet, out_dir: &Path, identity: &str) -> Result<PatchSet> {
    let fail = |path: &Path, e: &dyn std::fmt::Display| Error::Filter {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    remove_dir_if_exists(out_dir).map_err(|e| fail(out_dir, &e))?;
    copy_tree(raw.dir(), out_dir).map_err(|e| fail(out_dir, &e))?;

    let filtered = PatchSet::from_dir(out_dir).map_err(|e| fail(out_dir, &e))?;
    for path in filtered.files() {
        let content = fs::read(path).map_err(|e| fail(path, &e))?;
        let rewritten = anonymize_author(&content, identity)
            .ok_or_else(|| fail(path, &"no From: header found"))?;
        fs::write(path, rewritten).map_err(|e| fail(path, &e))?;
        debug!("Rewrote author of {}", path.display());
    }

    info!(
        "{} filtered patches generated at {}",
        filtered.len(),
        out_dir.display()
    );
    Ok(filtered)
}

/// Where a line sits in a mailbox patch.
enum Section {
    /// Mail headers, up to the first empty line.
    Header,
    /// Start of the message body, where `git am` still honours in-body
    /// `From:`, `Subject:` and `Date:` lines.
    InBodyHeader,
    Body,
}

/// Replaces every author line `git am` would read from a mailbox patch with
/// `From: <identity>`.
///
/// That is the `From:` line of the header block plus any in-body `From:`
/// line at the very start of the message. Folded continuation lines of a
/// replaced field are dropped with it. A `From:` line after ordinary body
/// text, and everything else, is copied verbatim. Returns `None` when the
/// header block has no `From:` line.
pub fn anonymize_author(patch: &[u8], identity: &str) -> Option<Vec<u8>> {
    let replacement = format!("From: {}\n", identity);
    let mut out = Vec::with_capacity(patch.len());
    let mut section = Section::Header;
    let mut replaced = false;
    let mut in_body_fields = false;
    let mut dropping_fold = false;

    for line in patch.split_inclusive(|b| *b == b'\n') {
        let folded = line.starts_with(b" ") || line.starts_with(b"\t");
        if dropping_fold && folded {
            continue;
        }
        dropping_fold = false;
        let blank = line == b"\n" || line == b"\r\n";

        let rewrite = match section {
            Section::Header if blank => {
                section = Section::InBodyHeader;
                false
            }
            Section::Header => !replaced && is_field(line, "from"),
            Section::InBodyHeader if blank => {
                if in_body_fields {
                    section = Section::Body;
                }
                false
            }
            Section::InBodyHeader if is_field(line, "from") => true,
            Section::InBodyHeader => {
                if is_field(line, "subject") || is_field(line, "date") {
                    in_body_fields = true;
                } else if !(folded && in_body_fields) {
                    section = Section::Body;
                }
                false
            }
            Section::Body => false,
        };

        if rewrite {
            if matches!(section, Section::Header) {
                replaced = true;
            } else {
                in_body_fields = true;
            }
            out.extend_from_slice(replacement.as_bytes());
            dropping_fold = true;
        } else {
            out.extend_from_slice(line);
        }
    }

    replaced.then_some(out)
}

/// True if `line` is a `<name>:` field, compared case-insensitively.
fn is_field(line: &[u8], name: &str) -> bool {
    line.len() > name.len()
        && line[..name.len()].eq_ignore_ascii_case(name.as_bytes())
        && line[name.len()] == b':'
}
