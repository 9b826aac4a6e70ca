//! # Error Handling
//!
//! This module defines the centralized error type for `mergerobot`. It uses
//! `thiserror` to describe every failure mode of a merge run with enough
//! context (item, command, exit status, stderr) to diagnose a problem from
//! the log alone, without re-running.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum. Each variant carries the context needed to
//!   explain the failure.
//! - **`ErrorKind`**: A coarse classification of `Error` used by the
//!   orchestrator to decide how a failure affects the merge item (skip the
//!   item, degrade to a fresh clone, or abort and retain the working
//!   directory).
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! URLs stored in errors are always redacted; credentials never reach the
//! log through an error message.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for mergerobot operations
#[derive(Error, Debug)]
pub enum Error {
    /// A required option is absent from both the item and the global defaults.
    #[error("Merge item '{item}' is missing required option '{key}'")]
    MissingConfig { item: String, key: String },

    /// The `src_rev` option is not a `<rev>...<rev>` range.
    #[error("Merge item '{item}': '{range}' is not a valid revision range (expected <rev>...<rev>)")]
    InvalidRevisionRange { item: String, range: String },

    /// An option has a value that cannot be interpreted.
    #[error("Merge item '{item}': invalid value '{value}' for option '{key}'")]
    InvalidConfigValue {
        item: String,
        key: String,
        value: String,
    },

    /// The configuration file could not be read or parsed.
    #[error("Configuration file error for {}: {message}", path.display())]
    ConfigFile { path: PathBuf, message: String },

    /// A repository cache operation failed.
    #[error("Cache operation error: {message}")]
    Cache { message: String },

    /// A cache copy would overwrite an existing working copy.
    #[error("Cache copy refused: destination {} already exists", path.display())]
    CacheCollision { path: PathBuf },

    /// Cloning a remote branch failed.
    #[error("Git clone error for {url}@{branch}: {message}")]
    Clone {
        url: String,
        branch: String,
        message: String,
    },

    /// A remote did not answer the connection probe.
    #[error("Connection test failed for {url}@{branch}: {message}")]
    Connection {
        url: String,
        branch: String,
        message: String,
    },

    /// Patch generation from the source working copy failed.
    #[error("Patch extraction failed for range {range}: {message}")]
    Extraction { range: String, message: String },

    /// The revision range produced no patches.
    #[error("No patches generated for revision range {range}")]
    EmptyRange { range: String },

    /// Rewriting a patch file failed.
    #[error("Patch filter failed for {}: {message}", path.display())]
    Filter { path: PathBuf, message: String },

    /// The patch series did not apply cleanly onto the target branch.
    #[error("Applying {count} patches failed: {message}")]
    Apply { count: usize, message: String },

    /// Pushing the target branch failed.
    #[error("Push to {branch} failed: {message}")]
    Push { branch: String, message: String },

    /// A git command exited with a non-zero status.
    #[error("Git command failed: git {command} (exit status {status}) - {stderr}")]
    GitCommand {
        command: String,
        status: String,
        stderr: String,
    },

    /// A git command exceeded its timeout and was killed.
    #[error("Git command timed out after {}s: git {command}", timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid or missing configuration; the item is skipped.
    Config,
    /// Cache trouble; callers degrade to a fresh clone.
    Cache,
    Clone,
    Extraction,
    Filter,
    Apply,
    Push,
    /// Process or I/O plumbing failures not tied to a single stage.
    Other,
}

impl Error {
    /// Classifies this error into the stage it belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingConfig { .. }
            | Error::InvalidRevisionRange { .. }
            | Error::InvalidConfigValue { .. }
            | Error::ConfigFile { .. } => ErrorKind::Config,
            Error::Cache { .. } | Error::CacheCollision { .. } => ErrorKind::Cache,
            Error::Clone { .. } | Error::Connection { .. } => ErrorKind::Clone,
            Error::Extraction { .. } | Error::EmptyRange { .. } => ErrorKind::Extraction,
            Error::Filter { .. } => ErrorKind::Filter,
            Error::Apply { .. } => ErrorKind::Apply,
            Error::Push { .. } => ErrorKind::Push,
            Error::GitCommand { .. } | Error::Timeout { .. } | Error::Io(_) => {
                ErrorKind::Other
            }
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
