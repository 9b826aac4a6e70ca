//! Shared test utilities for integration and E2E tests.
//!
//! This module provides fixtures for writing merge configurations and for
//! building throwaway git repositories on the local filesystem, so the
//! binary can be driven against `file://` remotes without network access.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! let fixture = TestFixture::new().with_config(configs::VALID);
//! ```

use assert_fs::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::configs;
    #[allow(unused_imports)]
    pub use super::GitFixture;
    #[allow(unused_imports)]
    pub use super::TestFixture;
}

/// Merge configuration snippets for testing.
#[allow(dead_code)]
pub mod configs {
    /// Two well-formed items, one of them disabled.
    pub const VALID: &str = r#"
[global_config]
src_user =
src_token =
tgt_user = robot
tgt_token = s3cret
src_branch = main
tgt_branch = vendor

[kernel]
src = https://git.example.com/upstream/kernel.git
tgt = https://git.example.com/vendor/kernel.git
src_rev = 1a2b3c...4d5e6f

[docs]
src = https://git.example.com/upstream/docs.git
tgt = https://git.example.com/vendor/docs.git
src_rev = aaaa...bbbb
enabled = no
"#;

    /// One valid item and one with a two-dot range.
    pub const TWO_DOT_RANGE: &str = r#"
[global_config]
src_user =
src_token =
tgt_user =
tgt_token =
src_branch = main
tgt_branch = main

[good]
src = https://git.example.com/a.git
tgt = https://git.example.com/b.git
src_rev = 1a2b3c...4d5e6f

[bad]
src = https://git.example.com/c.git
tgt = https://git.example.com/d.git
src_rev = 1a2b3c..4d5e6f
"#;

    /// An item missing its target branch.
    pub const MISSING_KEY: &str = r#"
[lonely]
src = https://git.example.com/a.git
src_branch = main
src_user =
src_token =
src_rev = 1a2b3c...4d5e6f
tgt = https://git.example.com/b.git
tgt_user =
tgt_token =
"#;
}

/// A test fixture that provides a temporary directory with optional config.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add a `merge.ini` configuration file with the given content.
    pub fn with_config(self, content: &str) -> Self {
        self.temp_dir
            .child("merge.ini")
            .write_str(content)
            .expect("Failed to write config file");
        self
    }

    /// Get the path to the temporary directory.
    #[allow(dead_code)]
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Get the path to the config file.
    #[allow(dead_code)]
    pub fn config_path(&self) -> PathBuf {
        self.temp_dir.path().join("merge.ini")
    }

    /// Create a child path in the temp directory.
    #[allow(dead_code)]
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `git` in `dir` with a fixed identity and returns trimmed stdout.
#[allow(dead_code)]
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "Original Author")
        .env("GIT_AUTHOR_EMAIL", "author@example.com")
        .env("GIT_COMMITTER_NAME", "Original Author")
        .env("GIT_COMMITTER_EMAIL", "author@example.com")
        .env("GIT_CONFIG_GLOBAL", "/dev/null")
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A pair of bare repositories standing in for the source and target remotes.
#[allow(dead_code)]
pub struct GitFixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl GitFixture {
    /// Creates `source.git` and `target.git` sharing one base commit on
    /// `main`, plus `commits` extra commits on the source only. The commit
    /// bodies mention a `From:` line after ordinary text.
    pub fn new(commits: usize) -> Self {
        Self::with_body(commits, "Ported from upstream.\nFrom: not a header")
    }

    /// Like [`GitFixture::new`], with `body` as every commit's message body.
    pub fn with_body(commits: usize, body: &str) -> Self {
        let temp_dir = assert_fs::TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        let seed = root.join("seed");
        fs::create_dir_all(&seed).unwrap();

        git(&seed, &["init", "--quiet", "--initial-branch", "main"]);
        fs::write(seed.join("README"), "base\n").unwrap();
        git(&seed, &["add", "README"]);
        git(&seed, &["commit", "--quiet", "-m", "base"]);

        for name in ["source.git", "target.git"] {
            git(root, &["clone", "--quiet", "--bare", "seed", name]);
        }

        let work = root.join("source-work");
        git(root, &["clone", "--quiet", "source.git", "source-work"]);
        for n in 1..=commits {
            fs::write(work.join(format!("file{}.txt", n)), format!("change {}\n", n)).unwrap();
            git(&work, &["add", "."]);
            git(
                &work,
                &["commit", "--quiet", "-m", &format!("change {}", n), "-m", body],
            );
        }
        git(&work, &["push", "--quiet", "origin", "main"]);

        Self { temp_dir }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn source_url(&self) -> String {
        format!("file://{}", self.path().join("source.git").display())
    }

    pub fn target_url(&self) -> String {
        format!("file://{}", self.path().join("target.git").display())
    }

    /// `<base>...<source head>` covering every extra source commit.
    pub fn range(&self) -> String {
        let work = self.path().join("source-work");
        let base = git(&work, &["rev-list", "--max-parents=0", "HEAD"]);
        let head = git(&work, &["rev-parse", "HEAD"]);
        format!("{}...{}", base, head)
    }

    /// Head of `main` in the target remote.
    pub fn target_head(&self) -> String {
        git(&self.path().join("target.git"), &["rev-parse", "main"])
    }

    /// Authors of the target's `main`, newest first.
    pub fn target_authors(&self) -> Vec<String> {
        git(
            &self.path().join("target.git"),
            &["log", "--format=%an <%ae>", "main"],
        )
        .lines()
        .map(str::to_string)
        .collect()
    }

    /// Commit messages of the target's `main`, newest first.
    pub fn target_messages(&self) -> String {
        git(&self.path().join("target.git"), &["log", "--format=%B", "main"])
    }

    /// A merge configuration with a single item `port` for this fixture.
    pub fn config(&self) -> String {
        format!(
            r#"
[port]
src = {}
src_branch = main
src_user =
src_token =
src_rev = {}
tgt = {}
tgt_branch = main
tgt_user =
tgt_token =
"#,
            self.source_url(),
            self.range(),
            self.target_url()
        )
    }
}
