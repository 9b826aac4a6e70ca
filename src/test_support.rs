//! In-process fake of [`GitOperations`] shared by the unit tests.
//!
//! A fake working copy is a plain directory whose metadata lives in small
//! files: `ORIGIN`, `BRANCH` and `COMMITS` (one applied patch per line).
//! Because everything is on disk, fake working copies can be cached, copied
//! and inspected exactly like real ones.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::repository::GitOperations;

const ORIGIN: &str = "ORIGIN";
const BRANCH: &str = "BRANCH";
const COMMITS: &str = "COMMITS";
const AM_BACKUP: &str = "AM_BACKUP";

pub struct FakeGit {
    calls: Mutex<Vec<String>>,
    patch_count: usize,
    unreachable: Vec<String>,
    fail_pull: bool,
    fail_format: bool,
    fail_apply_at: Option<usize>,
    fail_push: bool,
    occupy_keep_path: bool,
}

impl FakeGit {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            patch_count: 3,
            unreachable: Vec::new(),
            fail_pull: false,
            fail_format: false,
            fail_apply_at: None,
            fail_push: false,
            occupy_keep_path: false,
        }
    }

    pub fn with_patches(mut self, count: usize) -> Self {
        self.patch_count = count;
        self
    }

    /// Makes clones of and probes against `url` fail.
    pub fn failing_clone(mut self, url: &str) -> Self {
        self.unreachable.push(url.to_string());
        self
    }

    pub fn failing_pull(mut self) -> Self {
        self.fail_pull = true;
        self
    }

    pub fn failing_format(mut self) -> Self {
        self.fail_format = true;
        self
    }

    /// Makes the `n`th patch (1-based) of an apply fail.
    pub fn failing_apply_at(mut self, n: usize) -> Self {
        self.fail_apply_at = Some(n);
        self
    }

    pub fn failing_push(mut self) -> Self {
        self.fail_push = true;
        self
    }

    /// Puts a file at `<scratch root>.keep` on the first clone, so the
    /// scratch root cannot be renamed at the end of the run.
    pub fn occupying_keep_path(mut self) -> Self {
        self.occupy_keep_path = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded calls whose name starts with `op`.
    pub fn count_calls(&self, op: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.split_whitespace().next() == Some(op))
            .count()
    }

    /// Patches applied to a fake working copy, oldest first.
    pub fn commits(repo: &Path) -> Vec<String> {
        fs::read_to_string(repo.join(COMMITS))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn failure(command: &str) -> Error {
        Error::GitCommand {
            command: command.to_string(),
            status: "1".to_string(),
            stderr: "simulated failure".to_string(),
        }
    }
}

pub fn sample_patch(n: usize, total: usize) -> String {
    format!(
        "From {n:040} Mon Sep 17 00:00:00 2001\n\
         From: Original Author <author@example.com>\n\
         Date: Tue, 1 Oct 2024 10:0{n}:00 +0000\n\
         Subject: [PATCH {n}/{total}] change {n}\n\
         \n\
         Body of change {n}.\n\
         From: this line is part of the message\n\
         ---\n \
         file.txt | 1 +\n\
         \n\
         diff --git a/file.txt b/file.txt\n\
         +From: added line {n}\n\
         -- \n\
         2.43.0\n"
    )
}

impl GitOperations for FakeGit {
    fn clone_branch(&self, url: &str, branch: &str, target_dir: &Path) -> Result<()> {
        self.record(format!("clone {} {}", url, branch));
        if self.unreachable.iter().any(|u| u == url) {
            return Err(Error::Clone {
                url: url.to_string(),
                branch: branch.to_string(),
                message: "simulated failure".to_string(),
            });
        }
        if self.occupy_keep_path {
            // <root>/merge_<item>.workdir/merge_src
            if let Some(root) = target_dir.parent().and_then(Path::parent) {
                let blocker = crate::filesystem::with_suffix(root, crate::defaults::KEEP_SUFFIX);
                fs::create_dir_all(&blocker)?;
                fs::write(blocker.join("occupied"), "")?;
            }
        }
        fs::create_dir_all(target_dir)?;
        fs::write(target_dir.join(ORIGIN), url)?;
        fs::write(target_dir.join(BRANCH), branch)?;
        fs::write(target_dir.join(COMMITS), "")?;
        Ok(())
    }

    fn list_branch_head(&self, url: &str, branch: &str) -> Result<Option<String>> {
        self.record(format!("ls-remote {} {}", url, branch));
        if self.unreachable.iter().any(|u| u == url) {
            return Err(Self::failure("ls-remote"));
        }
        Ok(Some("0".repeat(40)))
    }

    fn origin_url(&self, repo: &Path) -> Result<String> {
        Ok(fs::read_to_string(repo.join(ORIGIN))?)
    }

    fn current_branch(&self, repo: &Path) -> Result<String> {
        Ok(fs::read_to_string(repo.join(BRANCH))?)
    }

    fn checkout(&self, repo: &Path, branch: &str) -> Result<()> {
        self.record(format!("checkout {}", branch));
        fs::write(repo.join(BRANCH), branch)?;
        Ok(())
    }

    fn pull(&self, repo: &Path) -> Result<()> {
        self.record(format!("pull {}", repo.display()));
        if self.fail_pull {
            return Err(Self::failure("pull --ff-only"));
        }
        Ok(())
    }

    fn format_patches(&self, repo: &Path, range: &str, out_dir: &Path) -> Result<()> {
        self.record(format!("format-patch {} {}", range, repo.display()));
        if self.fail_format {
            return Err(Self::failure("format-patch"));
        }
        fs::create_dir_all(out_dir)?;
        for n in 1..=self.patch_count {
            let name = format!("{:04}-change-{}.patch", n, n);
            fs::write(out_dir.join(name), sample_patch(n, self.patch_count))?;
        }
        Ok(())
    }

    fn apply_patches(&self, repo: &Path, patches: &[PathBuf]) -> Result<()> {
        let names: Vec<String> = patches
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        self.record(format!("am {}", names.join(" ")));

        let before = fs::read_to_string(repo.join(COMMITS))?;
        fs::write(repo.join(AM_BACKUP), &before)?;
        let mut commits = before;
        for (index, name) in names.iter().enumerate() {
            if self.fail_apply_at == Some(index + 1) {
                return Err(Self::failure("am"));
            }
            commits.push_str(name);
            commits.push('\n');
            fs::write(repo.join(COMMITS), &commits)?;
        }
        fs::remove_file(repo.join(AM_BACKUP))?;
        Ok(())
    }

    fn abort_apply(&self, repo: &Path) -> Result<()> {
        self.record("am --abort".to_string());
        let backup = repo.join(AM_BACKUP);
        if !backup.exists() {
            return Err(Self::failure("am --abort"));
        }
        fs::rename(backup, repo.join(COMMITS))?;
        Ok(())
    }

    fn push(&self, repo: &Path, branch: &str) -> Result<()> {
        self.record(format!("push {} {}", branch, repo.display()));
        if self.fail_push {
            return Err(Self::failure("push"));
        }
        Ok(())
    }
}
