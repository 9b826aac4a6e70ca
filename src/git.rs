//! Thin wrappers around the system `git` command.
//!
//! Every invocation goes through [`run_git`], which enforces a timeout,
//! captures output, and turns a non-zero exit status into
//! [`Error::GitCommand`]. Using the system binary means credential helpers,
//! SSH keys and `~/.gitconfig` all behave as they do for a human operator.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error};

use crate::config::redact_url;
use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Captured output of a successful git command.
#[derive(Debug, Clone, Default)]
pub struct GitOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs `git <args>` in `dir`, killing it once `timeout` expires.
pub fn run_git(dir: Option<&Path>, args: &[&str], timeout: Duration) -> Result<GitOutput> {
    let display = display_args(args);
    debug!("Run: git {}", display);

    let mut command = Command::new("git");
    command
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = dir {
        command.current_dir(dir);
    }

    let mut child = command.spawn().map_err(|e| Error::GitCommand {
        command: display.clone(),
        status: "not started".to_string(),
        stderr: e.to_string(),
    })?;

    // Drain both pipes so a chatty command cannot block on a full buffer.
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    // On timeout the drain threads are left behind: helpers spawned by git
    // (e.g. git-remote-https) can keep the pipes open after git is killed.
    let status = wait_with_timeout(&mut child, &display, timeout)?;
    let stdout = stdout.join().unwrap_or_default();
    let stderr = stderr.join().unwrap_or_default();

    if !status.success() {
        let code = status
            .code()
            .map_or_else(|| "killed by signal".to_string(), |c| c.to_string());
        error!(
            "Command failed (exit status {}): git {}\n{}{}",
            code, display, stdout, stderr
        );
        return Err(Error::GitCommand {
            command: display,
            status: code,
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(GitOutput { stdout, stderr })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn wait_with_timeout(
    child: &mut Child,
    display: &str,
    timeout: Duration,
) -> Result<std::process::ExitStatus> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if start.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            error!("Command timed out after {}s: git {}", timeout.as_secs(), display);
            return Err(Error::Timeout {
                command: display.to_string(),
                timeout,
            });
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Joins arguments for logging, stripping credentials from any URL.
pub fn display_args(args: &[&str]) -> String {
    args.iter()
        .map(|arg| {
            if arg.contains("://") {
                redact_url(arg)
            } else {
                (*arg).to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Clones `branch` of `url` into `target_dir`.
pub fn clone_branch(url: &str, branch: &str, target_dir: &Path, timeout: Duration) -> Result<()> {
    if let Some(parent) = target_dir.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let target = target_dir.to_string_lossy();
    run_git(
        None,
        &["clone", "--branch", branch, url, target.as_ref()],
        timeout,
    )
    .map_err(|e| Error::Clone {
        url: redact_url(url),
        branch: branch.to_string(),
        message: e.to_string(),
    })?;
    Ok(())
}

/// Returns the commit at the head of `branch` on the remote, if it exists.
pub fn list_branch_head(url: &str, branch: &str, timeout: Duration) -> Result<Option<String>> {
    let output = run_git(None, &["ls-remote", "--heads", url, branch], timeout)?;
    let wanted = format!("refs/heads/{}", branch);
    Ok(output.stdout.lines().find_map(|line| {
        // ls-remote output format: <hash>\t<ref>
        let (hash, name) = line.split_once('\t')?;
        (name == wanted).then(|| hash.to_string())
    }))
}

/// Reads the recorded URL of the `origin` remote.
pub fn origin_url(repo: &Path, timeout: Duration) -> Result<String> {
    let output = run_git(Some(repo), &["remote", "get-url", "origin"], timeout)?;
    Ok(output.stdout.trim().to_string())
}

/// Returns the checked-out branch; empty on a detached HEAD.
pub fn current_branch(repo: &Path, timeout: Duration) -> Result<String> {
    let output = run_git(Some(repo), &["branch", "--show-current"], timeout)?;
    Ok(output.stdout.trim().to_string())
}

pub fn checkout(repo: &Path, branch: &str, timeout: Duration) -> Result<()> {
    run_git(Some(repo), &["checkout", branch], timeout).map(|_| ())
}

/// Fast-forwards the current branch from its upstream.
pub fn pull(repo: &Path, timeout: Duration) -> Result<()> {
    run_git(Some(repo), &["pull", "--ff-only"], timeout).map(|_| ())
}

/// Writes one patch file per commit in `range` into `out_dir`.
pub fn format_patch(repo: &Path, range: &str, out_dir: &Path, timeout: Duration) -> Result<()> {
    let out = out_dir.to_string_lossy();
    run_git(
        Some(repo),
        &["format-patch", range, "-o", out.as_ref()],
        timeout,
    )
    .map(|_| ())
}

/// Applies mailbox patches in the given order as one `git am` session.
pub fn am(repo: &Path, patches: &[PathBuf], timeout: Duration) -> Result<()> {
    let paths: Vec<String> = patches
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    let mut args = vec!["am"];
    args.extend(paths.iter().map(String::as_str));
    run_git(Some(repo), &args, timeout).map(|_| ())
}

/// Abandons an in-progress `git am`, restoring the original branch.
pub fn am_abort(repo: &Path, timeout: Duration) -> Result<()> {
    run_git(Some(repo), &["am", "--abort"], timeout).map(|_| ())
}

pub fn push(repo: &Path, branch: &str, timeout: Duration) -> Result<()> {
    run_git(Some(repo), &["push", "origin", branch], timeout).map(|_| ())
}

/// Resolves a revision to a commit id.
pub fn rev_parse(repo: &Path, rev: &str, timeout: Duration) -> Result<String> {
    let output = run_git(Some(repo), &["rev-parse", rev], timeout)?;
    Ok(output.stdout.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_display_args_redacts_urls() {
        let display = display_args(&["clone", "--branch", "main", "https://me:tok@h/r.git", "dst"]);
        assert_eq!(display, "clone --branch main https://h/r.git dst");
    }

    #[test]
    fn test_run_git_reports_exit_status() {
        let temp = TempDir::new().unwrap();
        // Not a repository, so rev-parse fails.
        let err = run_git(
            Some(temp.path()),
            &["rev-parse", "HEAD"],
            Duration::from_secs(10),
        )
        .unwrap_err();
        match err {
            Error::GitCommand { command, status, .. } => {
                assert_eq!(command, "rev-parse HEAD");
                assert_ne!(status, "0");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_not_held_up_by_helper_processes() {
        let start = Instant::now();
        let err = run_git(
            None,
            &["-c", "alias.hang=!sleep 6; :", "hang"],
            Duration::from_secs(1),
        )
        .unwrap_err();

        assert!(matches!(err, Error::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_run_git_success_captures_stdout() {
        let output = run_git(None, &["--version"], Duration::from_secs(10)).unwrap();
        assert!(output.stdout.starts_with("git version"));
    }
}
