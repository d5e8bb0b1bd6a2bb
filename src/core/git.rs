//! Version-control capability: git plumbing over a single working tree.
//!
//! Everything shells out to the `git` binary bound to the repository root,
//! the same way the workspace metadata collectors do. A non-zero exit maps
//! to [`Error::CommandFailed`] with the command line and stderr attached.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use serde::Serialize;

use crate::core::error::{Error, Result};

/// Record separator for `git log` parsing.
const LOG_RECORD_SEP: char = '\u{1e}';
/// Field separator for `git log` parsing.
const LOG_FIELD_SEP: char = '\u{1f}';

/// Snapshot of the working tree state.
#[derive(Debug, Clone, Serialize)]
pub struct RepoStatus {
    pub branch: String,
    pub is_dirty: bool,
    pub untracked: Vec<String>,
    pub modified: Vec<String>,
    pub staged: Vec<String>,
}

/// A single commit from the history, newest-first ordering.
#[derive(Debug, Clone, Serialize)]
pub struct CommitInfo {
    pub sha: String,
    pub message: String,
    pub author: String,
    pub timestamp: String,
}

/// Git operations bound to one repository.
#[derive(Debug, Clone)]
pub struct Git {
    root: PathBuf,
}

impl Git {
    /// Bind to the repository at `root`, probing it up front.
    ///
    /// # Errors
    ///
    /// `InvalidRepository` when `root` is not inside a git repository.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let probe = Command::new("git")
            .args(["rev-parse", "--git-dir"])
            .current_dir(&root)
            .output();
        match probe {
            Ok(output) if output.status.success() => Ok(Self { root }),
            _ => Err(Error::InvalidRepository(root)),
        }
    }

    /// Current branch name, or `HEAD` when detached.
    ///
    /// # Errors
    ///
    /// Propagates git invocation failures.
    pub fn current_branch(&self) -> Result<String> {
        match self.run(&["symbolic-ref", "--short", "-q", "HEAD"]) {
            Ok(name) => Ok(name.trim().to_string()),
            Err(_) => Ok("HEAD".to_string()),
        }
    }

    /// Synthesize the repository status from porcelain output.
    ///
    /// `is_dirty` means modified or staged changes; untracked files do not
    /// count.
    ///
    /// # Errors
    ///
    /// Propagates git invocation failures.
    pub fn status(&self) -> Result<RepoStatus> {
        let branch = self.current_branch()?;
        let porcelain = self.run(&["status", "--porcelain"])?;

        let mut untracked = Vec::new();
        let mut modified = Vec::new();
        let mut staged = Vec::new();

        for line in porcelain.lines() {
            if line.len() < 3 {
                continue;
            }
            let (code, rest) = line.split_at(2);
            let mut chars = code.chars();
            let index_state = chars.next().unwrap_or(' ');
            let tree_state = chars.next().unwrap_or(' ');

            let path = rest.trim();
            // renames are reported as "old -> new"; the new path is the one
            // that exists in the working tree
            let path = path
                .split_once(" -> ")
                .map_or(path, |(_, new)| new)
                .trim_matches('"')
                .to_string();

            if index_state == '?' || tree_state == '?' {
                untracked.push(path);
                continue;
            }
            if tree_state != ' ' {
                modified.push(path.clone());
            }
            if index_state != ' ' {
                staged.push(path);
            }
        }

        let is_dirty = !modified.is_empty() || !staged.is_empty();

        Ok(RepoStatus {
            branch,
            is_dirty,
            untracked,
            modified,
            staged,
        })
    }

    /// Diff of the working tree, or of the index when `staged` is set.
    ///
    /// # Errors
    ///
    /// Propagates git invocation failures.
    pub fn diff(&self, staged: bool) -> Result<String> {
        if staged {
            self.run(&["diff", "--cached"])
        } else {
            self.run(&["diff"])
        }
    }

    /// Stage the given files, or everything when `files` is absent or
    /// empty.
    ///
    /// # Errors
    ///
    /// Propagates git invocation failures.
    pub fn add(&self, files: Option<&[String]>) -> Result<()> {
        match files {
            Some(files) if !files.is_empty() => {
                let mut args = vec!["add", "--"];
                args.extend(files.iter().map(String::as_str));
                self.run(&args)?;
            }
            _ => {
                self.run(&["add", "-A"])?;
            }
        }
        Ok(())
    }

    /// Whether the index differs from HEAD.
    ///
    /// # Errors
    ///
    /// Propagates git invocation failures.
    pub fn has_staged(&self) -> Result<bool> {
        let output = Command::new("git")
            .args(["diff", "--cached", "--quiet"])
            .current_dir(&self.root)
            .output()?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(Error::CommandFailed {
                command: "git diff --cached --quiet".to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }

    /// Commit staged changes, staging `files` first when given and
    /// everything when nothing is staged and no subset was named.
    ///
    /// # Errors
    ///
    /// `NothingToCommit` when the tree is clean and nothing is untracked.
    pub fn commit(&self, message: &str, files: Option<&[String]>) -> Result<String> {
        if let Some(files) = files {
            self.add(Some(files))?;
        }

        let status = self.status()?;
        if !status.is_dirty && status.untracked.is_empty() {
            return Err(Error::NothingToCommit);
        }

        if files.is_none() && status.staged.is_empty() {
            self.add(None)?;
        }

        self.run(&["commit", "-m", message])?;
        let sha = self.run(&["rev-parse", "HEAD"])?;
        Ok(sha.trim().to_string())
    }

    /// Create a branch, optionally checking it out.
    ///
    /// # Errors
    ///
    /// Propagates git invocation failures.
    pub fn create_branch(&self, name: &str, checkout: bool) -> Result<()> {
        self.run(&["branch", name])?;
        if checkout {
            self.run(&["checkout", name])?;
        }
        Ok(())
    }

    /// Check out a branch, creating it first when `create` is set.
    ///
    /// # Errors
    ///
    /// `NotFound` when the branch does not exist and `create` is unset.
    pub fn checkout(&self, name: &str, create: bool) -> Result<()> {
        let exists = self.branch_exists(name)?;
        if !exists {
            if create {
                return self.create_branch(name, true);
            }
            return Err(Error::NotFound(format!("branch: {name}")));
        }
        self.run(&["checkout", name])?;
        Ok(())
    }

    /// Push a branch (current branch when omitted) to `remote`.
    ///
    /// # Errors
    ///
    /// Propagates git invocation failures.
    pub fn push(&self, remote: &str, branch: Option<&str>) -> Result<()> {
        let branch = match branch {
            Some(branch) => branch.to_string(),
            None => self.current_branch()?,
        };
        self.run(&["push", remote, &branch])?;
        Ok(())
    }

    /// The most recent commits, newest first.
    ///
    /// # Errors
    ///
    /// Propagates git invocation failures.
    pub fn recent_commits(&self, count: usize) -> Result<Vec<CommitInfo>> {
        let limit = count.to_string();
        let format = format!("--pretty=format:%H{LOG_FIELD_SEP}%an <%ae>{LOG_FIELD_SEP}%aI{LOG_FIELD_SEP}%B{LOG_RECORD_SEP}");
        let raw = self.run(&["log", "-n", &limit, &format])?;
        Ok(parse_log(&raw))
    }

    /// Commit history touching a single file, newest first, with short
    /// shas.
    ///
    /// # Errors
    ///
    /// Propagates git invocation failures.
    pub fn file_history(&self, path: &str, count: usize) -> Result<Vec<CommitInfo>> {
        let limit = count.to_string();
        let format = format!("--pretty=format:%h{LOG_FIELD_SEP}%an <%ae>{LOG_FIELD_SEP}%aI{LOG_FIELD_SEP}%B{LOG_RECORD_SEP}");
        let raw = self.run(&["log", "-n", &limit, &format, "--", path])?;
        Ok(parse_log(&raw))
    }

    /// Apply a unified diff to the working tree with three-way merge
    /// semantics.
    ///
    /// # Errors
    ///
    /// `DiffApplyFailed` when the patch is malformed or conflicts.
    pub fn apply_diff(&self, diff: &str) -> Result<()> {
        self.run_with_input(&["apply", "--3way"], diff)
            .map_err(|err| match err {
                Error::CommandFailed { stderr, .. } => Error::DiffApplyFailed(stderr),
                other => other,
            })?;
        Ok(())
    }

    /// Reset the index, or the index and working tree when `hard` is set.
    ///
    /// # Errors
    ///
    /// Propagates git invocation failures.
    pub fn reset(&self, hard: bool) -> Result<()> {
        if hard {
            self.run(&["reset", "--hard"])?;
        } else {
            self.run(&["reset"])?;
        }
        Ok(())
    }

    fn branch_exists(&self, name: &str) -> Result<bool> {
        let reference = format!("refs/heads/{name}");
        let output = Command::new("git")
            .args(["show-ref", "--verify", "--quiet", &reference])
            .current_dir(&self.root)
            .output()?;
        Ok(output.status.success())
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()?;
        if !output.status.success() {
            return Err(Error::CommandFailed {
                command: format!("git {}", args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_with_input(&self, args: &[&str], input: &str) -> Result<String> {
        let mut child = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.as_bytes())?;
        }
        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(Error::CommandFailed {
                command: format!("git {}", args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

fn parse_log(raw: &str) -> Vec<CommitInfo> {
    raw.split(LOG_RECORD_SEP)
        .filter_map(|record| {
            if record.trim().is_empty() {
                return None;
            }
            let mut fields = record.splitn(4, LOG_FIELD_SEP);
            let sha = fields.next()?.trim().to_string();
            let author = fields.next()?.to_string();
            let timestamp = fields.next()?.to_string();
            let message = fields.next()?.trim().to_string();
            Some(CommitInfo {
                sha,
                message,
                author,
                timestamp,
            })
        })
        .collect()
}
