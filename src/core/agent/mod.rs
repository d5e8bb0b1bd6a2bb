//! Repository agent orchestrator.
//!
//! Composes the file, version-control, execution, and LLM capabilities
//! under one safety policy: write actions are short-circuited by the
//! dry-run flag, protected paths are refused by the file capability, and
//! successful writes may trigger an auto-commit whose failure never
//! unwinds the write.

use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::core::error::Result;
use crate::core::files::Files;
use crate::core::git::{CommitInfo, Git, RepoStatus};
use crate::core::llm::{GenerateOptions, LlmClient};
use crate::core::runner::{CommandResult, Runner};

/// Patterns scanned when `analyze_codebase` is called without any.
const DEFAULT_ANALYZE_PATTERNS: &[&str] = &["*.rs", "*.py", "*.js", "*.go", "*.ts"];
/// Cap on the file listing embedded in an analysis result.
const ANALYSIS_FILE_LIMIT: usize = 100;
/// Commit message used when no message is given and the diff is empty.
const FALLBACK_COMMIT_MESSAGE: &str = "Automated changes";
/// Characters trimmed off generated commit messages.
const MESSAGE_TRIM_CHARS: &[char] = &['`', '"', '\''];

/// Result of a codebase analysis. The file listing is truncated to the
/// first [`ANALYSIS_FILE_LIMIT`] entries; `total_files` counts every
/// match, including duplicates across overlapping patterns.
#[derive(Debug, Clone, Serialize)]
pub struct CodebaseAnalysis {
    pub total_files: usize,
    pub files: Vec<String>,
    pub git_status: RepoStatus,
}

/// Reduced configuration view reported by `get_status`.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub llm_provider: String,
    pub llm_model: Option<String>,
    pub auto_commit: bool,
}

/// Agent status snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct AgentStatus {
    pub repo_path: String,
    pub dry_run: bool,
    pub git_status: RepoStatus,
    pub config: ConfigSummary,
}

/// A planned (not executed) task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskPlan {
    pub task: String,
    pub plan: String,
    pub analysis: CodebaseAnalysis,
    pub status: &'static str,
}

/// Autonomous repository agent.
pub struct Agent {
    repo_path: PathBuf,
    config: Config,
    files: Files,
    git: Git,
    runner: Runner,
    llm: OnceCell<LlmClient>,
    /// When set, write actions are simulated; reads and command execution
    /// still run.
    pub dry_run: bool,
    max_iterations: u64,
}

impl Agent {
    /// Construct an agent rooted at `repo_path`.
    ///
    /// # Errors
    ///
    /// Fails when the path does not exist, is not a git repository, or
    /// the configuration cannot be loaded. The LLM client is not built
    /// here; it is constructed from the configuration on first use.
    pub fn new(repo_path: impl AsRef<Path>, config_path: Option<&Path>) -> Result<Self> {
        let repo_path = std::fs::canonicalize(repo_path.as_ref())?;
        let config = Config::load(config_path)?;

        let files = Files::new(
            repo_path.clone(),
            config.get_str_list("safety.protected_files"),
        );
        let git = Git::open(repo_path.clone())?;
        let runner = Runner::new(
            repo_path.clone(),
            Duration::from_secs(config.get_u64("tasks.timeout", 300)),
        );

        let dry_run = config.get_bool("safety.dry_run", false);
        let max_iterations = config.get_u64("tasks.max_iterations", 5);

        info!(repo = %repo_path.display(), "initialized agent");

        Ok(Self {
            repo_path,
            config,
            files,
            git,
            runner,
            llm: OnceCell::new(),
            dry_run,
            max_iterations,
        })
    }

    /// Iteration budget from `tasks.max_iterations`.
    #[must_use]
    pub fn max_iterations(&self) -> u64 {
        self.max_iterations
    }

    /// Whether writes to `path` would be refused.
    #[must_use]
    pub fn is_protected(&self, path: impl AsRef<Path>) -> bool {
        self.files.is_protected(path)
    }

    /// Analyze the codebase structure.
    ///
    /// Matches for each pattern are concatenated without cross-pattern
    /// de-duplication, so `total_files` is the sum of per-pattern counts.
    ///
    /// # Errors
    ///
    /// Propagates file-listing and git failures.
    pub fn analyze_codebase(&self, patterns: Option<&[String]>) -> Result<CodebaseAnalysis> {
        let defaults: Vec<String> = DEFAULT_ANALYZE_PATTERNS
            .iter()
            .map(|p| (*p).to_string())
            .collect();
        let patterns = patterns.unwrap_or(&defaults);

        let mut files = Vec::new();
        for pattern in patterns {
            files.extend(self.files.find(pattern)?);
        }

        let total_files = files.len();
        files.truncate(ANALYSIS_FILE_LIMIT);
        let git_status = self.git.status()?;

        info!(total_files, ?patterns, "analyzed codebase");
        Ok(CodebaseAnalysis {
            total_files,
            files,
            git_status,
        })
    }

    /// Read a file from the repository.
    ///
    /// # Errors
    ///
    /// `NotFound` when the file does not exist.
    pub fn read_file(&self, path: &str) -> Result<String> {
        info!(path, "reading file");
        self.files.read(path)
    }

    /// Write content to a file.
    ///
    /// Under dry run this is a logged no-op. Otherwise the protected
    /// gate applies, and when `commit` is set together with the
    /// `repository.auto_commit` configuration, the written file is
    /// auto-committed; auto-commit failures degrade to a warning.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` for protected targets; IO errors propagate.
    pub fn write_file(&self, path: &str, content: &str, commit: bool) -> Result<()> {
        info!(path, "writing file");

        if self.dry_run {
            info!(path, "dry run: skipping write");
            return Ok(());
        }

        self.files.write(path, content)?;

        if commit && self.config.get_bool("repository.auto_commit", true) {
            self.auto_commit(&[path.to_string()]);
        }
        Ok(())
    }

    /// Refactor a file with LLM assistance and return the cleaned output.
    ///
    /// A single surrounding markdown fence pair is stripped from the
    /// generated code. Under dry run the cleaned text is returned without
    /// writing; otherwise it is written through [`Agent::write_file`]
    /// with the same auto-commit coupling.
    ///
    /// # Errors
    ///
    /// Read, LLM, and write failures propagate.
    pub fn refactor_file(&self, path: &str, instructions: &str, commit: bool) -> Result<String> {
        info!(path, "refactoring file");

        let original = self.read_file(path)?;
        let refactored = self.llm()?.refactor_code(&original, instructions)?;
        let cleaned = strip_code_fences(&refactored);

        if self.dry_run {
            info!(path, "dry run: skipping refactor write");
            return Ok(cleaned);
        }

        self.write_file(path, &cleaned, commit)?;
        Ok(cleaned)
    }

    /// Analyze a single file against a task description. Read-only, so
    /// never gated by dry run.
    ///
    /// # Errors
    ///
    /// Read and LLM failures propagate.
    pub fn analyze_file(&self, path: &str, task: &str) -> Result<String> {
        info!(path, "analyzing file");
        let content = self.read_file(path)?;
        self.llm()?.analyze_code(&content, task)
    }

    /// Run the project's tests. Execution is allowed even under dry run.
    #[must_use]
    pub fn run_tests(&self, test_path: Option<&str>) -> CommandResult {
        info!("running tests");
        let result = self.runner.run_tests(None, test_path);
        if result.success {
            info!("tests passed");
        } else {
            warn!("tests failed");
        }
        result
    }

    /// Run a shell command in the repository.
    #[must_use]
    pub fn run_command(&self, command: &str) -> CommandResult {
        info!(command, "running command");
        self.runner.run(command, None, None)
    }

    /// Run the project's linter.
    #[must_use]
    pub fn run_lint(&self) -> CommandResult {
        info!("running linter");
        self.runner.run_lint(None)
    }

    /// Run the project's formatter.
    #[must_use]
    pub fn run_format(&self, check_only: bool) -> CommandResult {
        info!(check_only, "running formatter");
        self.runner.run_format(None, check_only)
    }

    /// Commit changes, generating a message from the diff when none is
    /// given. Returns `None` under dry run.
    ///
    /// # Errors
    ///
    /// `NothingToCommit` when the tree is clean; LLM failures propagate
    /// when a message has to be generated.
    pub fn commit_changes(
        &self,
        message: Option<&str>,
        files: Option<&[String]>,
    ) -> Result<Option<String>> {
        if self.dry_run {
            info!("dry run: skipping commit");
            return Ok(None);
        }

        let message = match message {
            Some(message) => message.to_string(),
            None => {
                let diff = self.git.diff(false)?;
                if diff.is_empty() {
                    FALLBACK_COMMIT_MESSAGE.to_string()
                } else {
                    let generated = self.llm()?.commit_message(&diff)?;
                    generated.trim().trim_matches(MESSAGE_TRIM_CHARS).to_string()
                }
            }
        };

        let prefix = self.config.get_str("repository.commit_message_prefix", "[reva]");
        let message = apply_prefix(&message, &prefix);

        info!(%message, "committing");
        let sha = self.git.commit(&message, files)?;
        info!(sha = short_sha(&sha), "created commit");
        Ok(Some(sha))
    }

    /// Create a branch, qualifying the name with the configured prefix
    /// unless it already carries it. Returns the qualified name. A no-op
    /// under dry run.
    ///
    /// # Errors
    ///
    /// Git failures propagate.
    pub fn create_branch(&self, name: &str, checkout: bool) -> Result<String> {
        let prefix = self.config.get_str("repository.branch_prefix", "reva/");
        let name = if name.starts_with(&prefix) {
            name.to_string()
        } else {
            format!("{prefix}{name}")
        };

        info!(branch = %name, "creating branch");
        if self.dry_run {
            info!("dry run: skipping branch creation");
            return Ok(name);
        }

        self.git.create_branch(&name, checkout)?;
        Ok(name)
    }

    /// Push commits to a remote. A no-op under dry run.
    ///
    /// # Errors
    ///
    /// Git failures propagate.
    pub fn push(&self, remote: &str, branch: Option<&str>) -> Result<()> {
        info!(remote, "pushing");
        if self.dry_run {
            info!("dry run: skipping push");
            return Ok(());
        }
        self.git.push(remote, branch)
    }

    /// Recent commit history, newest first.
    ///
    /// # Errors
    ///
    /// Git failures propagate.
    pub fn recent_commits(&self, count: usize) -> Result<Vec<CommitInfo>> {
        self.git.recent_commits(count)
    }

    /// Plan a high-level task. This is a single planning call: the plan
    /// is returned as text and never executed.
    ///
    /// # Errors
    ///
    /// Analysis and LLM failures propagate.
    pub fn execute_task(&self, description: &str) -> Result<TaskPlan> {
        info!(task = description, "planning task");

        let analysis = self.analyze_codebase(None)?;
        let recent: Vec<&str> = analysis.files.iter().take(10).map(String::as_str).collect();
        let status_json = serde_json::to_string(&analysis.git_status)?;

        let prompt = format!(
            "Given this repository structure and task, create a step-by-step plan:\n\n\
             Repository info:\n\
             - Total files: {}\n\
             - Recent files: {}\n\
             - Git status: {}\n\n\
             Task: {}\n\n\
             Provide a numbered list of specific steps to accomplish this task.",
            analysis.total_files,
            recent.join(", "),
            status_json,
            description,
        );

        let plan = self.llm()?.generate(&prompt, GenerateOptions::default())?;

        Ok(TaskPlan {
            task: description.to_string(),
            plan,
            analysis,
            status: "planned",
        })
    }

    /// Current agent status: repository, dry-run flag, git state, and a
    /// reduced view of the configuration.
    ///
    /// # Errors
    ///
    /// Git failures propagate.
    pub fn get_status(&self) -> Result<AgentStatus> {
        Ok(AgentStatus {
            repo_path: self.repo_path.display().to_string(),
            dry_run: self.dry_run,
            git_status: self.git.status()?,
            config: ConfigSummary {
                llm_provider: self.config.get_str("llm.provider", "openai"),
                llm_model: self.config.get_str_opt("llm.model"),
                auto_commit: self.config.get_bool("repository.auto_commit", true),
            },
        })
    }

    /// The LLM client, constructed from the configuration on first
    /// access and cached for the agent's lifetime.
    fn llm(&self) -> Result<&LlmClient> {
        self.llm.get_or_try_init(|| {
            LlmClient::new(
                &self.config.get_str("llm.provider", "openai"),
                self.config.get_str_opt("llm.model"),
                self.config.get_f64("llm.temperature", 0.7) as f32,
                u32::try_from(self.config.get_u64("llm.max_tokens", 2000)).unwrap_or(u32::MAX),
                None,
            )
        })
    }

    /// Post-write hook: commit the written files when there is a diff.
    /// Errors are reported as a warning and suppressed so the write's
    /// success stands.
    fn auto_commit(&self, files: &[String]) {
        let outcome = (|| -> Result<()> {
            let diff = self.git.diff(false)?;
            if diff.is_empty() {
                return Ok(());
            }
            self.git.add(Some(files))?;
            self.commit_changes(None, Some(files))?;
            Ok(())
        })();

        if let Err(err) = outcome {
            warn!(%err, "auto-commit failed");
        }
    }
}

/// Strip a single surrounding markdown code fence pair from generated
/// text: the first line is dropped when it starts with the fence marker,
/// the last line likewise. Inner lines pass through verbatim.
#[must_use]
pub fn strip_code_fences(text: &str) -> String {
    let mut lines: Vec<&str> = text.trim().lines().collect();
    if lines.first().is_some_and(|line| line.starts_with("```")) {
        lines.remove(0);
    }
    if lines.last().is_some_and(|line| line.starts_with("```")) {
        lines.pop();
    }
    lines.join("\n")
}

/// Prepend `prefix` to `message` unless it is already there. Applying
/// this twice is the same as applying it once.
fn apply_prefix(message: &str, prefix: &str) -> String {
    if prefix.is_empty() || message.starts_with(prefix) {
        message.to_string()
    } else {
        format!("{prefix} {message}")
    }
}

fn short_sha(sha: &str) -> &str {
    &sha[..sha.len().min(8)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fences_are_stripped_once() {
        let input = "```rust\nfn main() {}\n```";
        assert_eq!(strip_code_fences(input), "fn main() {}");
    }

    #[test]
    fn inner_fences_survive() {
        let input = "```\nouter\n```inner\nstill inner\n```";
        assert_eq!(strip_code_fences(input), "outer\n```inner\nstill inner");
    }

    #[test]
    fn unfenced_text_is_only_trimmed() {
        assert_eq!(strip_code_fences("  plain text\n"), "plain text");
    }

    #[test]
    fn fenceless_multiline_is_untouched() {
        let input = "line one\nline two";
        assert_eq!(strip_code_fences(input), input);
    }

    #[test]
    fn leading_fence_without_trailing_is_handled() {
        assert_eq!(strip_code_fences("```python\ncode"), "code");
    }

    #[test]
    fn prefix_application_is_idempotent() {
        let once = apply_prefix("fix parser", "[reva]");
        assert_eq!(once, "[reva] fix parser");
        assert_eq!(apply_prefix(&once, "[reva]"), once);
    }

    #[test]
    fn empty_prefix_leaves_message_alone() {
        assert_eq!(apply_prefix("message", ""), "message");
    }

    #[test]
    fn short_sha_handles_tiny_input() {
        assert_eq!(short_sha("abc"), "abc");
        assert_eq!(short_sha("0123456789abcdef"), "01234567");
    }
}
