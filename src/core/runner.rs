//! Execution capability: shell commands with timeouts and tool detection.
//!
//! Commands run through the platform shell with stdout/stderr drained on
//! reader threads while the child is waited on with a deadline, so a
//! chatty process can neither deadlock the pipes nor hang the agent.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// Marker files probed, in order, to pick a test command.
const TEST_MARKERS: &[(&str, &str)] = &[
    ("Cargo.toml", "cargo test"),
    ("package.json", "npm test"),
    ("pytest.ini", "pytest"),
    ("pyproject.toml", "pytest"),
    ("Makefile", "make test"),
    ("tox.ini", "tox"),
];
const FALLBACK_TEST_COMMAND: &str = "cargo test";

/// Marker files probed, in order, to pick a lint command.
const LINT_MARKERS: &[(&str, &str)] = &[
    ("Cargo.toml", "cargo clippy"),
    (".eslintrc.json", "eslint ."),
    (".eslintrc.js", "eslint ."),
    (".flake8", "flake8"),
];
const FALLBACK_LINT_COMMAND: &str = "cargo clippy";

/// Outcome of one command invocation. `success` is exactly
/// `return_code == 0`; timeouts and spawn failures are folded into the
/// same shape with a `-1` return code and a diagnostic in `stderr`.
#[derive(Debug, Clone, Serialize)]
pub struct CommandResult {
    pub success: bool,
    pub return_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// The command that was chosen by auto-detection, when one was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl CommandResult {
    fn failure(stderr: String) -> Self {
        Self {
            success: false,
            return_code: -1,
            stdout: String::new(),
            stderr,
            command: None,
        }
    }
}

/// Runs shell commands inside the repository.
#[derive(Debug, Clone)]
pub struct Runner {
    root: PathBuf,
    timeout: Duration,
}

impl Runner {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            root: root.into(),
            timeout,
        }
    }

    /// Run a shell command, capturing output. Never returns an error:
    /// timeouts and spawn failures are reported through the result.
    #[must_use]
    pub fn run(&self, command: &str, cwd: Option<&Path>, timeout: Option<Duration>) -> CommandResult {
        let cwd = cwd.unwrap_or(&self.root);
        let timeout = timeout.unwrap_or(self.timeout);

        let mut cmd = shell_command(command);
        cmd.current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(command, cwd = %cwd.display(), "spawning command");
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => return CommandResult::failure(err.to_string()),
        };

        let stdout_handle = drain(child.stdout.take());
        let stderr_handle = drain(child.stderr.take());

        let status = match child.wait_timeout(timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                warn!(command, timeout_secs = timeout.as_secs(), "command timed out, killing");
                let _ = child.kill();
                let _ = child.wait();
                let _ = stdout_handle.join();
                let _ = stderr_handle.join();
                return CommandResult::failure(format!(
                    "command timed out after {} seconds",
                    timeout.as_secs()
                ));
            }
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                return CommandResult::failure(err.to_string());
            }
        };

        let stdout = stdout_handle.join().unwrap_or_default();
        let stderr = stderr_handle.join().unwrap_or_default();
        let return_code = status.code().unwrap_or(-1);

        debug!(command, return_code, "command finished");
        CommandResult {
            success: status.success(),
            return_code,
            stdout,
            stderr,
            command: None,
        }
    }

    /// Run the project's tests, auto-detecting the command unless one is
    /// supplied. The chosen command is echoed back in the result.
    #[must_use]
    pub fn run_tests(&self, test_command: Option<&str>, test_path: Option<&str>) -> CommandResult {
        let mut command = test_command.map_or_else(|| self.detect_test_command(), str::to_string);
        if let Some(path) = test_path {
            command = format!("{command} {path}");
        }
        let mut result = self.run(&command, None, None);
        result.command = Some(command);
        result
    }

    /// Run the project's linter.
    #[must_use]
    pub fn run_lint(&self, lint_command: Option<&str>) -> CommandResult {
        let command = lint_command.map_or_else(|| self.detect_lint_command(), str::to_string);
        let mut result = self.run(&command, None, None);
        result.command = Some(command);
        result
    }

    /// Run the project's formatter, in check-only mode when requested.
    #[must_use]
    pub fn run_format(&self, format_command: Option<&str>, check_only: bool) -> CommandResult {
        let command =
            format_command.map_or_else(|| self.detect_format_command(check_only), str::to_string);
        let mut result = self.run(&command, None, None);
        result.command = Some(command);
        result
    }

    /// Run a script file, dispatching the interpreter by extension. A
    /// missing script is a failed result, not an error.
    #[must_use]
    pub fn run_script(&self, script_path: &str, args: &[String]) -> CommandResult {
        let script = if Path::new(script_path).is_absolute() {
            PathBuf::from(script_path)
        } else {
            self.root.join(script_path)
        };
        if !script.exists() {
            return CommandResult::failure(format!("script not found: {script_path}"));
        }

        let mut command = match script.extension().and_then(|ext| ext.to_str()) {
            Some("py") => format!("python3 {}", script.display()),
            Some("sh") => format!("bash {}", script.display()),
            Some("js") => format!("node {}", script.display()),
            _ => script.display().to_string(),
        };
        if !args.is_empty() {
            command = format!("{command} {}", args.join(" "));
        }

        self.run(&command, None, None)
    }

    fn detect_test_command(&self) -> String {
        self.detect(TEST_MARKERS, FALLBACK_TEST_COMMAND)
    }

    fn detect_lint_command(&self) -> String {
        self.detect(LINT_MARKERS, FALLBACK_LINT_COMMAND)
    }

    fn detect_format_command(&self, check_only: bool) -> String {
        if self.root.join("rustfmt.toml").exists() || self.root.join("Cargo.toml").exists() {
            return if check_only { "cargo fmt --check" } else { "cargo fmt" }.to_string();
        }
        if self.root.join(".prettierrc").exists() {
            return if check_only {
                "prettier --check ."
            } else {
                "prettier --write ."
            }
            .to_string();
        }
        if self.root.join("pyproject.toml").exists() {
            return if check_only { "black --check ." } else { "black ." }.to_string();
        }
        if check_only { "cargo fmt --check" } else { "cargo fmt" }.to_string()
    }

    fn detect(&self, markers: &[(&str, &str)], fallback: &str) -> String {
        for (marker, command) in markers {
            if self.root.join(marker).exists() {
                return (*command).to_string();
            }
        }
        fallback.to_string()
    }
}

#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.args(["/C", command]);
    cmd
}

fn drain<R: Read + Send + 'static>(stream: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut bytes = Vec::new();
        if let Some(mut stream) = stream {
            let _ = stream.read_to_end(&mut bytes);
        }
        String::from_utf8_lossy(&bytes).into_owned()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner() -> (tempfile::TempDir, Runner) {
        let dir = tempfile::tempdir().unwrap();
        let runner = Runner::new(dir.path(), Duration::from_secs(30));
        (dir, runner)
    }

    #[test]
    fn successful_command_captures_stdout() {
        let (_dir, runner) = runner();
        let result = runner.run("printf hello", None, None);
        assert!(result.success);
        assert_eq!(result.return_code, 0);
        assert_eq!(result.stdout, "hello");
    }

    #[test]
    fn failing_command_reports_exit_code() {
        let (_dir, runner) = runner();
        let result = runner.run("exit 1", None, None);
        assert!(!result.success);
        assert_eq!(result.return_code, 1);
    }

    #[test]
    fn timeout_kills_the_child() {
        let (_dir, runner) = runner();
        let result = runner.run("sleep 5", None, Some(Duration::from_millis(200)));
        assert!(!result.success);
        assert_eq!(result.return_code, -1);
        assert!(result.stderr.contains("timed out"));
    }

    #[test]
    fn stderr_is_captured_separately() {
        let (_dir, runner) = runner();
        let result = runner.run("printf oops >&2", None, None);
        assert!(result.success);
        assert!(result.stdout.is_empty());
        assert_eq!(result.stderr, "oops");
    }

    #[test]
    fn test_detection_prefers_cargo() {
        let (dir, runner) = runner();
        std::fs::write(dir.path().join("Cargo.toml"), "").unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();

        let result = runner.run_tests(None, None);
        assert_eq!(result.command.as_deref(), Some("cargo test"));
    }

    #[test]
    fn test_detection_falls_through_markers() {
        let (dir, runner) = runner();
        std::fs::write(dir.path().join("tox.ini"), "").unwrap();

        let result = runner.run_tests(None, None);
        assert_eq!(result.command.as_deref(), Some("tox"));
    }

    #[test]
    fn test_path_is_appended_to_the_command() {
        let (_dir, runner) = runner();
        let result = runner.run_tests(Some("true"), Some("tests/unit"));
        assert!(result.success);
        assert_eq!(result.command.as_deref(), Some("true tests/unit"));
    }

    #[test]
    fn format_detection_has_check_variant() {
        let (dir, runner) = runner();
        std::fs::write(dir.path().join("Cargo.toml"), "").unwrap();

        let checked = runner.run_format(Some("true"), true);
        assert_eq!(checked.command.as_deref(), Some("true"));

        assert_eq!(runner.detect_format_command(true), "cargo fmt --check");
        assert_eq!(runner.detect_format_command(false), "cargo fmt");
    }

    #[test]
    fn lint_detection_uses_eslint_marker() {
        let (dir, runner) = runner();
        std::fs::write(dir.path().join(".eslintrc.json"), "{}").unwrap();
        assert_eq!(runner.detect_lint_command(), "eslint .");
    }

    #[test]
    fn missing_script_fails_without_running() {
        let (_dir, runner) = runner();
        let result = runner.run_script("nope.sh", &[]);
        assert!(!result.success);
        assert_eq!(result.return_code, -1);
        assert!(result.stderr.contains("script not found"));
    }

    #[test]
    fn script_dispatches_by_extension() {
        let (dir, runner) = runner();
        std::fs::write(dir.path().join("hello.sh"), "echo from-script $1\n").unwrap();

        let result = runner.run_script("hello.sh", &["arg".to_string()]);
        assert!(result.success);
        assert!(result.stdout.contains("from-script arg"));
    }
}
