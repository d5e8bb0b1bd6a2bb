//! CLI command parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// reva - autonomous repository agent.
#[derive(Parser)]
#[command(name = "reva")]
#[command(about = "Autonomous repository agent")]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the repository (default: current directory).
    #[arg(long, default_value = ".", global = true)]
    pub repo: PathBuf,

    /// Path to the configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Simulate write actions without touching the repository.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Increase logging verbosity.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show agent status.
    Status,

    /// Analyze the codebase structure.
    Analyze {
        /// File patterns to analyze (e.g. "*.rs" "*.py").
        #[arg(long, num_args = 1..)]
        patterns: Option<Vec<String>>,
    },

    /// Read a file.
    Read {
        /// File path.
        file: String,
    },

    /// Write content to a file.
    Write {
        /// File path.
        file: String,
        /// Content to write.
        content: String,
        /// Skip the auto-commit.
        #[arg(long)]
        no_commit: bool,
    },

    /// Refactor a file with LLM assistance.
    Refactor {
        /// File path.
        file: String,
        /// Refactoring instructions.
        instructions: String,
        /// Skip the auto-commit.
        #[arg(long)]
        no_commit: bool,
    },

    /// Analyze a specific file.
    AnalyzeFile {
        /// File path.
        file: String,
        /// Analysis task.
        task: String,
    },

    /// Run tests.
    Test {
        /// Specific test file or directory.
        #[arg(long)]
        path: Option<String>,
    },

    /// Run a shell command.
    Run {
        /// Command to execute.
        command: String,
    },

    /// Run the project linter.
    Lint,

    /// Run the project formatter.
    Fmt {
        /// Check formatting without modifying files.
        #[arg(long)]
        check: bool,
    },

    /// Commit changes.
    Commit {
        /// Commit message (generated from the diff when omitted).
        #[arg(short, long)]
        message: Option<String>,
        /// Specific files to commit.
        #[arg(long, num_args = 1..)]
        files: Option<Vec<String>>,
    },

    /// Create a branch.
    Branch {
        /// Branch name (the configured prefix is added when missing).
        name: String,
        /// Don't check out the new branch.
        #[arg(long)]
        no_checkout: bool,
    },

    /// Push commits to a remote.
    Push {
        /// Remote name.
        #[arg(long, default_value = "origin")]
        remote: String,
        /// Branch to push (current branch when omitted).
        #[arg(long)]
        branch: Option<String>,
    },

    /// Show recent commits.
    Log {
        /// Number of commits to show.
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,
    },

    /// Plan a high-level task.
    Task {
        /// Task description.
        description: String,
    },

    /// Write a default configuration file.
    Init {
        /// Output path.
        #[arg(long, default_value = "config/reva.yaml")]
        output: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_debug_assert() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_parses_status() {
        let cli = Cli::parse_from(["reva", "status"]);
        assert!(matches!(cli.command, Commands::Status));
        assert!(!cli.dry_run);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from(["reva", "--repo", "/tmp/x", "--dry-run", "-vv", "status"]);
        assert_eq!(cli.repo, PathBuf::from("/tmp/x"));
        assert!(cli.dry_run);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn cli_global_flags_work_after_subcommand() {
        let cli = Cli::parse_from(["reva", "status", "--dry-run"]);
        assert!(cli.dry_run);
    }

    #[test]
    fn cli_parses_analyze_patterns() {
        let cli = Cli::parse_from(["reva", "analyze", "--patterns", "*.py", "*.yaml"]);
        match cli.command {
            Commands::Analyze { patterns } => {
                assert_eq!(patterns, Some(vec!["*.py".to_string(), "*.yaml".to_string()]));
            }
            _ => panic!("expected Analyze command"),
        }
    }

    #[test]
    fn cli_parses_write_with_no_commit() {
        let cli = Cli::parse_from(["reva", "write", "a.rs", "content", "--no-commit"]);
        match cli.command {
            Commands::Write {
                file,
                content,
                no_commit,
            } => {
                assert_eq!(file, "a.rs");
                assert_eq!(content, "content");
                assert!(no_commit);
            }
            _ => panic!("expected Write command"),
        }
    }

    #[test]
    fn cli_parses_refactor() {
        let cli = Cli::parse_from(["reva", "refactor", "a.rs", "extract a helper"]);
        match cli.command {
            Commands::Refactor {
                file,
                instructions,
                no_commit,
            } => {
                assert_eq!(file, "a.rs");
                assert_eq!(instructions, "extract a helper");
                assert!(!no_commit);
            }
            _ => panic!("expected Refactor command"),
        }
    }

    #[test]
    fn cli_parses_analyze_file() {
        let cli = Cli::parse_from(["reva", "analyze-file", "a.rs", "find bugs"]);
        match cli.command {
            Commands::AnalyzeFile { file, task } => {
                assert_eq!(file, "a.rs");
                assert_eq!(task, "find bugs");
            }
            _ => panic!("expected AnalyzeFile command"),
        }
    }

    #[test]
    fn cli_parses_commit_message_and_files() {
        let cli = Cli::parse_from(["reva", "commit", "-m", "msg", "--files", "a.rs", "b.rs"]);
        match cli.command {
            Commands::Commit { message, files } => {
                assert_eq!(message.as_deref(), Some("msg"));
                assert_eq!(files, Some(vec!["a.rs".to_string(), "b.rs".to_string()]));
            }
            _ => panic!("expected Commit command"),
        }
    }

    #[test]
    fn cli_parses_branch_no_checkout() {
        let cli = Cli::parse_from(["reva", "branch", "feature", "--no-checkout"]);
        match cli.command {
            Commands::Branch { name, no_checkout } => {
                assert_eq!(name, "feature");
                assert!(no_checkout);
            }
            _ => panic!("expected Branch command"),
        }
    }

    #[test]
    fn cli_parses_push_defaults() {
        let cli = Cli::parse_from(["reva", "push"]);
        match cli.command {
            Commands::Push { remote, branch } => {
                assert_eq!(remote, "origin");
                assert!(branch.is_none());
            }
            _ => panic!("expected Push command"),
        }
    }

    #[test]
    fn cli_parses_log_count() {
        let cli = Cli::parse_from(["reva", "log", "-n", "3"]);
        match cli.command {
            Commands::Log { count } => assert_eq!(count, 3),
            _ => panic!("expected Log command"),
        }
    }

    #[test]
    fn cli_parses_init_output() {
        let cli = Cli::parse_from(["reva", "init", "--output", "custom.yaml"]);
        match cli.command {
            Commands::Init { output } => assert_eq!(output, PathBuf::from("custom.yaml")),
            _ => panic!("expected Init command"),
        }
    }

    #[test]
    fn cli_parses_fmt_check() {
        let cli = Cli::parse_from(["reva", "fmt", "--check"]);
        match cli.command {
            Commands::Fmt { check } => assert!(check),
            _ => panic!("expected Fmt command"),
        }
    }
}
