//! Error types shared across the core capabilities.

use std::path::PathBuf;

/// Core error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File or branch does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write refused by the protected-pattern gate.
    #[error("path is protected: {}", .0.display())]
    PermissionDenied(PathBuf),

    /// Commit requested against a clean working tree.
    #[error("nothing to commit")]
    NothingToCommit,

    /// Agent constructed against a path that is not a git repository.
    #[error("not a git repository: {}", .0.display())]
    InvalidRepository(PathBuf),

    /// LLM provider name outside the supported set.
    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// No API credential resolvable for the selected provider.
    #[error("no API key configured for provider '{0}'")]
    MissingCredential(String),

    /// A subprocess exited non-zero.
    #[error("command failed: {command}: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// A unified diff could not be applied to the working tree.
    #[error("failed to apply diff: {0}")]
    DiffApplyFailed(String),

    /// LLM API returned an error response.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Failed to parse an API response.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization failed.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration document could not be parsed or serialized.
    #[error("config error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
