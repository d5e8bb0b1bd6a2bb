//! File capability: path-scoped read/write/list behind a protected-pattern
//! gate.

use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use tracing::warn;

use crate::core::error::{Error, Result};

/// Patterns protected when the configuration does not supply any.
pub const DEFAULT_PROTECTED: &[&str] = &[".git/**", ".github/**", "config/**"];

/// Metadata for a single file or directory.
#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    pub path: String,
    pub size: u64,
    pub modified: u64,
    pub is_file: bool,
    pub is_dir: bool,
    pub protected: bool,
}

/// Filesystem access rooted at a repository, refusing writes to protected
/// paths.
#[derive(Debug)]
pub struct Files {
    root: PathBuf,
    protected: GlobSet,
    patterns: Vec<String>,
}

impl Files {
    /// Create a file capability for `root`. `patterns` defaults to
    /// [`DEFAULT_PROTECTED`] when absent. The compiled pattern set is
    /// fixed for the lifetime of the value.
    #[must_use]
    pub fn new(root: PathBuf, patterns: Option<Vec<String>>) -> Self {
        let patterns = patterns.unwrap_or_else(|| {
            DEFAULT_PROTECTED.iter().map(|p| (*p).to_string()).collect()
        });
        let protected = build_globset(&patterns);
        Self {
            root,
            protected,
            patterns,
        }
    }

    /// Whether writes to `path` are refused.
    ///
    /// The path is resolved against the repository root; anything that
    /// resolves outside the root is protected. Patterns match the
    /// repo-relative path both bare and with a trailing `/**`, so a
    /// directory pattern also covers the directory itself.
    #[must_use]
    pub fn is_protected(&self, path: impl AsRef<Path>) -> bool {
        let resolved = self.resolve(path.as_ref());
        let Ok(relative) = resolved.strip_prefix(&self.root) else {
            return true;
        };
        let relative = to_slash(relative);
        self.protected.is_match(relative.as_str())
            || self.protected.is_match(format!("{relative}/**").as_str())
    }

    /// Read a file's content.
    ///
    /// # Errors
    ///
    /// `NotFound` when the file does not exist; other IO errors propagate.
    pub fn read(&self, path: impl AsRef<Path>) -> Result<String> {
        let resolved = self.resolve(path.as_ref());
        std::fs::read_to_string(&resolved).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(resolved.display().to_string()),
            _ => Error::Io(err),
        })
    }

    /// Write `content` to a file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` when the target matches a protected pattern or
    /// resolves outside the repository root.
    pub fn write(&self, path: impl AsRef<Path>, content: &str) -> Result<()> {
        let resolved = self.resolve(path.as_ref());
        if self.is_protected(&resolved) {
            return Err(Error::PermissionDenied(resolved));
        }
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&resolved, content)?;
        Ok(())
    }

    /// List entries under `dir` whose final component matches `pattern`,
    /// as sorted repo-relative paths.
    ///
    /// # Errors
    ///
    /// `NotFound` when `dir` is not a directory; an invalid pattern is an
    /// IO error.
    pub fn list(
        &self,
        dir: impl AsRef<Path>,
        pattern: &str,
        recursive: bool,
        include_dirs: bool,
    ) -> Result<Vec<String>> {
        let dir = self.resolve(dir.as_ref());
        if !dir.is_dir() {
            return Err(Error::NotFound(format!("not a directory: {}", dir.display())));
        }

        let matcher = Glob::new(pattern)
            .map_err(|err| {
                Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, err))
            })?
            .compile_matcher();

        let mut walker = ignore::WalkBuilder::new(&dir);
        walker.standard_filters(false).follow_links(false);
        if !recursive {
            walker.max_depth(Some(1));
        }

        let mut results = Vec::new();
        for entry in walker.build() {
            let Ok(entry) = entry else { continue };
            let path = entry.path();
            if path == dir {
                continue;
            }
            let is_dir = path.is_dir();
            if is_dir && !include_dirs {
                continue;
            }
            if !is_dir && !path.is_file() {
                continue;
            }
            let matches = path
                .file_name()
                .is_some_and(|name| matcher.is_match(Path::new(name)));
            if !matches {
                continue;
            }
            if let Ok(relative) = path.strip_prefix(&self.root) {
                results.push(to_slash(relative));
            }
        }

        results.sort();
        Ok(results)
    }

    /// Find files matching `pattern` recursively from the root.
    ///
    /// # Errors
    ///
    /// See [`Files::list`].
    pub fn find(&self, pattern: &str) -> Result<Vec<String>> {
        self.list(".", pattern, true, false)
    }

    /// Metadata for `path`.
    ///
    /// # Errors
    ///
    /// `NotFound` when the path does not exist.
    pub fn info(&self, path: impl AsRef<Path>) -> Result<FileInfo> {
        let resolved = self.resolve(path.as_ref());
        let metadata = std::fs::metadata(&resolved).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(resolved.display().to_string()),
            _ => Error::Io(err),
        })?;

        let modified = metadata
            .modified()
            .ok()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |duration| duration.as_secs());

        let display = resolved
            .strip_prefix(&self.root)
            .map_or_else(|_| resolved.display().to_string(), to_slash);

        Ok(FileInfo {
            path: display,
            size: metadata.len(),
            modified,
            is_file: metadata.is_file(),
            is_dir: metadata.is_dir(),
            protected: self.is_protected(&resolved),
        })
    }

    /// Resolve a path against the root: absolute paths are used as-is,
    /// relative paths are joined. The result is lexically normalized so
    /// `..` segments cannot dodge the root check.
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            normalize(path)
        } else {
            normalize(&self.root.join(path))
        }
    }
}

fn build_globset(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(err) => warn!(%pattern, %err, "skipping invalid protected pattern"),
        }
    }
    builder.build().unwrap_or_else(|err| {
        warn!(%err, "failed to compile protected patterns");
        GlobSet::empty()
    })
}

/// Lexical normalization: strips `.` segments and resolves `..` without
/// touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
