//! Configuration management for the repository agent.
//!
//! The configuration is held as a generic YAML tree so that keys this
//! version does not recognize survive a load/save round-trip untouched.
//! Values are addressed by dot-separated paths (e.g. `llm.provider`).

use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};

use crate::core::error::Result;

/// Default location of the configuration file, relative to the working
/// directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/reva.yaml";

/// Agent configuration backed by a YAML document.
#[derive(Debug, Clone)]
pub struct Config {
    path: PathBuf,
    root: Value,
}

impl Config {
    /// Load configuration from `path`, falling back to
    /// [`DEFAULT_CONFIG_PATH`] and then to the built-in defaults when no
    /// file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), Path::to_path_buf);

        let root = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            match serde_yaml::from_str(&contents)? {
                Value::Null => Value::Mapping(Mapping::new()),
                value => value,
            }
        } else {
            default_config()
        };

        Ok(Self { path, root })
    }

    /// Get a value by dotted key, descending the tree one segment at a
    /// time. Returns `None` as soon as a segment is absent or its parent
    /// is not a mapping.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        let mut node = &self.root;
        for part in key.split('.') {
            node = node.get(part)?;
        }
        Some(node)
    }

    /// Get a string value, falling back to `default`.
    #[must_use]
    pub fn get_str(&self, key: &str, default: &str) -> String {
        self.get(key)
            .and_then(Value::as_str)
            .map_or_else(|| default.to_string(), str::to_string)
    }

    /// Get a string value when present.
    #[must_use]
    pub fn get_str_opt(&self, key: &str) -> Option<String> {
        self.get(key).and_then(Value::as_str).map(str::to_string)
    }

    /// Get a boolean value, falling back to `default`.
    #[must_use]
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    /// Get an unsigned integer value, falling back to `default`.
    #[must_use]
    pub fn get_u64(&self, key: &str, default: u64) -> u64 {
        self.get(key).and_then(Value::as_u64).unwrap_or(default)
    }

    /// Get a float value, falling back to `default`. Integer nodes are
    /// widened.
    #[must_use]
    pub fn get_f64(&self, key: &str, default: f64) -> f64 {
        self.get(key).and_then(Value::as_f64).unwrap_or(default)
    }

    /// Get a sequence of strings when present. Non-string elements are
    /// skipped.
    #[must_use]
    pub fn get_str_list(&self, key: &str) -> Option<Vec<String>> {
        let seq = self.get(key)?.as_sequence()?;
        Some(
            seq.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
        )
    }

    /// Set a value by dotted key, creating intermediate mappings on
    /// demand. A non-mapping intermediate is replaced by a fresh mapping.
    pub fn set(&mut self, key: &str, value: Value) {
        let parts: Vec<&str> = key.split('.').collect();
        let Some((last, inner)) = parts.split_last() else {
            return;
        };

        let mut node = &mut self.root;
        for part in inner {
            if !node.is_mapping() {
                *node = Value::Mapping(Mapping::new());
            }
            let Value::Mapping(map) = node else {
                return;
            };
            let segment = Value::String((*part).to_string());
            if !matches!(map.get(&segment), Some(Value::Mapping(_))) {
                map.insert(segment.clone(), Value::Mapping(Mapping::new()));
            }
            match map.get_mut(&segment) {
                Some(next) => node = next,
                None => return,
            }
        }

        if !node.is_mapping() {
            *node = Value::Mapping(Mapping::new());
        }
        if let Value::Mapping(map) = node {
            map.insert(Value::String((*last).to_string()), value);
        }
    }

    /// Persist the whole tree to `path` (or the path the config was
    /// loaded from), creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let target = path.unwrap_or(&self.path);
        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(target, serde_yaml::to_string(&self.root)?)?;
        Ok(())
    }

    /// The path this configuration is bound to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_CONFIG_PATH),
            root: default_config(),
        }
    }
}

/// Build a fresh default configuration tree.
#[must_use]
pub fn default_config() -> Value {
    let mut llm = Mapping::new();
    llm.insert("provider".into(), "openai".into());
    llm.insert("model".into(), "gpt-4o".into());
    llm.insert("temperature".into(), 0.7_f64.into());
    llm.insert("max_tokens".into(), 2000_u64.into());

    let mut repository = Mapping::new();
    repository.insert("auto_commit".into(), true.into());
    repository.insert("commit_message_prefix".into(), "[reva]".into());
    repository.insert("branch_prefix".into(), "reva/".into());
    repository.insert("auto_pr".into(), false.into());

    let mut tasks = Mapping::new();
    tasks.insert("max_iterations".into(), 5_u64.into());
    tasks.insert("timeout".into(), 300_u64.into());

    let mut safety = Mapping::new();
    safety.insert("dry_run".into(), false.into());
    safety.insert("require_approval".into(), false.into());
    safety.insert(
        "protected_files".into(),
        Value::Sequence(vec![".git/**".into(), ".github/**".into(), "config/**".into()]),
    );

    let mut root = Mapping::new();
    root.insert("llm".into(), Value::Mapping(llm));
    root.insert("repository".into(), Value::Mapping(repository));
    root.insert("tasks".into(), Value::Mapping(tasks));
    root.insert("safety".into(), Value::Mapping(safety));
    Value::Mapping(root)
}
