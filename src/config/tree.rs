//! In-memory configuration tree.
//!
//! [`ConfigTree`] wraps the materialized YAML document and offers the
//! lookups the engine needs: named sections and dotted key paths.

use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

use crate::error::{Result, StatesmanError};

/// Default dotted key path selecting the working directory.
pub const DEFAULT_WORKDIR_KEY: &str = "general.workdir";

/// A loaded configuration document.
///
/// The root is always a mapping; an empty document is an empty mapping.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigTree {
    root: Mapping,
}

impl ConfigTree {
    /// Build a tree from a parsed YAML value.
    ///
    /// Returns `None` if the root is neither a mapping nor null.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Mapping(root) => Some(Self { root }),
            Value::Null => Some(Self::default()),
            _ => None,
        }
    }

    /// The root mapping.
    pub fn root(&self) -> &Mapping {
        &self.root
    }

    /// Get a top-level section by name.
    pub fn get(&self, section: &str) -> Option<&Value> {
        self.root.get(section)
    }

    /// Get a top-level section, treating a missing one as an empty mapping.
    pub fn section(&self, section: &str) -> Value {
        self.get(section)
            .cloned()
            .unwrap_or_else(|| Value::Mapping(Mapping::new()))
    }

    /// Look up a value by dotted key path (e.g. `general.workdir`).
    pub fn get_path(&self, dotted: &str) -> Option<&Value> {
        let mut parts = dotted.split('.');
        let first = parts.next()?;
        let mut current = self.root.get(first)?;

        for part in parts {
            current = current.as_mapping()?.get(part)?;
        }

        Some(current)
    }

    /// Resolve the working directory for a config file.
    ///
    /// The value at `workdir_key` is interpreted relative to the directory
    /// containing `config_path`. When the key is absent the config file's
    /// own directory is used.
    pub fn resolve_workdir(&self, config_path: &Path, workdir_key: &str) -> Result<PathBuf> {
        let base = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        match self.get_path(workdir_key) {
            None | Some(Value::Null) => Ok(base),
            Some(Value::String(dir)) => Ok(base.join(dir)),
            Some(other) => Err(StatesmanError::ConfigValidationError {
                message: format!(
                    "'{}' must be a path string, found {}",
                    workdir_key,
                    describe(other)
                ),
            }),
        }
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
