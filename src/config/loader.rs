//! Configuration file loading.
//!
//! The configuration is a single YAML document. It is read once when a step
//! is constructed and again only when the caller asks for a reload.

use crate::config::tree::ConfigTree;
use crate::error::{Result, StatesmanError};
use std::fs;
use std::path::Path;

/// Load a config file into a [`ConfigTree`].
///
/// # Errors
///
/// Returns `ConfigNotFound` if the file doesn't exist.
/// Returns `ConfigParseError` if the YAML is invalid or the document root is
/// not a mapping.
pub fn load_config(path: &Path) -> Result<ConfigTree> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StatesmanError::ConfigNotFound {
                path: path.to_path_buf(),
            }
        } else {
            StatesmanError::Io(e)
        }
    })?;

    parse_tree(parse_value(&content, path)?, path)
}

/// Parse YAML text into a [`ConfigTree`].
///
/// # Arguments
///
/// * `content` - The YAML content to parse
/// * `source_path` - Path for error reporting
pub fn parse_config(content: &str, source_path: &Path) -> Result<ConfigTree> {
    let value = parse_value(content, source_path)?;
    parse_tree(value, source_path)
}

fn parse_value(content: &str, source_path: &Path) -> Result<serde_yaml::Value> {
    if content.trim().is_empty() {
        return Ok(serde_yaml::Value::Null);
    }

    serde_yaml::from_str(content).map_err(|e| StatesmanError::ConfigParseError {
        path: source_path.to_path_buf(),
        message: e.to_string(),
    })
}

fn parse_tree(value: serde_yaml::Value, source_path: &Path) -> Result<ConfigTree> {
    ConfigTree::from_value(value).ok_or_else(|| StatesmanError::ConfigParseError {
        path: source_path.to_path_buf(),
        message: "top-level document must be a mapping".to_string(),
    })
}
