//! Statesman - Incremental execution of configuration-driven workflow steps.
//!
//! Statesman decides whether a step of a simulation or build workflow needs
//! to run again. A step declares the files it reads, the files it writes and
//! the configuration sections it depends on; Statesman compares those
//! against the filesystem and a hash of each section recorded after the last
//! successful run.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Configuration loading and section canonicalization
//! - [`error`] - Error types and result aliases
//! - [`shell`] - Shell command execution
//! - [`state`] - Persisted section hashes per working directory
//! - [`steps`] - Dependency descriptors, staleness and the step executor
//! - [`ui`] - Terminal output
//!
//! # Example
//!
//! ```
//! use statesman::config::hash_section;
//!
//! // Key order does not change a section's hash
//! let a: serde_yaml::Value = serde_yaml::from_str("{n: 40, order: 2}").unwrap();
//! let b: serde_yaml::Value = serde_yaml::from_str("{order: 2, n: 40}").unwrap();
//! assert_eq!(hash_section(&a).unwrap(), hash_section(&b).unwrap());
//! ```
//!
//! For running steps against files on disk, see the integration tests.

pub mod cli;
pub mod config;
pub mod error;
pub mod shell;
pub mod state;
pub mod steps;
pub mod ui;

pub use error::{Result, StatesmanError};
