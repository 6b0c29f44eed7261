//! Error types for Statesman operations.
//!
//! This module defines [`StatesmanError`], the primary error type used
//! throughout the crate, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Decision-phase problems with input files are not errors: they turn
//!   into a "needs to run" verdict (see [`crate::steps::StaleReason`])
//! - Configuration and hashing problems are fatal and surface here
//! - Errors raised by a step's own work are carried unmodified in
//!   [`StatesmanError::Callback`] so callers can downcast them

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for Statesman operations.
#[derive(Debug, Error)]
pub enum StatesmanError {
    /// Configuration file not found at expected location.
    #[error("Configuration not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Failed to parse configuration file.
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// Invalid configuration structure or values.
    #[error("Invalid configuration: {message}")]
    ConfigValidationError { message: String },

    /// A configuration section contains a map key that cannot be hashed stably.
    #[error("Invalid key {key} in configuration: {reason}")]
    InvalidKey { key: String, reason: String },

    /// The persisted section state could not be read back.
    #[error("Failed to parse state file at {path}: {message}")]
    StateParseError { path: PathBuf, message: String },

    /// A declared output was missing or empty after the step executed.
    #[error("Step '{step}' did not produce output '{output}': {reason}")]
    OutputContractViolation {
        step: String,
        output: String,
        reason: String,
    },

    /// Shell command failed to start or exited non-zero.
    #[error("Command failed with exit code {code:?}: {command}")]
    CommandFailed { command: String, code: Option<i32> },

    /// Error raised by a step's execute body, passed through untouched.
    #[error(transparent)]
    Callback(anyhow::Error),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for Statesman operations.
pub type Result<T> = std::result::Result<T, StatesmanError>;
