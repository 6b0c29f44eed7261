//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results.
//!
//! # Architecture
//!
//! Commands are dispatched via [`CommandDispatcher`], which routes CLI
//! subcommands to their implementations. Every command shares one
//! [`CommandContext`] holding the configuration path and runner options.

pub mod check;
pub mod dispatcher;
pub mod reset;
pub mod run;
pub mod status;

pub use dispatcher::{Command, CommandContext, CommandDispatcher, CommandResult};
