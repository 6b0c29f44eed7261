//! Shell command execution for command steps.

pub mod command;

pub use command::{execute, CommandOptions, CommandResult};
