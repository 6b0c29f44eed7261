//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_WORKDIR_KEY;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "statesman.yml";

/// Statesman - Incremental execution of workflow steps.
#[derive(Debug, Parser)]
#[command(name = "statesman")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "STATESMAN_CONFIG",
        default_value = DEFAULT_CONFIG_FILE
    )]
    pub config: PathBuf,

    /// Dotted key in the configuration naming the working directory
    #[arg(long, global = true, default_value = DEFAULT_WORKDIR_KEY)]
    pub workdir_key: String,

    /// Working directory (overrides the configuration)
    #[arg(short, long, global = true)]
    pub workdir: Option<PathBuf>,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Report whether a step needs to run (exit code 1 if it does)
    Check(CheckArgs),

    /// Run a step if it is out of date
    Run(RunArgs),

    /// Show every declared step and the recorded section hashes
    Status(StatusArgs),

    /// Forget the recorded section hashes of a step
    Reset(ResetArgs),
}

/// Arguments for the `check` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct CheckArgs {
    /// Step to check
    #[arg(short, long)]
    pub step: String,

    /// Print the verdict as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `run` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct RunArgs {
    /// Step to run
    #[arg(short, long)]
    pub step: String,

    /// Run even if the step is up to date
    #[arg(short, long)]
    pub force: bool,
}

/// Arguments for the `status` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct StatusArgs {
    /// Show status for a specific step only
    #[arg(long)]
    pub step: Option<String>,
}

/// Arguments for the `reset` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ResetArgs {
    /// Step whose sections are forgotten
    #[arg(short, long)]
    pub step: String,
}
