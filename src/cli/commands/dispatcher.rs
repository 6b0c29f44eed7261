//! Command dispatching.
//!
//! This module provides the core command infrastructure:
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`CommandContext`] for the configuration shared by every command
//! - [`CommandDispatcher`] for routing CLI subcommands

use std::path::{Path, PathBuf};

use crate::cli::args::{Cli, Commands};
use crate::config::{load_config, ConfigTree};
use crate::error::Result;
use crate::state::SectionStateStore;
use crate::steps::{CommandStep, RunnerOptions, StepObserver, StepRunner};
use crate::ui::UserInterface;

/// Trait for command implementations.
///
/// Each CLI subcommand implements this trait to provide its execution logic.
pub trait Command {
    /// Execute the command.
    ///
    /// # Arguments
    ///
    /// * `ui` - User interface for displaying output
    ///
    /// # Returns
    ///
    /// A [`CommandResult`] indicating success/failure and exit code.
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult>;
}

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,

    /// Exit code to use (0 for success, non-zero for failure).
    pub exit_code: i32,
}

impl CommandResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    /// Create a failure result.
    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }
}

/// Configuration location and runner options shared by all commands.
#[derive(Debug, Clone)]
pub struct CommandContext {
    config_path: PathBuf,
    options: RunnerOptions,
}

impl CommandContext {
    /// Create a context for the given configuration file.
    pub fn new(config_path: impl Into<PathBuf>, options: RunnerOptions) -> Self {
        Self {
            config_path: config_path.into(),
            options,
        }
    }

    /// Build a context from parsed CLI arguments.
    pub fn from_cli(cli: &Cli) -> Self {
        Self::new(
            cli.config.clone(),
            RunnerOptions {
                workdir_key: cli.workdir_key.clone(),
                workdir: cli.workdir.clone(),
            },
        )
    }

    /// Path to the configuration file, as given.
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Runner options.
    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Load the configuration tree.
    pub fn load_config(&self) -> Result<ConfigTree> {
        load_config(&self.config_path)
    }

    /// Resolve the working directory for an already loaded configuration.
    pub fn workdir(&self, config: &ConfigTree) -> Result<PathBuf> {
        match &self.options.workdir {
            Some(dir) => Ok(std::path::absolute(dir)?),
            None => {
                let config_path = std::path::absolute(&self.config_path)?;
                config.resolve_workdir(&config_path, &self.options.workdir_key)
            }
        }
    }

    /// Load the section state of the working directory.
    pub fn state(&self, config: &ConfigTree) -> Result<SectionStateStore> {
        SectionStateStore::load(&self.workdir(config)?)
    }

    /// Build a runner for a declared step.
    ///
    /// The step declaration and the hashed sections come from the same tree.
    pub fn runner(
        &self,
        config: &ConfigTree,
        step: &str,
        observer: impl StepObserver + 'static,
    ) -> Result<StepRunner<CommandStep>> {
        let step = CommandStep::load(config, step)?;
        Ok(StepRunner::with_config(
            step,
            &self.config_path,
            config.clone(),
            self.options.clone(),
        )?
        .with_observer(observer))
    }
}

/// Dispatches CLI commands to their implementations.
pub struct CommandDispatcher {
    context: CommandContext,
}

impl CommandDispatcher {
    /// Create a new dispatcher for the given context.
    pub fn new(context: CommandContext) -> Self {
        Self { context }
    }

    /// Dispatch and execute a command.
    ///
    /// Routes the CLI subcommand to the appropriate command implementation
    /// and executes it.
    pub fn dispatch(&self, cli: &Cli, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        match &cli.command {
            Commands::Check(args) => {
                let cmd = super::check::CheckCommand::new(&self.context, args.clone());
                cmd.execute(ui)
            }
            Commands::Run(args) => {
                let cmd = super::run::RunCommand::new(&self.context, args.clone());
                cmd.execute(ui)
            }
            Commands::Status(args) => {
                let cmd = super::status::StatusCommand::new(&self.context, args.clone());
                cmd.execute(ui)
            }
            Commands::Reset(args) => {
                let cmd = super::reset::ResetCommand::new(&self.context, args.clone());
                cmd.execute(ui)
            }
        }
    }
}
