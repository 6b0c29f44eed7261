//! Status command implementation.
//!
//! The `statesman status` command shows every declared step with its
//! verdict, followed by the section hashes recorded in the working
//! directory.

use crate::cli::args::StatusArgs;
use crate::error::{Result, StatesmanError};
use crate::steps::{step_definitions, Staleness, TracingObserver};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandContext, CommandResult};

/// Number of hash characters shown per section.
const SHORT_HASH_LEN: usize = 12;

/// The status command implementation.
pub struct StatusCommand {
    context: CommandContext,
    args: StatusArgs,
}

impl StatusCommand {
    /// Create a new status command.
    pub fn new(context: &CommandContext, args: StatusArgs) -> Self {
        Self {
            context: context.clone(),
            args,
        }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &StatusArgs {
        &self.args
    }
}

impl Command for StatusCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let config = self.context.load_config()?;
        let definitions = step_definitions(&config)?;
        let workdir = self.context.workdir(&config)?;

        let names: Vec<String> = match &self.args.step {
            Some(step) if !definitions.contains_key(step) => {
                return Err(StatesmanError::ConfigValidationError {
                    message: format!("unknown step '{}'", step),
                })
            }
            Some(step) => vec![step.clone()],
            None => definitions.keys().cloned().collect(),
        };

        ui.show_header(&format!("Status - {}", workdir.display()));

        let mut had_errors = false;
        if names.is_empty() {
            ui.message("No steps declared.");
        } else {
            ui.message("Steps:");
        }

        for name in &names {
            let verdict = self
                .context
                .runner(&config, name, TracingObserver)
                .and_then(|runner| runner.check());
            match verdict {
                Ok(Staleness::Fresh) => ui.success(&format!("{}: up to date", name)),
                Ok(Staleness::Stale(reason)) => {
                    ui.warning(&format!("{}: needs to run ({})", name, reason))
                }
                Err(e) => {
                    had_errors = true;
                    ui.error(&format!("{}: {}", name, e));
                }
            }
        }

        let state = self.context.state(&config)?;
        ui.message("");
        if state.sections().is_empty() {
            ui.message("No section hashes recorded.");
        } else {
            ui.message("Recorded sections:");
            for (section, hash) in state.sections() {
                let short = hash.get(..SHORT_HASH_LEN).unwrap_or(hash.as_str());
                ui.message(&format!("  {:<20} {}", section, short));
            }
        }

        Ok(if had_errors {
            CommandResult::failure(1)
        } else {
            CommandResult::success()
        })
    }
}
