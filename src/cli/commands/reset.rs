//! Reset command implementation.
//!
//! The `statesman reset --step <name>` command forgets the recorded hashes
//! of a step's sections, so its next check reports it as stale.

use crate::cli::args::ResetArgs;
use crate::error::Result;
use crate::steps::{CommandStep, Step};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandContext, CommandResult};

/// The reset command implementation.
pub struct ResetCommand {
    context: CommandContext,
    args: ResetArgs,
}

impl ResetCommand {
    /// Create a new reset command.
    pub fn new(context: &CommandContext, args: ResetArgs) -> Self {
        Self {
            context: context.clone(),
            args,
        }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &ResetArgs {
        &self.args
    }
}

impl Command for ResetCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let config = self.context.load_config()?;
        let step = CommandStep::load(&config, &self.args.step)?;
        let mut state = self.context.state(&config)?;

        let descriptor = step.descriptor();
        let removed = state.forget(descriptor.sections())?;

        if removed == 0 {
            ui.skipped(&format!("{}: no recorded sections", self.args.step));
        } else {
            ui.success(&format!(
                "{}: forgot {} section(s)",
                self.args.step, removed
            ));
        }
        Ok(CommandResult::success())
    }
}
