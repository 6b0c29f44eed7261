//! Check command implementation.
//!
//! The `statesman check --step <name>` command reports whether a step needs
//! to run, and why, without running it.

use serde_json::json;

use crate::cli::args::CheckArgs;
use crate::error::Result;
use crate::steps::{Staleness, TracingObserver};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandContext, CommandResult};

/// Exit code when the step needs to run.
pub const EXIT_NEEDS_RUN: i32 = 1;

/// The check command implementation.
pub struct CheckCommand {
    context: CommandContext,
    args: CheckArgs,
}

impl CheckCommand {
    /// Create a new check command.
    pub fn new(context: &CommandContext, args: CheckArgs) -> Self {
        Self {
            context: context.clone(),
            args,
        }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &CheckArgs {
        &self.args
    }
}

impl Command for CheckCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let config = self.context.load_config()?;
        let runner = self.context.runner(&config, &self.args.step, TracingObserver)?;
        let verdict = runner.check()?;

        if self.args.json {
            let report = json!({
                "step": self.args.step,
                "needs_run": verdict.needs_run(),
                "reason": verdict.reason(),
                "workdir": runner.workdir(),
            });
            ui.raw(&serde_json::to_string_pretty(&report).map_err(anyhow::Error::from)?);
        } else {
            match &verdict {
                Staleness::Fresh => ui.success(&format!("{} is up to date", self.args.step)),
                Staleness::Stale(reason) => {
                    ui.warning(&format!("{} needs to run: {}", self.args.step, reason));
                    ui.show_hint(&format!("statesman run --step {}", self.args.step));
                }
            }
        }

        Ok(if verdict.needs_run() {
            CommandResult::failure(EXIT_NEEDS_RUN)
        } else {
            CommandResult::success()
        })
    }
}
