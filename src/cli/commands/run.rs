//! Run command implementation.
//!
//! The `statesman run --step <name>` command runs a step if it is out of
//! date, validates its outputs and records its section hashes.

use crate::cli::args::RunArgs;
use crate::error::{Result, StatesmanError};
use crate::steps::{RecordingObserver, RunOutcome, StepEvent};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandContext, CommandResult};

/// The run command implementation.
pub struct RunCommand {
    context: CommandContext,
    args: RunArgs,
}

impl RunCommand {
    /// Create a new run command.
    pub fn new(context: &CommandContext, args: RunArgs) -> Self {
        Self {
            context: context.clone(),
            args,
        }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &RunArgs {
        &self.args
    }

    fn report_events(&self, ui: &mut dyn UserInterface, events: &[StepEvent]) {
        let details = ui.output_mode().shows_details();
        for event in events {
            match event {
                StepEvent::InputRejected { .. }
                | StepEvent::OutputStale { .. }
                | StepEvent::SectionChanged { .. } => ui.message(&event.to_string()),
                StepEvent::Executing { .. } if details => ui.message(&event.to_string()),
                _ => {}
            }
        }
    }
}

impl Command for RunCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let config = self.context.load_config()?;
        let recorder = RecordingObserver::new();
        let mut runner = self
            .context
            .runner(&config, &self.args.step, recorder.clone())?;

        ui.show_header(&self.args.step);
        let outcome = runner.run(self.args.force);
        self.report_events(ui, &recorder.events());

        match outcome {
            Ok(RunOutcome::Skipped) => {
                ui.skipped(&format!("{} is up to date", self.args.step));
                Ok(CommandResult::success())
            }
            Ok(RunOutcome::Committed { sections }) => {
                ui.success(&format!(
                    "{} completed, recorded {} section(s)",
                    self.args.step,
                    sections.len()
                ));
                if ui.output_mode().shows_details() {
                    for (section, hash) in &sections {
                        ui.message(&format!("  {} {}", section, hash));
                    }
                }
                Ok(CommandResult::success())
            }
            Err(
                e @ (StatesmanError::Callback(_) | StatesmanError::OutputContractViolation { .. }),
            ) => {
                ui.error(&format!("{} failed: {}", self.args.step, e));
                Ok(CommandResult::failure(1))
            }
            Err(e) => Err(e),
        }
    }
}
