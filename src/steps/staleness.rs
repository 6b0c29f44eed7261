//! Staleness detection for steps.
//!
//! This module provides the [`StalenessCheck`] that decides whether a
//! step's outputs still reflect its inputs and configuration, and the
//! [`Staleness`] verdict it produces.
//!
//! # Check Order
//!
//! Checks run from cheapest to most expensive and stop at the first
//! failure:
//!
//! 1. Every input exists, is non-empty if required, and is newer than its
//!    reference if one is set
//! 2. Every output exists and is non-empty
//! 3. No input is newer than any output
//! 4. Every dependent section hashes to its recorded value

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use super::descriptor::{mtime_or_epoch, DependencyDescriptor, InputStatus};
use crate::config::{hash_section, ConfigTree};
use crate::error::Result;
use crate::state::SectionStateStore;

/// Why a step needs to run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StaleReason {
    /// An input does not exist.
    InputMissing { input: String, path: PathBuf },

    /// An input is empty but must not be.
    InputEmpty { input: String, path: PathBuf },

    /// An input is not newer than its reference.
    InputNotNewer {
        input: String,
        reference: PathBuf,
        modified: DateTime<Utc>,
        reference_modified: DateTime<Utc>,
    },

    /// An output does not exist.
    OutputMissing { output: String },

    /// An output exists but is empty.
    OutputEmpty { output: String },

    /// An input was modified after an output.
    InputNewerThanOutput {
        input: String,
        output: String,
        input_modified: DateTime<Utc>,
        output_modified: DateTime<Utc>,
    },

    /// A dependent section has no recorded hash or a different one.
    SectionChanged {
        section: String,
        previous: Option<String>,
        current: String,
    },
}

impl StaleReason {
    /// Check if this reason comes from the input-validity checks.
    pub fn is_input_failure(&self) -> bool {
        matches!(
            self,
            StaleReason::InputMissing { .. }
                | StaleReason::InputEmpty { .. }
                | StaleReason::InputNotNewer { .. }
        )
    }

    fn from_input(input: &str, status: InputStatus) -> Option<Self> {
        let input = input.to_string();
        match status {
            InputStatus::Valid => None,
            InputStatus::Missing { path } => Some(StaleReason::InputMissing { input, path }),
            InputStatus::Empty { path } => Some(StaleReason::InputEmpty { input, path }),
            InputStatus::NotNewer {
                reference,
                modified,
                reference_modified,
                ..
            } => Some(StaleReason::InputNotNewer {
                input,
                reference,
                modified,
                reference_modified,
            }),
        }
    }
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::InputMissing { input, .. } => write!(f, "input '{}' is missing", input),
            StaleReason::InputEmpty { input, .. } => write!(f, "input '{}' is empty", input),
            StaleReason::InputNotNewer {
                input, reference, ..
            } => write!(
                f,
                "input '{}' is not newer than {}",
                input,
                reference.display()
            ),
            StaleReason::OutputMissing { output } => write!(f, "output '{}' is missing", output),
            StaleReason::OutputEmpty { output } => write!(f, "output '{}' is empty", output),
            StaleReason::InputNewerThanOutput { input, output, .. } => {
                write!(f, "input '{}' is newer than output '{}'", input, output)
            }
            StaleReason::SectionChanged {
                section,
                previous: None,
                ..
            } => write!(f, "section '{}' has no recorded hash", section),
            StaleReason::SectionChanged { section, .. } => {
                write!(f, "section '{}' changed", section)
            }
        }
    }
}

/// Verdict of a staleness check.
#[derive(Debug, Clone, PartialEq)]
pub enum Staleness {
    /// Outputs are current; nothing to do.
    Fresh,

    /// The step needs to run.
    Stale(StaleReason),
}

impl Staleness {
    /// Check if the step needs to run.
    pub fn needs_run(&self) -> bool {
        matches!(self, Staleness::Stale(_))
    }

    /// The reason, if stale.
    pub fn reason(&self) -> Option<&StaleReason> {
        match self {
            Staleness::Fresh => None,
            Staleness::Stale(reason) => Some(reason),
        }
    }
}

/// Evaluates a descriptor against the filesystem and recorded state.
pub struct StalenessCheck<'a> {
    descriptor: &'a DependencyDescriptor,
    workdir: &'a Path,
    config_path: &'a Path,
    config: &'a ConfigTree,
    state: &'a SectionStateStore,
}

impl<'a> StalenessCheck<'a> {
    /// Create a new staleness check.
    pub fn new(
        descriptor: &'a DependencyDescriptor,
        workdir: &'a Path,
        config_path: &'a Path,
        config: &'a ConfigTree,
        state: &'a SectionStateStore,
    ) -> Self {
        Self {
            descriptor,
            workdir,
            config_path,
            config,
            state,
        }
    }

    /// Run every check in order and return the first failure.
    ///
    /// # Errors
    ///
    /// File problems never produce errors. Only a section that cannot be
    /// hashed (`InvalidKey`) is returned as an error.
    pub fn evaluate(&self) -> Result<Staleness> {
        if let Some(reason) = self
            .check_inputs()
            .or_else(|| self.check_outputs())
            .or_else(|| self.check_recency())
        {
            return Ok(Staleness::Stale(reason));
        }

        if let Some(reason) = self.check_sections()? {
            return Ok(Staleness::Stale(reason));
        }

        Ok(Staleness::Fresh)
    }

    /// Shorthand for `evaluate()?.needs_run()`.
    pub fn needs_run(&self) -> Result<bool> {
        Ok(self.evaluate()?.needs_run())
    }

    fn check_inputs(&self) -> Option<StaleReason> {
        self.descriptor.inputs().iter().find_map(|input| {
            StaleReason::from_input(&input.name, input.check(self.workdir, self.config_path))
        })
    }

    fn check_outputs(&self) -> Option<StaleReason> {
        self.descriptor
            .outputs()
            .iter()
            .find_map(|output| match fs::metadata(self.workdir.join(output)) {
                Err(_) => Some(StaleReason::OutputMissing {
                    output: output.clone(),
                }),
                Ok(m) if m.len() == 0 => Some(StaleReason::OutputEmpty {
                    output: output.clone(),
                }),
                Ok(_) => None,
            })
    }

    // Every input against every output: any newer input invalidates the step.
    fn check_recency(&self) -> Option<StaleReason> {
        let inputs: Vec<_> = self
            .descriptor
            .inputs()
            .iter()
            .map(|i| (&i.name, mtime_or_epoch(&i.path_in(self.workdir))))
            .collect();

        for output in self.descriptor.outputs() {
            let output_modified = mtime_or_epoch(&self.workdir.join(output));

            for (input, input_modified) in &inputs {
                if *input_modified > output_modified {
                    return Some(StaleReason::InputNewerThanOutput {
                        input: (*input).clone(),
                        output: output.clone(),
                        input_modified: (*input_modified).into(),
                        output_modified: output_modified.into(),
                    });
                }
            }
        }

        None
    }

    fn check_sections(&self) -> Result<Option<StaleReason>> {
        for section in self.descriptor.sections() {
            let current = hash_section(&self.config.section(section))?;
            let previous = self.state.get(section);

            if previous != Some(current.as_str()) {
                return Ok(Some(StaleReason::SectionChanged {
                    section: section.clone(),
                    previous: previous.map(String::from),
                    current,
                }));
            }
        }

        Ok(None)
    }
}

/// Hash every dependent section of a descriptor against a config.
///
/// The result is in declaration order.
pub fn section_hashes(
    descriptor: &DependencyDescriptor,
    config: &ConfigTree,
) -> Result<Vec<(String, String)>> {
    descriptor
        .sections()
        .iter()
        .map(|section| Ok((section.clone(), hash_section(&config.section(section))?)))
        .collect()
}
