//! Step declaration, staleness evaluation and execution.
//!
//! This module provides the incremental execution engine:
//!
//! - [`DependencyDescriptor`] - What a step reads, writes and depends on
//! - [`StalenessCheck`] - Decide whether a step needs to run, and why
//! - [`StepRunner`] - Drive a [`Step`] through decide, execute, validate, commit
//! - [`CommandStep`] - A step declared in the configuration as a shell command
//! - [`StepObserver`] - Receive [`StepEvent`]s at each decision point
//!
//! # Example
//!
//! ```no_run
//! use statesman::steps::{CommandStep, RunOutcome, StepRunner};
//! use statesman::config::load_config;
//! use std::path::Path;
//!
//! let config_path = Path::new("case/config.yml");
//! let config = load_config(config_path).unwrap();
//! let step = CommandStep::load(&config, "mesh").unwrap();
//!
//! let mut runner = StepRunner::new(step, config_path).unwrap();
//! match runner.run(false).unwrap() {
//!     RunOutcome::Skipped => println!("mesh is up to date"),
//!     RunOutcome::Committed { sections } => {
//!         println!("mesh ran, recorded {} section(s)", sections.len())
//!     }
//! }
//! ```

pub mod command;
pub mod descriptor;
pub mod events;
pub mod executor;
pub mod staleness;

pub use command::{step_definitions, CommandStep, InputConfig, StepConfig, STEPS_KEY};
pub use descriptor::{DependencyDescriptor, FileDependency, InputStatus, Reference};
pub use events::{RecordingObserver, StepEvent, StepObserver, TracingObserver};
pub use executor::{RunOutcome, RunnerOptions, Step, StepContext, StepRunner, StepStatus};
pub use staleness::{section_hashes, StaleReason, Staleness, StalenessCheck};
