//! Structured step events.
//!
//! The executor reports what it decided and did through a [`StepObserver`]
//! instead of logging directly, so callers can route events anywhere and
//! tests can assert on them.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::staleness::StaleReason;

/// Something that happened while deciding on or running a step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepEvent {
    /// An input failed its existence, size or recency constraint.
    InputRejected { step: String, reason: StaleReason },

    /// A declared output is missing, empty, or older than an input.
    OutputStale { step: String, reason: StaleReason },

    /// A dependent section differs from its recorded hash.
    SectionChanged {
        step: String,
        section: String,
        previous: Option<String>,
        current: String,
    },

    /// Nothing changed; the step was not run.
    Skipped { step: String },

    /// The step's execute body is about to run.
    Executing { step: String, forced: bool },

    /// Outputs validated and section hashes recorded.
    Committed { step: String, sections: Vec<String> },

    /// The run ended without committing.
    Failed { step: String, message: String },
}

impl StepEvent {
    /// Build the event describing a stale verdict.
    pub fn from_reason(step: &str, reason: &StaleReason) -> Self {
        let step = step.to_string();
        match reason {
            StaleReason::SectionChanged {
                section,
                previous,
                current,
            } => StepEvent::SectionChanged {
                step,
                section: section.clone(),
                previous: previous.clone(),
                current: current.clone(),
            },
            r if r.is_input_failure() => StepEvent::InputRejected {
                step,
                reason: r.clone(),
            },
            r => StepEvent::OutputStale {
                step,
                reason: r.clone(),
            },
        }
    }

    /// Name of the step this event belongs to.
    pub fn step(&self) -> &str {
        match self {
            StepEvent::InputRejected { step, .. }
            | StepEvent::OutputStale { step, .. }
            | StepEvent::SectionChanged { step, .. }
            | StepEvent::Skipped { step }
            | StepEvent::Executing { step, .. }
            | StepEvent::Committed { step, .. }
            | StepEvent::Failed { step, .. } => step,
        }
    }
}

impl fmt::Display for StepEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepEvent::InputRejected { step, reason } | StepEvent::OutputStale { step, reason } => {
                write!(f, "{}: {}", step, reason)
            }
            StepEvent::SectionChanged { step, section, .. } => {
                write!(f, "{}: section '{}' changed", step, section)
            }
            StepEvent::Skipped { step } => write!(f, "{}: up to date", step),
            StepEvent::Executing { step, forced } => {
                if *forced {
                    write!(f, "{}: executing (forced)", step)
                } else {
                    write!(f, "{}: executing", step)
                }
            }
            StepEvent::Committed { step, sections } => {
                write!(f, "{}: committed {} section(s)", step, sections.len())
            }
            StepEvent::Failed { step, message } => write!(f, "{}: failed: {}", step, message),
        }
    }
}

/// Receives step events.
pub trait StepObserver {
    /// Called once per event, in order.
    fn on_event(&mut self, event: &StepEvent);
}

/// Observer that forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl StepObserver for TracingObserver {
    fn on_event(&mut self, event: &StepEvent) {
        match event {
            StepEvent::InputRejected { step, reason } => {
                tracing::info!(step = %step, "input rejected: {}", reason)
            }
            StepEvent::OutputStale { step, reason } => {
                tracing::info!(step = %step, "output stale: {}", reason)
            }
            StepEvent::SectionChanged {
                step,
                section,
                previous,
                current,
            } => tracing::info!(
                step = %step,
                section = %section,
                previous = previous.as_deref().unwrap_or("<none>"),
                current = %current,
                "section changed"
            ),
            StepEvent::Skipped { step } => tracing::info!(step = %step, "up to date, skipping"),
            StepEvent::Executing { step, forced } => {
                tracing::info!(step = %step, forced, "executing")
            }
            StepEvent::Committed { step, sections } => {
                tracing::info!(step = %step, sections = ?sections, "committed")
            }
            StepEvent::Failed { step, message } => {
                tracing::warn!(step = %step, "run failed: {}", message)
            }
        }
    }
}

/// Observer that records events for later inspection.
///
/// Clones share the same buffer, so a test can keep one handle and give
/// another to the executor.
#[derive(Debug, Default, Clone)]
pub struct RecordingObserver {
    events: Rc<RefCell<Vec<StepEvent>>>,
}

impl RecordingObserver {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events.
    pub fn events(&self) -> Vec<StepEvent> {
        self.events.borrow().clone()
    }

    /// Drop all recorded events.
    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl StepObserver for RecordingObserver {
    fn on_event(&mut self, event: &StepEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}
