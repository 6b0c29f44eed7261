//! Persisted per-workdir run state.
//!
//! This module stores the canonical hash of every dependent section as of
//! the last successful commit, so later runs can tell whether the
//! configuration a step depends on has drifted.

pub mod store;

pub use store::{SectionState, SectionStateStore, STATE_FILE_NAME};
