//! Domain models for locator healing.
//!
//! Canonical definitions for the core entities:
//! - `FailureSignal`: a test failure handed to the pipeline
//! - `Candidate` / `ValidationResult`: model proposals and their verdicts
//! - `HealingRun`: one pass through the pipeline, stage by stage

pub mod candidate;
pub mod error;
pub mod failure;
pub mod run;

pub use candidate::{first_matched, Candidate, ValidationResult};
pub use error::{HealError, Result};
pub use failure::{classify_failure, FailureCategory, FailureSignal};
pub use run::{
    AbortReason, HealingOutcome, HealingRun, RunId, RunState, SkipReason, RUN_TIMESTAMP_FORMAT,
};
