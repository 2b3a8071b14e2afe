//! Healing run tracking.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::candidate::{Candidate, ValidationResult};
use super::failure::{FailureCategory, FailureSignal};
use crate::artifacts::ArtifactPaths;
use crate::patch::PatchRecord;

/// Timestamp layout used in run ids and artifact names.
pub const RUN_TIMESTAMP_FORMAT: &str = "%d-%m-%Y_%H-%M-%S";

/// Identifier of one healing run: `<dd-MM-yyyy_HH-mm-ss>_<8 hex chars>`.
///
/// The random suffix keeps ids distinct when two failures land in the same
/// second.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Mint a fresh id from the local clock and a v4 uuid.
    pub fn generate() -> Self {
        let stamp = Local::now().format(RUN_TIMESTAMP_FORMAT);
        let token = Uuid::new_v4().simple().to_string();
        Self(format!("{}_{}", stamp, &token[..8]))
    }

    /// Wrap an existing id (CLI replays, tests).
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a run stopped before producing a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// Markup could not be obtained or artifacts could not be written.
    CaptureFailed,
    /// The failure text carried no recognizable locator.
    LocatorNotExtracted,
    /// The model call failed or returned nothing.
    NoModelResponse,
    /// None of the candidates matched the captured page.
    NoValidLocator,
    /// Any other stage error, including a panic inside the run.
    StageFailed,
}

/// Pipeline position of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    ContextCaptured,
    Prompted,
    ModelResponded,
    Validated,
    Patched,
    Reported,
    Aborted(AbortReason),
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Reported | RunState::Aborted(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::ContextCaptured => "context_captured",
            RunState::Prompted => "prompted",
            RunState::ModelResponded => "model_responded",
            RunState::Validated => "validated",
            RunState::Patched => "patched",
            RunState::Reported => "reported",
            RunState::Aborted(_) => "aborted",
        }
    }
}

/// Why a failure did not enter the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    NotLocatorFailure(FailureCategory),
}

/// Aggregate record of one healing run, filled in stage by stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealingRun {
    pub run_id: RunId,
    pub failure: FailureSignal,
    /// Extracted locator, or `None` when the failure text carried none.
    pub failed_locator: Option<String>,
    pub artifacts: ArtifactPaths,
    pub candidates: Vec<Candidate>,
    pub validations: Vec<ValidationResult>,
    pub replacement: Option<String>,
    pub patches: Vec<PatchRecord>,
    pub report_path: Option<PathBuf>,
    /// Every state entered, in order, starting with `Idle`.
    pub history: Vec<RunState>,
    pub state: RunState,
    /// Error text of the stage that aborted the run.
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl HealingRun {
    pub fn new(run_id: RunId, failure: FailureSignal) -> Self {
        Self {
            run_id,
            failure,
            failed_locator: None,
            artifacts: ArtifactPaths::default(),
            candidates: Vec::new(),
            validations: Vec::new(),
            replacement: None,
            patches: Vec::new(),
            report_path: None,
            history: vec![RunState::Idle],
            state: RunState::Idle,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Move to `state`, recording it in the history.
    pub fn advance(&mut self, state: RunState) {
        self.state = state;
        self.history.push(state);
        if state.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
    }

    pub fn abort(&mut self, reason: AbortReason, error: Option<String>) {
        self.error = error;
        self.advance(RunState::Aborted(reason));
    }

    pub fn abort_reason(&self) -> Option<AbortReason> {
        match self.state {
            RunState::Aborted(reason) => Some(reason),
            _ => None,
        }
    }

    /// Files actually rewritten by the patcher.
    pub fn patched_files(&self) -> Vec<PathBuf> {
        self.patches
            .iter()
            .filter(|p| p.replaced)
            .map(|p| p.path.clone())
            .collect()
    }
}

/// What `on_test_failure` returns; never an error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum HealingOutcome {
    Skipped { reason: SkipReason },
    Completed { run: Box<HealingRun> },
}

impl HealingOutcome {
    pub fn run(&self) -> Option<&HealingRun> {
        match self {
            HealingOutcome::Completed { run } => Some(run),
            HealingOutcome::Skipped { .. } => None,
        }
    }

    pub fn final_state(&self) -> Option<RunState> {
        self.run().map(|r| r.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_run_ids_are_unique_and_shaped() {
        let a = RunId::generate();
        let b = RunId::generate();
        assert_ne!(a, b);

        // dd-MM-yyyy_HH-mm-ss_xxxxxxxx
        let parts: Vec<&str> = a.as_str().split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 10);
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn advance_records_history_and_finishes_on_terminal() {
        let mut run = HealingRun::new(
            RunId::from_string("run-1"),
            FailureSignal::new("no such element"),
        );
        run.advance(RunState::ContextCaptured);
        assert!(run.finished_at.is_none());

        run.abort(AbortReason::NoModelResponse, Some("timeout".to_string()));
        assert_eq!(
            run.history,
            vec![
                RunState::Idle,
                RunState::ContextCaptured,
                RunState::Aborted(AbortReason::NoModelResponse)
            ]
        );
        assert_eq!(run.abort_reason(), Some(AbortReason::NoModelResponse));
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let outcome = HealingOutcome::Skipped {
            reason: SkipReason::Disabled,
        };
        let json = serde_json::to_value(&outcome).expect("serialize");
        assert_eq!(json["outcome"], "skipped");
        assert_eq!(json["reason"], "disabled");
    }
}
