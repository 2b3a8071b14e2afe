//! Structured observability hooks for the healing run lifecycle.
//!
//! - `RunSpan` enters a run-scoped span so every log line carries `run_id`
//! - `emit_*` functions record stage transitions, skips, aborts and completion

use tracing::{info, warn};

use crate::domain::{AbortReason, RunState, SkipReason};

/// RAII guard that keeps a run-scoped tracing span entered.
///
/// Not `Send`; hold it only across synchronous sections. Async code should
/// instrument its future with [`run_span`] instead.
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    pub fn enter(run_id: &str) -> Self {
        Self {
            _span: run_span(run_id).entered(),
        }
    }
}

/// The span shared by every event of one run.
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("locheal.run", run_id = %run_id)
}

/// Emit event: the run reached `state`.
pub fn emit_stage(run_id: &str, state: &RunState) {
    info!(event = "heal.stage", run_id = %run_id, stage = state.label());
}

/// Emit event: a failure was not healed at all.
pub fn emit_skipped(reason: &SkipReason) {
    info!(event = "heal.skipped", reason = ?reason);
}

/// Emit event: the run stopped early (warn level).
pub fn emit_aborted(run_id: &str, reason: AbortReason, detail: Option<&str>) {
    warn!(
        event = "heal.aborted",
        run_id = %run_id,
        reason = ?reason,
        detail = detail.unwrap_or(""),
    );
}

/// Emit event: a replacement was applied and the run finished.
pub fn emit_completed(run_id: &str, replacement: &str, files_patched: usize, duration_ms: u64) {
    info!(
        event = "heal.completed",
        run_id = %run_id,
        locator = %replacement,
        files_patched = files_patched,
        duration_ms = duration_ms,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn stage_events_carry_run_id_and_label() {
        let _span = RunSpan::enter("run-obs-1");
        emit_stage("run-obs-1", &RunState::Validated);
        assert!(logs_contain("heal.stage"));
        assert!(logs_contain("run-obs-1"));
    }

    #[traced_test]
    #[test]
    fn abort_and_completion_are_logged() {
        emit_aborted("run-obs-2", AbortReason::NoValidLocator, Some("0 of 3 matched"));
        emit_completed("run-obs-3", "//button[@id='new']", 2, 15);
        emit_skipped(&SkipReason::Disabled);
        assert!(logs_contain("heal.aborted"));
        assert!(logs_contain("NoValidLocator"));
        assert!(logs_contain("heal.completed"));
        assert!(logs_contain("heal.skipped"));
    }
}
