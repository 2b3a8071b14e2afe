//! Healing orchestrator.
//!
//! [`Healer::on_test_failure`] drives one run through
//! `Idle → ContextCaptured → Prompted → ModelResponded → Validated → Patched → Reported`.
//! Any stage error, and any panic raised inside the run, ends it in
//! `Aborted(reason)`; the caller always gets a [`HealingOutcome`] back.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use locheal_llm::{build_client, ModelClient};
use tracing::{debug, error, Instrument};

use crate::artifacts::{ArtifactKind, ArtifactLayout};
use crate::capture::{capture_context, MarkupSource};
use crate::config::HealingConfig;
use crate::domain::{
    first_matched, AbortReason, FailureSignal, HealingOutcome, HealingRun, Result, RunId,
    RunState, SkipReason,
};
use crate::extract::extract_locator;
use crate::obs;
use crate::parse::{parse_candidates, render_model_output};
use crate::patch::{patch_project, PatchRequest};
use crate::prompt::PromptTemplate;
use crate::report::{build_report_data, summarize, write_report};
use crate::validate::{render_validation_log, validate_candidates};

/// Why `drive` stopped early.
struct Abort {
    reason: AbortReason,
    detail: String,
}

impl Abort {
    fn new(reason: AbortReason, detail: impl ToString) -> Self {
        Self {
            reason,
            detail: detail.to_string(),
        }
    }
}

type Stage<T> = std::result::Result<T, Abort>;

pub struct Healer {
    config: HealingConfig,
    model: Arc<dyn ModelClient>,
    layout: ArtifactLayout,
}

impl Healer {
    pub fn new(config: HealingConfig, model: Arc<dyn ModelClient>) -> Self {
        let layout = config.artifact_layout();
        Self {
            config,
            model,
            layout,
        }
    }

    /// Build the model backend named by `config.model`.
    pub fn from_config(config: HealingConfig) -> Result<Self> {
        let model = build_client(&config.model)?;
        Ok(Self::new(config, model))
    }

    pub fn config(&self) -> &HealingConfig {
        &self.config
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Handle one failed test. Never fails and never panics.
    pub async fn on_test_failure(
        &self,
        failure: &FailureSignal,
        markup: &dyn MarkupSource,
    ) -> HealingOutcome {
        if let Some(reason) = self.skip_reason(failure) {
            obs::emit_skipped(&reason);
            return HealingOutcome::Skipped { reason };
        }

        let run_id = RunId::generate();
        let span = obs::run_span(run_id.as_str());
        let mut run = HealingRun::new(run_id, failure.clone());
        let started = Instant::now();

        let result = AssertUnwindSafe(self.drive(&mut run, markup))
            .catch_unwind()
            .instrument(span.clone())
            .await;

        let _entered = span.enter();
        match result {
            Ok(Ok(())) => {
                obs::emit_completed(
                    run.run_id.as_str(),
                    run.replacement.as_deref().unwrap_or(""),
                    run.patched_files().len(),
                    started.elapsed().as_millis() as u64,
                );
            }
            Ok(Err(abort)) => {
                obs::emit_aborted(run.run_id.as_str(), abort.reason, Some(&abort.detail));
                run.abort(abort.reason, Some(abort.detail));
            }
            Err(payload) => {
                let detail = format!("panic: {}", panic_message(payload.as_ref()));
                error!(run_id = %run.run_id, stage = run.state.label(), "Healing run panicked");
                obs::emit_aborted(run.run_id.as_str(), AbortReason::StageFailed, Some(&detail));
                run.abort(AbortReason::StageFailed, Some(detail));
            }
        }

        HealingOutcome::Completed { run: Box::new(run) }
    }

    fn skip_reason(&self, failure: &FailureSignal) -> Option<SkipReason> {
        if !self.config.healing.enabled {
            return Some(SkipReason::Disabled);
        }
        if !failure.is_element_not_found() {
            return Some(SkipReason::NotLocatorFailure(failure.category));
        }
        None
    }

    async fn drive(&self, run: &mut HealingRun, markup: &dyn MarkupSource) -> Stage<()> {
        // ── capture ─────────────────────────────────────────────────────
        let page = markup
            .page_markup()
            .map_err(|e| Abort::new(AbortReason::CaptureFailed, e))?;
        let extracted = extract_locator(&run.failure.raw_message);
        let snapshot = capture_context(&self.layout, &run.run_id, &page, &extracted)
            .map_err(|e| Abort::new(AbortReason::CaptureFailed, e))?;
        run.artifacts
            .record(ArtifactKind::PageSource, snapshot.page_path.clone());
        run.artifacts
            .record(ArtifactKind::FailedLocator, snapshot.locator_path.clone());
        run.artifacts.record(
            ArtifactKind::ProcessedPageSource,
            snapshot.narrowed_path.clone(),
        );
        advance(run, RunState::ContextCaptured);

        let failed = extracted
            .locator()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                Abort::new(
                    AbortReason::LocatorNotExtracted,
                    "failure text carries no selector",
                )
            })?;
        run.failed_locator = Some(failed.clone());

        // ── prompt + model ──────────────────────────────────────────────
        let template =
            PromptTemplate::from_config(self.config.healing.prompt_template.as_deref())
                .map_err(|e| Abort::new(AbortReason::StageFailed, e))?;
        let prompt = template.render(&failed, snapshot.prompt_markup());
        advance(run, RunState::Prompted);

        let response = self
            .model
            .complete(&prompt)
            .await
            .map_err(|e| Abort::new(AbortReason::NoModelResponse, e))?;
        if response.trim().is_empty() {
            return Err(Abort::new(
                AbortReason::NoModelResponse,
                "model returned empty text",
            ));
        }
        advance(run, RunState::ModelResponded);

        run.candidates = parse_candidates(&response);
        let output = render_model_output(&run.candidates, &response);
        let output_path = self
            .layout
            .write(ArtifactKind::ModelOutput, &run.run_id, &output)
            .map_err(|e| Abort::new(AbortReason::StageFailed, e))?;
        run.artifacts.record(ArtifactKind::ModelOutput, output_path);

        // ── validate ────────────────────────────────────────────────────
        run.validations = validate_candidates(&run.candidates, &snapshot.full_markup);
        let log_path = self
            .layout
            .write(
                ArtifactKind::ValidatedLocators,
                &run.run_id,
                &render_validation_log(&run.validations),
            )
            .map_err(|e| Abort::new(AbortReason::StageFailed, e))?;
        run.artifacts
            .record(ArtifactKind::ValidatedLocators, log_path);

        let replacement = first_matched(&run.validations)
            .map(str::to_string)
            .ok_or_else(|| {
                Abort::new(
                    AbortReason::NoValidLocator,
                    format!("none of {} candidates matched the page", run.candidates.len()),
                )
            })?;
        run.replacement = Some(replacement.clone());
        advance(run, RunState::Validated);

        // ── patch ───────────────────────────────────────────────────────
        let request = PatchRequest {
            failed: failed.clone(),
            replacement: replacement.clone(),
            root: self.config.patch_root(),
            scope: self.config.patch_scope(),
            exclude: vec![self.layout.root().to_path_buf()],
        };
        let summary =
            patch_project(&request).map_err(|e| Abort::new(AbortReason::StageFailed, e))?;
        run.patches = summary.records;
        advance(run, RunState::Patched);

        // ── report ──────────────────────────────────────────────────────
        run.report_path =
            match build_report_data(&self.layout, &run.run_id, &replacement, run.patched_files()) {
                Ok(mut data) => {
                    data.summary = summarize(
                        self.model.as_ref(),
                        &data.failed_locator,
                        &data.narrowed_markup,
                        &data.replacement,
                    )
                    .await;
                    write_report(&self.layout, &run.run_id, &data)
                }
                Err(e) => {
                    error!(run_id = %run.run_id, error = %e, "Cannot assemble report inputs");
                    None
                }
            };
        if let Some(path) = &run.report_path {
            run.artifacts
                .record(ArtifactKind::HealingReport, path.clone());
        }
        advance(run, RunState::Reported);
        Ok(())
    }
}

fn advance(run: &mut HealingRun, state: RunState) {
    run.advance(state);
    obs::emit_stage(run.run_id.as_str(), &state);
    debug!(run_id = %run.run_id, artifacts = run.artifacts.count(), "Stage complete");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
