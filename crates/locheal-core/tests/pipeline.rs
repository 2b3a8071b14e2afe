//! End-to-end healing runs against scripted model backends.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use locheal_core::{
    AbortReason, ArtifactKind, FailureSignal, Healer, HealingConfig, HealingOutcome, HealError,
    RunState, SkipReason, StaticMarkup, LOCATOR_NOT_FOUND,
};
use locheal_llm::fakes::{ScriptedModel, UnreachableModel};
use tempfile::tempdir;

const PAGE: &str = r#"<html><head><title>Login</title></head><body>
<form><input name="user"><button id="new" type="submit">Go</button></form>
</body></html>"#;

const FAILURE: &str = r#"org.openqa.selenium.NoSuchElementException: no such element: Unable to locate element: {"method":"xpath","selector":"//button[@id='old']"}"#;

const PAGE_OBJECT: &str = r#"public class LoginPage {
    private final By submit = By.xpath("//button[@id='old']");
    private final By submitAgain = By.xpath("//button[@id='old']");
}
"#;

const CANDIDATES: &str = r#"[
  {"locator": "//button[@id='missing']", "score": 0.95, "explanation": "Closest id"},
  {"locator": "//button[@id='new']", "score": 0.9, "explanation": "Submit button with the renamed id"}
]"#;

fn config_in(dir: &Path) -> HealingConfig {
    let mut config = HealingConfig::default();
    config.healing.artifacts_dir = dir.join("Healing_Docs");
    config.patch.root = Some(dir.to_path_buf());
    config
}

fn project(dir: &Path) -> PathBuf {
    let src = dir.join("src");
    std::fs::create_dir_all(&src).expect("mkdir");
    let page_object = src.join("LoginPage.java");
    std::fs::write(&page_object, PAGE_OBJECT).expect("write page object");
    page_object
}

#[tokio::test]
async fn locator_is_healed_patched_and_reported() {
    let dir = tempdir().expect("tempdir");
    let page_object = project(dir.path());
    let model = Arc::new(
        ScriptedModel::new()
            .reply(CANDIDATES)
            .reply("The submit button id changed from old to new."),
    );
    let healer = Healer::new(config_in(dir.path()), model.clone());

    let outcome = healer
        .on_test_failure(&FailureSignal::new(FAILURE), &StaticMarkup::new(PAGE))
        .await;
    let run = outcome.run().expect("completed run");

    assert_eq!(run.state, RunState::Reported);
    assert_eq!(
        run.history,
        vec![
            RunState::Idle,
            RunState::ContextCaptured,
            RunState::Prompted,
            RunState::ModelResponded,
            RunState::Validated,
            RunState::Patched,
            RunState::Reported,
        ]
    );
    assert_eq!(run.failed_locator.as_deref(), Some("//button[@id='old']"));
    assert_eq!(run.replacement.as_deref(), Some("//button[@id='new']"));
    assert_eq!(run.candidates.len(), 2);
    assert!(!run.validations[0].matched);
    assert!(run.validations[1].matched);
    assert!(run.error.is_none());
    assert!(run.finished_at.is_some());

    let patched = std::fs::read_to_string(&page_object).expect("read page object");
    assert!(!patched.contains("@id='old'"));
    assert_eq!(patched.matches("//button[@id='new']").count(), 2);
    assert_eq!(run.patched_files().len(), 1);

    // Candidate prompt carries the failed locator and the narrowed markup.
    let prompts = model.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains("//button[@id='old']"));
    assert!(prompts[0].contains(r#"<button id=\"new\" type=\"submit\">Go</button>"#));
    assert!(!prompts[0].contains("<title>"));
    assert!(prompts[1].starts_with("Summarize the following content"));

    assert_eq!(run.artifacts.count(), 6);
    let report_path = run.report_path.as_ref().expect("report written");
    let report = std::fs::read_to_string(report_path).expect("read report");
    assert!(report.contains("The submit button id changed from old to new."));
    assert!(report.contains("//button[@id=&#x27;new&#x27;]"));
    assert!(report.contains("LoginPage.java"));

    // Artifacts are excluded from patching.
    let locator_artifact = run
        .artifacts
        .get(ArtifactKind::FailedLocator)
        .expect("locator artifact");
    assert_eq!(
        std::fs::read_to_string(locator_artifact).expect("read"),
        "//button[@id='old']"
    );
}

#[tokio::test]
async fn unmatched_candidates_leave_the_project_untouched() {
    let dir = tempdir().expect("tempdir");
    let page_object = project(dir.path());
    let model = Arc::new(ScriptedModel::new().reply(
        r#"[{"locator": "//button[@id='ghost']", "score": 0.8, "explanation": "Guess"}]"#,
    ));
    let healer = Healer::new(config_in(dir.path()), model.clone());

    let outcome = healer
        .on_test_failure(&FailureSignal::new(FAILURE), &StaticMarkup::new(PAGE))
        .await;
    let run = outcome.run().expect("completed run");

    assert_eq!(run.state, RunState::Aborted(AbortReason::NoValidLocator));
    assert!(run.replacement.is_none());
    assert!(run.patches.is_empty());
    assert!(run.report_path.is_none());
    assert_eq!(model.call_count(), 1);
    assert_eq!(
        std::fs::read_to_string(&page_object).expect("read"),
        PAGE_OBJECT
    );

    let layout = healer.layout();
    assert!(!layout
        .path_for(ArtifactKind::HealingReport, &run.run_id)
        .exists());
    let log = layout
        .read(ArtifactKind::ValidatedLocators, &run.run_id)
        .expect("validation log");
    assert_eq!(log, "Locator not found: //button[@id='ghost']\n");
}

#[tokio::test]
async fn disabled_healing_creates_nothing() {
    let dir = tempdir().expect("tempdir");
    let mut config = config_in(dir.path());
    config.healing.enabled = false;
    let model = Arc::new(ScriptedModel::new().reply(CANDIDATES));
    let healer = Healer::new(config, model.clone());

    let outcome = healer
        .on_test_failure(&FailureSignal::new(FAILURE), &StaticMarkup::new(PAGE))
        .await;

    assert_eq!(
        outcome,
        HealingOutcome::Skipped {
            reason: SkipReason::Disabled
        }
    );
    assert_eq!(model.call_count(), 0);
    assert!(!dir.path().join("Healing_Docs").exists());
}

#[tokio::test]
async fn missing_selector_stops_before_the_model() {
    let dir = tempdir().expect("tempdir");
    let model = Arc::new(ScriptedModel::new().reply(CANDIDATES));
    let healer = Healer::new(config_in(dir.path()), model.clone());

    let failure = FailureSignal::new("NoSuchElementException: element not found on page");
    let outcome = healer
        .on_test_failure(&failure, &StaticMarkup::new(PAGE))
        .await;
    let run = outcome.run().expect("completed run");

    assert_eq!(
        run.history,
        vec![
            RunState::Idle,
            RunState::ContextCaptured,
            RunState::Aborted(AbortReason::LocatorNotExtracted),
        ]
    );
    assert_eq!(model.call_count(), 0);
    assert!(run.failed_locator.is_none());
    let persisted = healer
        .layout()
        .read(ArtifactKind::FailedLocator, &run.run_id)
        .expect("sentinel persisted");
    assert_eq!(persisted, LOCATOR_NOT_FOUND);
}

#[tokio::test]
async fn unreachable_model_aborts_with_no_response() {
    let dir = tempdir().expect("tempdir");
    let healer = Healer::new(config_in(dir.path()), Arc::new(UnreachableModel));

    let outcome = healer
        .on_test_failure(&FailureSignal::new(FAILURE), &StaticMarkup::new(PAGE))
        .await;
    let run = outcome.run().expect("completed run");

    assert_eq!(run.state, RunState::Aborted(AbortReason::NoModelResponse));
    assert!(run.error.is_some());
    assert!(run.artifacts.get(ArtifactKind::ModelOutput).is_none());
    assert_eq!(run.artifacts.count(), 3);
}

#[tokio::test]
async fn blank_model_reply_counts_as_no_response() {
    let dir = tempdir().expect("tempdir");
    let healer = Healer::new(
        config_in(dir.path()),
        Arc::new(ScriptedModel::new().reply("  \n ")),
    );

    let outcome = healer
        .on_test_failure(&FailureSignal::new(FAILURE), &StaticMarkup::new(PAGE))
        .await;
    assert_eq!(
        outcome.final_state(),
        Some(RunState::Aborted(AbortReason::NoModelResponse))
    );
}

#[tokio::test]
async fn failed_summary_still_produces_a_report() {
    let dir = tempdir().expect("tempdir");
    project(dir.path());
    // Only the candidate reply is scripted; the summary call fails.
    let healer = Healer::new(
        config_in(dir.path()),
        Arc::new(ScriptedModel::new().reply(CANDIDATES)),
    );

    let outcome = healer
        .on_test_failure(&FailureSignal::new(FAILURE), &StaticMarkup::new(PAGE))
        .await;
    let run = outcome.run().expect("completed run");

    assert_eq!(run.state, RunState::Reported);
    let report =
        std::fs::read_to_string(run.report_path.as_ref().expect("report")).expect("read report");
    assert!(report.contains("AI summary unavailable"));
}

#[tokio::test]
async fn custom_template_with_wrong_slots_fails_the_stage() {
    let dir = tempdir().expect("tempdir");
    let template = dir.path().join("prompt.txt");
    std::fs::write(&template, "Fix %s please").expect("write template");
    let mut config = config_in(dir.path());
    config.healing.prompt_template = Some(template);
    let model = Arc::new(ScriptedModel::new().reply(CANDIDATES));
    let healer = Healer::new(config, model.clone());

    let outcome = healer
        .on_test_failure(&FailureSignal::new(FAILURE), &StaticMarkup::new(PAGE))
        .await;

    assert_eq!(
        outcome.final_state(),
        Some(RunState::Aborted(AbortReason::StageFailed))
    );
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn panics_inside_the_run_are_contained() {
    let dir = tempdir().expect("tempdir");
    let healer = Healer::new(config_in(dir.path()), Arc::new(ScriptedModel::new()));
    let exploding = || -> Result<String, HealError> { panic!("driver crashed") };

    let outcome = healer
        .on_test_failure(&FailureSignal::new(FAILURE), &exploding)
        .await;
    let run = outcome.run().expect("completed run");

    assert_eq!(run.state, RunState::Aborted(AbortReason::StageFailed));
    assert!(run
        .error
        .as_deref()
        .is_some_and(|e| e.contains("driver crashed")));
}

#[tokio::test]
async fn runs_can_be_spawned_as_tasks() {
    let dir = tempdir().expect("tempdir");
    project(dir.path());
    let healer = Arc::new(Healer::new(
        config_in(dir.path()),
        Arc::new(
            ScriptedModel::new()
                .reply(CANDIDATES)
                .reply("summary"),
        ),
    ));

    let task = {
        let healer = healer.clone();
        tokio::spawn(async move {
            let markup = StaticMarkup::new(PAGE);
            healer
                .on_test_failure(&FailureSignal::new(FAILURE), &markup)
                .await
        })
    };
    let outcome = task.await.expect("join");
    assert_eq!(outcome.final_state(), Some(RunState::Reported));
}

#[tokio::test]
async fn second_heal_of_the_same_locator_rewrites_nothing() {
    let dir = tempdir().expect("tempdir");
    let page_object = project(dir.path());
    let model = Arc::new(
        ScriptedModel::new()
            .reply(CANDIDATES)
            .reply("first")
            .reply(CANDIDATES)
            .reply("second"),
    );
    let healer = Healer::new(config_in(dir.path()), model);

    let first = healer
        .on_test_failure(&FailureSignal::new(FAILURE), &StaticMarkup::new(PAGE))
        .await;
    let after_first = std::fs::read_to_string(&page_object).expect("read");
    let second = healer
        .on_test_failure(&FailureSignal::new(FAILURE), &StaticMarkup::new(PAGE))
        .await;

    assert_eq!(first.final_state(), Some(RunState::Reported));
    assert_eq!(second.final_state(), Some(RunState::Reported));
    let second_run = second.run().expect("run");
    assert!(second_run.patched_files().is_empty());
    assert_ne!(first.run().map(|r| &r.run_id), Some(&second_run.run_id));
    assert_eq!(
        std::fs::read_to_string(&page_object).expect("read"),
        after_first
    );
}
