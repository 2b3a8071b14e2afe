//! locheal Core Library
//!
//! Self-healing locators for browser test suites: when a test fails because
//! an element lookup found nothing, capture the page, ask a language model for
//! replacement XPath expressions, keep the first one that matches the page,
//! rewrite the project's source files and leave an HTML report behind.

pub mod artifacts;
pub mod capture;
pub mod config;
pub mod dom;
pub mod domain;
pub mod extract;
pub mod obs;
pub mod parse;
pub mod patch;
mod patterns;
pub mod pipeline;
pub mod prompt;
pub mod report;
pub mod telemetry;
pub mod tokens;
pub mod validate;
pub mod xpath;

pub use domain::{
    classify_failure, first_matched, AbortReason, Candidate, FailureCategory, FailureSignal,
    HealError, HealingOutcome, HealingRun, Result, RunId, RunState, SkipReason,
    ValidationResult,
};

pub use artifacts::{ArtifactKind, ArtifactLayout, ArtifactPaths, DEFAULT_ARTIFACT_DIR};
pub use capture::{
    capture_context, narrow_markup, tag_name_of, MarkupSource, PageSnapshot, StaticMarkup,
};
pub use config::{HealingConfig, HealingSection, PatchSection, ScopeMode};
pub use dom::Dom;
pub use extract::{extract_locator, ExtractedLocator, LOCATOR_NOT_FOUND};
pub use parse::{parse_candidates, render_model_output};
pub use patch::{patch_project, PatchRecord, PatchRequest, PatchScope, PatchSummary};
pub use pipeline::Healer;
pub use prompt::{summary_prompt, PromptTemplate, DEFAULT_TEMPLATE};
pub use report::{build_report_data, render_report, summarize, write_report, ReportData};
pub use validate::{render_validation_log, validate_candidates};
pub use xpath::{XPath, XPathError};

pub use obs::{emit_aborted, emit_completed, emit_skipped, emit_stage, RunSpan};
pub use telemetry::{init_tracing, LogFormat};

/// locheal-core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
