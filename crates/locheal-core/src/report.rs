//! Healing report: a self-contained HTML record of one run.

use std::path::PathBuf;

use locheal_llm::ModelClient;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::artifacts::{ArtifactKind, ArtifactLayout};
use crate::domain::{Result, RunId};
use crate::prompt::summary_prompt;

/// Text used when the summary call fails.
pub const SUMMARY_UNAVAILABLE: &str = "AI summary unavailable";

/// Everything the report shows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportData {
    pub run_id: String,
    pub failed_locator: String,
    pub replacement: String,
    pub summary: String,
    pub page_markup: String,
    pub narrowed_markup: String,
    pub model_output: String,
    pub validation_log: String,
    pub patched_files: Vec<PathBuf>,
}

/// Collect report inputs from the artifacts already written for `run_id`.
/// The summary is left empty; see [`summarize`].
pub fn build_report_data(
    layout: &ArtifactLayout,
    run_id: &RunId,
    replacement: &str,
    patched_files: Vec<PathBuf>,
) -> Result<ReportData> {
    Ok(ReportData {
        run_id: run_id.to_string(),
        failed_locator: layout.read(ArtifactKind::FailedLocator, run_id)?,
        replacement: replacement.to_string(),
        summary: String::new(),
        page_markup: layout.read(ArtifactKind::PageSource, run_id)?,
        narrowed_markup: layout.read(ArtifactKind::ProcessedPageSource, run_id)?,
        model_output: layout.read(ArtifactKind::ModelOutput, run_id)?,
        validation_log: layout.read(ArtifactKind::ValidatedLocators, run_id)?,
        patched_files,
    })
}

/// Ask the model for a short run summary; never fails.
///
/// A failed call or a blank reply yields [`SUMMARY_UNAVAILABLE`].
pub async fn summarize(
    model: &dyn ModelClient,
    failed_locator: &str,
    page_markup: &str,
    replacement: &str,
) -> String {
    let prompt = summary_prompt(failed_locator, page_markup, replacement);
    match model.complete(&prompt).await {
        Ok(text) if text.trim().is_empty() => {
            warn!(provider = %model.provider(), "Summary reply was blank");
            SUMMARY_UNAVAILABLE.to_string()
        }
        Ok(text) => text.trim().to_string(),
        Err(e) => {
            warn!(provider = %model.provider(), error = %e, "Summary request failed");
            SUMMARY_UNAVAILABLE.to_string()
        }
    }
}

const STYLE: &str = "body { font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; margin: 20px; background: #f0f0f0; }
h1 { color: #333; text-align: center; }
pre { background: #f4f4f4; padding: 10px; border: 1px solid #ddd; border-radius: 5px; white-space: pre-wrap; word-wrap: break-word; }
.summary { background: linear-gradient(135deg, #e0f7fa, #80deea); padding: 20px; border-radius: 10px; margin-bottom: 20px; }
.summary h2 { color: #00796b; }
details { margin-bottom: 12px; background: white; border-radius: 5px; }
summary { cursor: pointer; padding: 12px; font-size: 18px; background: #007bff; color: white; border-radius: 5px; }
details > div { padding: 12px; }";

/// Render the report document. Every embedded value is HTML-escaped.
pub fn render_report(data: &ReportData) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str(&format!(
        "<title>Healing Report {}</title>\n",
        html_escape(&data.run_id)
    ));
    out.push_str(&format!("<style>\n{}\n</style>\n", STYLE));
    out.push_str("</head>\n<body>\n<h1>Healing Report</h1>\n");

    out.push_str("<div class=\"summary\">\n<h2>Summary</h2>\n");
    out.push_str(&format!(
        "<p><strong>Run:</strong> <code>{}</code></p>\n",
        html_escape(&data.run_id)
    ));
    out.push_str(&format!(
        "<p><strong>Failed Locator:</strong> <code>{}</code></p>\n",
        html_escape(&data.failed_locator)
    ));
    out.push_str(&format!(
        "<p><strong>Replaced Locator:</strong> <code>{}</code></p>\n",
        html_escape(&data.replacement)
    ));
    out.push_str(&format!(
        "<p><strong>AI Summary:</strong> {}</p>\n",
        html_escape(&data.summary)
    ));
    out.push_str("</div>\n");

    let patched = if data.patched_files.is_empty() {
        "No files contained the failed locator.".to_string()
    } else {
        data.patched_files
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    };

    let sections = [
        ("failed-locator", "Failed Locator", data.failed_locator.as_str()),
        ("processed-html", "Processed HTML", data.narrowed_markup.as_str()),
        ("llm-output", "LLM Output", data.model_output.as_str()),
        (
            "validated-locators",
            "Validated Locators",
            data.validation_log.as_str(),
        ),
        ("patched-files", "Patched Files", patched.as_str()),
        ("page-source", "Page Source", data.page_markup.as_str()),
    ];
    for (id, title, body) in sections {
        out.push_str(&format!(
            "<details id=\"{}\">\n<summary>{}</summary>\n<div><pre>{}</pre></div>\n</details>\n",
            id,
            title,
            html_escape(body)
        ));
    }

    out.push_str("</body>\n</html>\n");
    out
}

/// Persist the report; failures are logged and yield `None`.
pub fn write_report(layout: &ArtifactLayout, run_id: &RunId, data: &ReportData) -> Option<PathBuf> {
    match layout.write(ArtifactKind::HealingReport, run_id, &render_report(data)) {
        Ok(path) => {
            info!(run_id = %run_id, path = %path.display(), "Healing report generated");
            Some(path)
        }
        Err(e) => {
            error!(run_id = %run_id, error = %e, "Failed to write healing report");
            None
        }
    }
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
