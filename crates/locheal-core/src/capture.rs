//! Failure-context capture: page snapshot, failed locator and the markup
//! narrowed to the failing element's tag.

use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use scraper::Html;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::artifacts::{ArtifactKind, ArtifactLayout};
use crate::dom::outer_html_of;
use crate::domain::{HealError, Result, RunId};
use crate::extract::ExtractedLocator;
use crate::patterns;
use crate::tokens::count_tokens;

static TAG: OnceLock<Regex> = OnceLock::new();

/// Supplies the current page markup when a failure is handled.
pub trait MarkupSource: Send + Sync {
    fn page_markup(&self) -> Result<String>;
}

impl<F> MarkupSource for F
where
    F: Fn() -> Result<String> + Send + Sync,
{
    fn page_markup(&self) -> Result<String> {
        self()
    }
}

/// Markup captured ahead of time (CLI input, tests).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticMarkup(pub String);

impl StaticMarkup {
    pub fn new(markup: impl Into<String>) -> Self {
        Self(markup.into())
    }
}

impl MarkupSource for StaticMarkup {
    fn page_markup(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Page state at failure time plus the artifacts it was persisted to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSnapshot {
    /// Parser-normalized serialization of the page.
    pub full_markup: String,
    /// Tag derived from the failed locator.
    pub tag: Option<String>,
    /// Outer markup of every element carrying `tag`, one per line.
    pub narrowed: Option<String>,
    pub page_path: PathBuf,
    pub locator_path: PathBuf,
    pub narrowed_path: PathBuf,
}

impl PageSnapshot {
    /// Markup sent to the model: the narrowed view when available.
    pub fn prompt_markup(&self) -> &str {
        self.narrowed.as_deref().unwrap_or(&self.full_markup)
    }
}

/// First element name appearing after `//` in the locator.
pub fn tag_name_of(locator: &str) -> Option<String> {
    let re = match patterns::cached(&TAG, r"//(\w+)") {
        Ok(re) => re,
        Err(e) => {
            warn!(error = %e, "Tag pattern unavailable");
            return None;
        }
    };
    re.captures(locator)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Outer markup of every element named `tag`, in document order, one per line.
pub fn narrow_markup(markup: &str, tag: &str) -> String {
    let html = Html::parse_document(markup);
    narrow_parsed(&html, tag)
}

fn narrow_parsed(html: &Html, tag: &str) -> String {
    outer_html_of(html, tag)
        .into_iter()
        .map(|outer| outer + "\n")
        .collect()
}

fn missing_tag_notice(locator: &str) -> String {
    format!(
        "<!-- no tag name could be derived from locator: {} -->\n",
        locator.replace("--", "- -")
    )
}

/// Snapshot `markup` for `run_id` and persist the page, locator and narrowed
/// artifacts.
pub fn capture_context(
    layout: &ArtifactLayout,
    run_id: &RunId,
    markup: &str,
    locator: &ExtractedLocator,
) -> Result<PageSnapshot> {
    let html = Html::parse_document(markup);
    let full_markup = html.html();
    let locator_text = locator.as_text();

    let page_path = layout
        .write(ArtifactKind::PageSource, run_id, &full_markup)
        .map_err(|e| HealError::Capture(format!("page source: {}", e)))?;
    let locator_path = layout
        .write(ArtifactKind::FailedLocator, run_id, locator_text)
        .map_err(|e| HealError::Capture(format!("failed locator: {}", e)))?;

    let tag = locator.locator().and_then(tag_name_of);
    let narrowed = match &tag {
        Some(tag) => {
            let narrowed = narrow_parsed(&html, tag);
            if narrowed.is_empty() {
                warn!(run_id = %run_id, tag = %tag, "No elements on the page carry the failed tag");
            }
            Some(narrowed)
        }
        None => {
            warn!(run_id = %run_id, locator = %locator_text, "Could not derive a tag name; using full page markup");
            None
        }
    };

    let narrowed_contents = match &narrowed {
        Some(n) => n.clone(),
        None => missing_tag_notice(locator_text),
    };
    let narrowed_path = layout
        .write(ArtifactKind::ProcessedPageSource, run_id, &narrowed_contents)
        .map_err(|e| HealError::Capture(format!("processed page source: {}", e)))?;

    info!(
        run_id = %run_id,
        locator_tokens = count_tokens(locator_text),
        page_tokens = count_tokens(&full_markup),
        narrowed_tokens = narrowed.as_deref().map(count_tokens).unwrap_or(0),
        "Failure context captured"
    );

    Ok(PageSnapshot {
        full_markup,
        tag,
        narrowed,
        page_path,
        locator_path,
        narrowed_path,
    })
}
