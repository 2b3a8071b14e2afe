//! Candidate extraction from raw model output.
//!
//! The response is not parsed as JSON. Three independent patterns pull out
//! every `"locator"`, `"score"` and `"explanation"` value, and the lists are
//! zipped by position. Extraction stops at the shortest list, so a response
//! with a missing field silently loses the trailing candidates.

use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::domain::{Candidate, Result};
use crate::patterns;

static LOCATOR: OnceLock<Regex> = OnceLock::new();
static SCORE: OnceLock<Regex> = OnceLock::new();
static EXPLANATION: OnceLock<Regex> = OnceLock::new();

const LOCATOR_PATTERN: &str = r#""locator":\s*"((?:[^"\\]|\\.)*)""#;
const SCORE_PATTERN: &str = r#""score":\s*([\d.]+)"#;
const EXPLANATION_PATTERN: &str = r#""explanation":\s*"((?:[^"\\]|\\.)*)""#;

/// Extract candidates in response order.
pub fn parse_candidates(response: &str) -> Vec<Candidate> {
    match try_parse(response) {
        Ok(candidates) => candidates,
        Err(e) => {
            warn!(error = %e, "Candidate patterns unavailable");
            Vec::new()
        }
    }
}

fn try_parse(response: &str) -> Result<Vec<Candidate>> {
    let locator_re = patterns::cached(&LOCATOR, LOCATOR_PATTERN)?;
    let score_re = patterns::cached(&SCORE, SCORE_PATTERN)?;
    let explanation_re = patterns::cached(&EXPLANATION, EXPLANATION_PATTERN)?;

    let locators = locator_re.captures_iter(response).map(|c| unescape(&c[1]));
    let scores = score_re
        .captures_iter(response)
        .map(|c| c[1].parse::<f64>().unwrap_or(0.0));
    let explanations = explanation_re
        .captures_iter(response)
        .map(|c| unescape(&c[1]));

    let candidates: Vec<Candidate> = locators
        .zip(scores)
        .zip(explanations)
        .map(|((locator, score), rationale)| Candidate {
            locator,
            score,
            rationale,
        })
        .collect();

    debug!(count = candidates.len(), "Candidates extracted from model response");
    Ok(candidates)
}

/// Undo JSON string escapes; unknown escapes are kept verbatim.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Contents of the model-output artifact: one line per candidate, then the
/// raw response.
pub fn render_model_output(candidates: &[Candidate], raw_response: &str) -> String {
    let mut out = String::new();
    for candidate in candidates {
        out.push_str(&format!(
            "Locator: {}, Score: {}, Explanation: {}\n",
            candidate.locator, candidate.score, candidate.rationale
        ));
    }
    out.push('\n');
    out.push_str(raw_response);
    out
}
