//! Candidate validation against the captured page.

use tracing::{debug, info};

use crate::dom::Dom;
use crate::domain::{Candidate, ValidationResult};
use crate::xpath::XPath;

/// Check every candidate against `markup`, preserving candidate order.
///
/// A candidate matches when it parses and selects at least one element.
/// Unparsable or overly nested expressions, and expressions that yield a
/// string, number or boolean, are recorded as not matched.
pub fn validate_candidates(candidates: &[Candidate], markup: &str) -> Vec<ValidationResult> {
    let dom = Dom::parse(markup);
    let results: Vec<ValidationResult> = candidates
        .iter()
        .map(|candidate| ValidationResult {
            candidate: candidate.locator.clone(),
            matched: matches_page(&dom, &candidate.locator),
        })
        .collect();

    info!(
        candidates = results.len(),
        matched = results.iter().filter(|r| r.matched).count(),
        "Candidates validated"
    );
    results
}

fn matches_page(dom: &Dom, locator: &str) -> bool {
    let outcome = XPath::parse(locator).and_then(|xpath| xpath.matches_element(dom));
    match outcome {
        Ok(matched) => {
            debug!(locator = %locator, matched, "Locator evaluated");
            matched
        }
        Err(e) => {
            debug!(locator = %locator, error = %e, "Locator rejected");
            false
        }
    }
}

/// Contents of the validation artifact, one line per candidate.
pub fn render_validation_log(results: &[ValidationResult]) -> String {
    results
        .iter()
        .map(|r| {
            let verdict = if r.matched {
                "Locator found"
            } else {
                "Locator not found"
            };
            format!("{}: {}\n", verdict, r.candidate)
        })
        .collect()
}
