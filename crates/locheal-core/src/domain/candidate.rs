//! Replacement candidates proposed by the model and their validation.

use serde::{Deserialize, Serialize};

/// One replacement proposal, kept in response order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub locator: String,
    /// Model-reported confidence. Carried into artifacts, not used for selection.
    pub score: f64,
    pub rationale: String,
}

impl Candidate {
    pub fn new(locator: impl Into<String>, score: f64, rationale: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            score,
            rationale: rationale.into(),
        }
    }
}

/// Outcome of checking one candidate against the captured page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationResult {
    pub candidate: String,
    pub matched: bool,
}

/// The replacement is the first matching candidate in response order.
pub fn first_matched(results: &[ValidationResult]) -> Option<&str> {
    results
        .iter()
        .find(|r| r.matched)
        .map(|r| r.candidate.as_str())
}
