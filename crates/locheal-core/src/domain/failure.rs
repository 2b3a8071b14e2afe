//! Test failure signals and their classification.

use serde::{Deserialize, Serialize};

/// Coarse failure taxonomy; only `ElementNotFound` enters the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    ElementNotFound,
    Timeout,
    Assertion,
    Other,
}

/// A test failure as reported by the suite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureSignal {
    /// Driver error text; for element lookups it embeds the locator as
    /// `"selector":"<value>"`.
    pub raw_message: String,
    pub category: FailureCategory,
}

impl FailureSignal {
    /// Build a signal whose category is derived from the message.
    pub fn new(raw_message: impl Into<String>) -> Self {
        let raw_message = raw_message.into();
        let category = classify_failure(&raw_message);
        Self {
            raw_message,
            category,
        }
    }

    /// Build a signal with a category supplied by the caller.
    pub fn with_category(raw_message: impl Into<String>, category: FailureCategory) -> Self {
        Self {
            raw_message: raw_message.into(),
            category,
        }
    }

    pub fn is_element_not_found(&self) -> bool {
        self.category == FailureCategory::ElementNotFound
    }
}

const ELEMENT_NOT_FOUND_MARKERS: &[&str] = &[
    "nosuchelementexception",
    "no such element",
    "unable to locate element",
    "element not found",
];

const TIMEOUT_MARKERS: &[&str] = &["timeoutexception", "timed out", "timeout"];

const ASSERTION_MARKERS: &[&str] = &["assertionerror", "assertion failed", "expected"];

/// Classify a driver failure message.
///
/// Element lookups are checked first: a driver timeout that wraps a missing
/// element is still a locator failure.
pub fn classify_failure(message: &str) -> FailureCategory {
    let msg = message.to_lowercase();

    if ELEMENT_NOT_FOUND_MARKERS.iter().any(|m| msg.contains(m)) {
        return FailureCategory::ElementNotFound;
    }
    if TIMEOUT_MARKERS.iter().any(|m| msg.contains(m)) {
        return FailureCategory::Timeout;
    }
    if ASSERTION_MARKERS.iter().any(|m| msg.contains(m)) {
        return FailureCategory::Assertion;
    }
    FailureCategory::Other
}
