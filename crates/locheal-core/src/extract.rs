//! Locator extraction from driver failure text.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::patterns;

/// Text persisted in place of a locator when none could be extracted.
pub const LOCATOR_NOT_FOUND: &str = "Locator not found in exception message";

static SELECTOR: OnceLock<Regex> = OnceLock::new();

/// Result of scanning a failure description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractedLocator {
    Found(String),
    NotFound,
}

impl ExtractedLocator {
    pub fn locator(&self) -> Option<&str> {
        match self {
            ExtractedLocator::Found(locator) => Some(locator),
            ExtractedLocator::NotFound => None,
        }
    }

    /// The locator, or the sentinel text when none was found.
    pub fn as_text(&self) -> &str {
        self.locator().unwrap_or(LOCATOR_NOT_FOUND)
    }
}

impl fmt::Display for ExtractedLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_text())
    }
}

/// Pull the value of the first `"selector":"<value>"` pair out of `description`.
///
/// The value ends at the next double quote, so selectors containing escaped
/// quotes are truncated there.
pub fn extract_locator(description: &str) -> ExtractedLocator {
    let re = match patterns::cached(&SELECTOR, r#""selector":"(.*?)""#) {
        Ok(re) => re,
        Err(e) => {
            tracing::warn!(error = %e, "Selector pattern unavailable");
            return ExtractedLocator::NotFound;
        }
    };

    re.captures(description)
        .and_then(|caps| caps.get(1))
        .map(|m| ExtractedLocator::Found(m.as_str().to_string()))
        .unwrap_or(ExtractedLocator::NotFound)
}
