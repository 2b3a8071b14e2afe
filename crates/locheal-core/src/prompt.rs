//! Prompt construction for the candidate request and the report summary.
//!
//! Templates use printf-style slots: each `%s` is replaced in order, `%%`
//! yields a literal percent sign, and any other `%` is kept as is.

use std::path::Path;

use crate::domain::{HealError, Result};

/// Template shipped with the crate.
pub const DEFAULT_TEMPLATE: &str = include_str!("../resources/locator_prompt.txt");

const SLOT_COUNT: usize = 2;

/// A prompt template with exactly two slots: failed locator, then markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    /// Literal text around the slots; always `SLOT_COUNT + 1` entries.
    segments: Vec<String>,
}

impl PromptTemplate {
    pub fn new(text: &str) -> Result<Self> {
        let segments = split_slots(text);
        let slots = segments.len() - 1;
        if slots != SLOT_COUNT {
            return Err(HealError::Template(format!(
                "expected {} '%s' slots, found {}",
                SLOT_COUNT, slots
            )));
        }
        Ok(Self { segments })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            HealError::Template(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::new(&text)
    }

    /// The configured template, or the built-in one when `path` is `None`.
    pub fn from_config(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Self::new(DEFAULT_TEMPLATE),
        }
    }

    /// Fill both slots with request-escaped values.
    pub fn render(&self, failed_locator: &str, markup: &str) -> String {
        let values = [
            escape_for_request(failed_locator),
            escape_for_request(markup),
        ];
        let mut out = String::with_capacity(
            self.segments.iter().map(String::len).sum::<usize>()
                + values.iter().map(String::len).sum::<usize>(),
        );
        for (i, segment) in self.segments.iter().enumerate() {
            out.push_str(segment);
            if let Some(value) = values.get(i) {
                out.push_str(value);
            }
        }
        out
    }
}

fn split_slots(text: &str) -> Vec<String> {
    let mut segments = vec![String::new()];
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        let current = segments.len() - 1;
        if c != '%' {
            segments[current].push(c);
            continue;
        }
        match chars.peek() {
            Some('s') => {
                chars.next();
                segments.push(String::new());
            }
            Some('%') => {
                chars.next();
                segments[current].push('%');
            }
            _ => segments[current].push('%'),
        }
    }
    segments
}

/// Escape backslash, double quote, newline and carriage return so the value
/// can sit inside a JSON string in the request body.
pub fn escape_for_request(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

/// Prompt for the short run summary embedded in the report.
pub fn summary_prompt(failed_locator: &str, page_markup: &str, replacement: &str) -> String {
    format!(
        "Summarize the following content in 3-4 lines:\nFailed Locator: {}\nPage Source: {}\nReplaced Locator: {}",
        failed_locator, page_markup, replacement
    )
}
