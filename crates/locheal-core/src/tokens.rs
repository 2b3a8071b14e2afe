//! Rough prompt-size accounting.

/// Number of whitespace-separated tokens in `text`.
pub fn count_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}
