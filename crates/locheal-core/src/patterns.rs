//! Lazily compiled built-in regular expressions.

use std::sync::OnceLock;

use regex::Regex;

/// Compile `pattern` on first use and cache it in `cell`.
///
/// Compilation errors are returned rather than cached, so a bad pattern
/// surfaces on every call.
pub(crate) fn cached(
    cell: &'static OnceLock<Regex>,
    pattern: &str,
) -> Result<&'static Regex, regex::Error> {
    if let Some(re) = cell.get() {
        return Ok(re);
    }
    let re = Regex::new(pattern)?;
    Ok(cell.get_or_init(|| re))
}
