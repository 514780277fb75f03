//! Relative posting-age parsing and the recency cutoff.
//!
//! Ages such as "Posted 3h ago" are converted to fractional days. Anything
//! that cannot be parsed is treated as infinitely old, so once a limit is
//! active an unreadable posting time always fails the check.

use std::sync::LazyLock;

use regex::Regex;

/// Substring shared by every "field not found" placeholder.
const NOT_FOUND_MARKER: &str = "not found";

static AGE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*([mhd])").expect("age pattern is valid"));

/// Convert a relative age string into days.
///
/// Returns `f64::INFINITY` for empty input, placeholders, or text that does
/// not start with an integer followed by `m`, `h` or `d`.
pub fn age_in_days(text: &str) -> f64 {
    if text.is_empty() || text.contains(NOT_FOUND_MARKER) {
        tracing::debug!(text, "No usable posting time, treating as infinitely old");
        return f64::INFINITY;
    }

    let lowered = text.to_lowercase().replace("posted", "");
    let cleaned = lowered.trim();

    let Some(captures) = AGE_PATTERN.captures(cleaned) else {
        tracing::debug!(text, cleaned, "Could not parse posting time");
        return f64::INFINITY;
    };
    let Ok(value) = captures[1].parse::<f64>() else {
        return f64::INFINITY;
    };

    let days = match &captures[2] {
        "m" => value / (24.0 * 60.0),
        "h" => value / 24.0,
        _ => value,
    };
    tracing::debug!(text, days, "Converted posting time");
    days
}

/// Whether a posting is no older than `limit`.
///
/// With no limit every posting passes. Both sides go through
/// [`age_in_days`], so an unparseable limit is infinite and admits every
/// posting.
pub fn is_within_limit(posting_time: &str, limit: Option<&str>) -> bool {
    let Some(limit) = limit else {
        return true;
    };

    let job_days = age_in_days(posting_time);
    let limit_days = age_in_days(limit);
    tracing::debug!(job_days, limit_days, "Comparing posting age with limit");
    job_days <= limit_days
}
