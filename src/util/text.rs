use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

/// Placeholder stored for optional form fields left blank.
pub const NOT_AVAILABLE: &str = "N/A";

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email regex is valid")
});

/// Render the distance between `posted_at` and `now` as a short English phrase.
///
/// Months are counted as 30 days. Timestamps in the future read as "Just now".
pub fn time_ago(posted_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - posted_at).num_seconds();

    let (count, unit) = match seconds {
        s if s < 60 => return "Just now".to_string(),
        s if s < 3_600 => (s / 60, "minute"),
        s if s < 86_400 => (s / 3_600, "hour"),
        s if s < 604_800 => (s / 86_400, "day"),
        s if s < 2_592_000 => (s / 604_800, "week"),
        s => (s / 2_592_000, "month"),
    };

    let plural = if count > 1 { "s" } else { "" };
    format!("{count} {unit}{plural} ago")
}

/// Escape angle brackets so stored text cannot inject markup.
pub fn sanitize_input(text: &str) -> String {
    text.replace('<', "&lt;").replace('>', "&gt;")
}

/// Replace a blank value with `default`.
pub fn default_if_blank(value: &str, default: &str) -> String {
    if value.trim().is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

/// Sanitize and trim a form value, falling back to `N/A` when blank.
pub fn clean_field(value: &str) -> String {
    default_if_blank(&sanitize_input(value.trim()), NOT_AVAILABLE)
}

pub fn validate_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Split a comma separated list, dropping empty entries.
pub fn split_requirements(raw: &str) -> Vec<String> {
    if raw.trim() == NOT_AVAILABLE {
        return Vec::new();
    }

    raw.split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(String::from)
        .collect()
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// `true` for values an admin form left empty.
pub fn is_blank_or_na(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed == NOT_AVAILABLE
}
