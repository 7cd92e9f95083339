//! Small helpers shared by the config, HTTP and service layers.

/// Longest server message echoed into an error.
const MAX_ECHOED_CHARS: usize = 180;

/// Trim optional text, mapping blank values to `None`.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn is_http_url(value: &str) -> bool {
    ["http://", "https://"]
        .iter()
        .any(|scheme| value.starts_with(scheme))
}

/// Trimmed prefix of a server-provided message, safe to put in an error.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(MAX_ECHOED_CHARS).collect()
}

/// Wall clock in Unix milliseconds, the unit of `updated_at`.
pub fn unix_millis_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
