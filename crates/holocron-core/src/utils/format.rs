/// Case-insensitive substring check. An empty needle always matches.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Last non-empty path segment of a resource URL.
/// `https://swapi.dev/api/planets/1/` becomes `1`.
pub fn short_resource_name(url: &str) -> &str {
    url.split('/').rfind(|s| !s.is_empty()).unwrap_or(url)
}

/// The API uses both "unknown" and empty strings for missing values
pub fn display_or_unknown(value: &str) -> &str {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("unknown") || trimmed == "n/a" {
        "Unknown"
    } else {
        trimmed
    }
}

/// Format an RFC3339 timestamp as DD/MM/YYYY. Anything unparseable is
/// shown as "Unknown".
pub fn format_date(date: &str) -> String {
    match chrono::DateTime::parse_from_rfc3339(date) {
        Ok(dt) => dt.format("%d/%m/%Y").to_string(),
        Err(_) => "Unknown".to_string(),
    }
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}
