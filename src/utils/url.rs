//! URL utilities for consistent URL handling
//!
//! The server address is typed by users in many shapes (`localhost:11434`,
//! `http://127.0.0.1:11434/`, ...). These helpers turn that into a base URL
//! that endpoint paths can be appended to safely.

/// Normalize a base URL by removing trailing slashes
///
/// # Examples
///
/// ```
/// use palaver::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("http://127.0.0.1:11434"), "http://127.0.0.1:11434");
/// assert_eq!(normalize_base_url("http://127.0.0.1:11434/"), "http://127.0.0.1:11434");
/// assert_eq!(normalize_base_url("http://127.0.0.1:11434///"), "http://127.0.0.1:11434");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Prepend `http://` when the address carries no explicit scheme.
///
/// Only `http://` and `https://` are recognised (case-insensitively); anything
/// else is treated as a bare host.
///
/// ```
/// use palaver::utils::url::ensure_scheme;
///
/// assert_eq!(ensure_scheme("localhost:11434"), "http://localhost:11434");
/// assert_eq!(ensure_scheme("https://llm.lan"), "https://llm.lan");
/// ```
pub fn ensure_scheme(address: &str) -> String {
    let trimmed = address.trim();
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}

/// Construct a complete API endpoint URL from a base URL and endpoint path
///
/// # Examples
///
/// ```
/// use palaver::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("http://127.0.0.1:11434", "api/chat"),
///     "http://127.0.0.1:11434/api/chat"
/// );
/// assert_eq!(
///     construct_api_url("http://127.0.0.1:11434/", "/api/tags"),
///     "http://127.0.0.1:11434/api/tags"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", normalized_base, endpoint)
}
