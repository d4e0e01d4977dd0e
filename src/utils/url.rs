//! Helpers for turning the configured API origin into endpoint URLs.

/// Strip trailing slashes so endpoint paths can be appended uniformly.
///
/// ```
/// use ichat::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("https://api.example.com/"), "https://api.example.com");
/// assert_eq!(normalize_base_url("https://api.example.com///"), "https://api.example.com");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Join the configured origin and an endpoint path without doubling slashes.
///
/// ```
/// use ichat::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("https://api.example.com/", "/v1/models"),
///     "https://api.example.com/v1/models"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{normalized_base}/{endpoint}")
}

/// Show a secret with everything but its last four characters hidden.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), tail)
}
