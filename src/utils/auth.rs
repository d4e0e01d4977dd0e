//! Authentication headers for API requests.

use reqwest::header::{ACCEPT, AUTHORIZATION};

/// Attach the bearer token and the `Accept` value the endpoint answers with.
pub fn add_auth_headers(
    request: reqwest::RequestBuilder,
    api_key: &str,
    accept: &str,
) -> reqwest::RequestBuilder {
    request
        .header(AUTHORIZATION, format!("Bearer {api_key}"))
        .header(ACCEPT, accept)
}
