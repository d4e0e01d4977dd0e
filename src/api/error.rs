use std::error::Error as StdError;
use std::fmt;

use serde_json::Value;

pub const UNCONFIGURED_MESSAGE: &str =
    "API configuration is incomplete. Set the API key and API URL in settings first.";

/// Failures surfaced by [`crate::api::ChatApiClient`].
///
/// The enum is `Clone` so a throttled call can hand the same outcome to
/// every caller that shares its window.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// API key or URL missing; raised before any request is sent.
    Configuration(String),
    /// The request never produced an HTTP status (DNS, connect, reset).
    Transport(String),
    /// Non-2xx HTTP response.
    Protocol {
        status: u16,
        message: String,
        /// Body parsed as JSON when possible, otherwise the raw text.
        data: Option<Value>,
    },
    /// HTTP 200 whose application envelope reports a failure.
    Application { code: Option<i64>, message: String },
    /// A response body that could not be decoded.
    Parse { message: String, payload: String },
    /// The caller aborted the operation.
    Cancelled,
}

impl ApiError {
    pub fn unconfigured() -> Self {
        ApiError::Configuration(UNCONFIGURED_MESSAGE.to_string())
    }

    pub(crate) fn transport(err: &reqwest::Error) -> Self {
        ApiError::Transport(err.to_string())
    }

    /// Build a protocol error from a failed response body.
    pub(crate) fn protocol(status: u16, body: &str) -> Self {
        let data = match serde_json::from_str::<Value>(body) {
            Ok(value) => Some(value),
            Err(_) if body.trim().is_empty() => None,
            Err(_) => Some(Value::String(body.to_string())),
        };
        let summary = data
            .as_ref()
            .and_then(extract_error_summary)
            .filter(|summary| !summary.is_empty())
            .unwrap_or_else(|| collapse_whitespace(body));
        let message = if summary.is_empty() {
            format!("Request failed ({status})")
        } else {
            format!("Request failed ({status}): {summary}")
        };
        ApiError::Protocol {
            status,
            message,
            data,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Protocol { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            ApiError::Protocol { data, .. } => data.as_ref(),
            _ => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::Configuration(message) | ApiError::Transport(message) => message,
            ApiError::Protocol { message, .. }
            | ApiError::Application { message, .. }
            | ApiError::Parse { message, .. } => message,
            ApiError::Cancelled => "Request cancelled",
        }
    }

    /// Server errors and rate limiting are worth another attempt; anything
    /// without a status is not.
    pub fn should_retry(&self) -> bool {
        matches!(self.status(), Some(status) if status >= 500 || status == 429)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Transport(message) => write!(f, "Network request failed: {message}"),
            ApiError::Parse { message, .. } => write!(f, "Invalid response: {message}"),
            other => f.write_str(other.message()),
        }
    }
}

impl StdError for ApiError {}

/// Pull a one-line summary out of the error shapes providers commonly use:
/// `{"error":{"message":..}}`, `{"error":".."}` and `{"message":".."}`.
pub fn extract_error_summary(value: &Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value
                .get("error")
                .and_then(|v| v.as_str().map(str::to_owned))
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        })
        .or_else(|| value.as_str().map(str::to_owned));

    summary.map(|text| collapse_whitespace(&text))
}

/// Render an error body for display: the summary line followed by the
/// pretty-printed JSON, or the trimmed text when it is not JSON.
pub fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();
    if trimmed.is_empty() {
        return "API Error: <empty>".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<Value>(trimmed) {
        if let Ok(pretty_json) = serde_json::to_string_pretty(&json_value) {
            return match extract_error_summary(&json_value).filter(|s| !s.is_empty()) {
                Some(summary) => format!("API Error: {summary}\n{pretty_json}"),
                None => format!("API Error:\n{pretty_json}"),
            };
        }
    }
    format!("API Error:\n{trimmed}")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn should_retry_only_on_server_errors_and_rate_limits() {
        for status in [500, 502, 503, 429] {
            assert!(ApiError::protocol(status, "").should_retry(), "{status}");
        }
        for status in [400, 401, 403, 404] {
            assert!(!ApiError::protocol(status, "").should_retry(), "{status}");
        }
        assert!(!ApiError::Transport("connection refused".into()).should_retry());
        assert!(!ApiError::unconfigured().should_retry());
        assert!(!ApiError::Cancelled.should_retry());
    }

    #[test]
    fn protocol_error_keeps_parsed_body_and_summary() {
        let err = ApiError::protocol(
            401,
            r#"{"error":{"message":"invalid   api key","type":"auth"}}"#,
        );
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.message(), "Request failed (401): invalid api key");
        assert_eq!(
            err.data(),
            Some(&json!({"error": {"message": "invalid   api key", "type": "auth"}}))
        );
    }

    #[test]
    fn protocol_error_falls_back_to_raw_text() {
        let err = ApiError::protocol(502, "<html>bad gateway</html>");
        assert_eq!(err.message(), "Request failed (502): <html>bad gateway</html>");
        assert_eq!(
            err.data(),
            Some(&Value::String("<html>bad gateway</html>".into()))
        );

        let empty = ApiError::protocol(500, "  ");
        assert_eq!(empty.message(), "Request failed (500)");
        assert_eq!(empty.data(), None);
    }

    #[test]
    fn format_api_error_leads_with_the_summary() {
        let formatted = format_api_error(r#"{"error":{"message":"Invalid key"}}"#);
        assert!(formatted.starts_with("API Error: Invalid key\n{"));
        assert!(formatted.contains("\"message\": \"Invalid key\""));

        assert_eq!(format_api_error("  Service Unavailable \n"), "API Error:\nService Unavailable");
        assert_eq!(format_api_error(""), "API Error: <empty>");
    }

    #[test]
    fn extract_error_summary_handles_common_shapes() {
        assert_eq!(
            extract_error_summary(&json!({"error": "quota exceeded"})).as_deref(),
            Some("quota exceeded")
        );
        assert_eq!(
            extract_error_summary(&json!({"message": "model\nnot found"})).as_deref(),
            Some("model not found")
        );
        assert_eq!(extract_error_summary(&json!({"status": "failed"})), None);
    }
}
