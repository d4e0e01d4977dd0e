//! Turns failures into user-facing messages and follow-up actions.

use std::error::Error as StdError;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::api::ApiError;

pub const AUTHENTICATION_MESSAGE: &str = "Authentication failed, check your API key";
pub const FORBIDDEN_MESSAGE: &str = "You do not have permission to access this resource";
pub const NOT_FOUND_MESSAGE: &str = "The requested resource does not exist";
pub const RATE_LIMITED_MESSAGE: &str = "Too many requests, please try again later";
pub const SERVER_MESSAGE: &str = "The server encountered an error, please try again later";
pub const UNKNOWN_MESSAGE: &str = "Unknown error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    Forbidden,
    NotFound,
    RateLimited,
    Server,
    Unconfigured,
    Network,
    Cancelled,
    Other,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::Forbidden => "forbidden",
            ErrorCategory::NotFound => "not found",
            ErrorCategory::RateLimited => "rate limited",
            ErrorCategory::Server => "server",
            ErrorCategory::Unconfigured => "unconfigured",
            ErrorCategory::Network => "network",
            ErrorCategory::Cancelled => "cancelled",
            ErrorCategory::Other => "other",
        };
        f.write_str(label)
    }
}

/// The surface that shows errors to the user.
pub trait ErrorHost: Send + Sync {
    fn notify(&self, message: &str);
    /// Send the user to the place where the API key and URL are edited.
    fn open_settings(&self);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandleOptions {
    /// Log only; do not notify the host.
    pub silent: bool,
    /// Open settings when the failure means the credentials need attention.
    pub redirect_on_auth: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandledError {
    pub category: ErrorCategory,
    pub message: String,
    pub redirected: bool,
}

pub struct ErrorHandler {
    host: Arc<dyn ErrorHost>,
}

impl ErrorHandler {
    pub fn new(host: Arc<dyn ErrorHost>) -> Self {
        Self { host }
    }

    pub fn classify(error: &ApiError) -> ErrorCategory {
        match error {
            ApiError::Configuration(_) => ErrorCategory::Unconfigured,
            ApiError::Transport(_) => ErrorCategory::Network,
            ApiError::Cancelled => ErrorCategory::Cancelled,
            ApiError::Protocol { status, .. } => match *status {
                401 => ErrorCategory::Authentication,
                403 => ErrorCategory::Forbidden,
                404 => ErrorCategory::NotFound,
                429 => ErrorCategory::RateLimited,
                status if status >= 500 => ErrorCategory::Server,
                _ => ErrorCategory::Other,
            },
            ApiError::Application { .. } | ApiError::Parse { .. } => ErrorCategory::Other,
        }
    }

    pub fn user_message(error: &(dyn StdError + 'static)) -> String {
        match error.downcast_ref::<ApiError>() {
            Some(api_error) => Self::api_message(api_error),
            None => fallback_message(error.to_string()),
        }
    }

    fn api_message(error: &ApiError) -> String {
        match Self::classify(error) {
            ErrorCategory::Authentication => AUTHENTICATION_MESSAGE.to_string(),
            ErrorCategory::Forbidden => FORBIDDEN_MESSAGE.to_string(),
            ErrorCategory::NotFound => NOT_FOUND_MESSAGE.to_string(),
            ErrorCategory::RateLimited => RATE_LIMITED_MESSAGE.to_string(),
            ErrorCategory::Server => SERVER_MESSAGE.to_string(),
            _ => fallback_message(error.to_string()),
        }
    }

    /// Log `error`, show it through the host unless `silent`, and open
    /// settings for credential problems when asked to.
    pub fn handle(&self, error: &(dyn StdError + 'static), options: HandleOptions) -> HandledError {
        let category = error
            .downcast_ref::<ApiError>()
            .map(Self::classify)
            .unwrap_or(ErrorCategory::Other);
        let message = Self::user_message(error);

        if category == ErrorCategory::Cancelled {
            debug!("{message}");
        } else {
            warn!(%category, "{error}");
        }

        if !options.silent && category != ErrorCategory::Cancelled {
            call_host("notify", || self.host.notify(&message));
        }

        let redirected = options.redirect_on_auth
            && matches!(
                category,
                ErrorCategory::Authentication | ErrorCategory::Unconfigured
            )
            && call_host("open_settings", || self.host.open_settings());

        HandledError {
            category,
            message,
            redirected,
        }
    }
}

fn call_host(action: &str, f: impl FnOnce()) -> bool {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(_) => {
            warn!(action, "Error host panicked");
            false
        }
    }
}

fn fallback_message(message: String) -> String {
    if message.trim().is_empty() {
        UNKNOWN_MESSAGE.to_string()
    } else {
        message
    }
}
