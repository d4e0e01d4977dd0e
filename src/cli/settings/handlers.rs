//! Handlers for the individual configuration keys.

use crate::core::config::{ConfigStore, Resolved, ResolvedConfig};
use crate::utils::url::{mask_secret, normalize_base_url};

use super::error::SettingError;
use super::SettingHandler;

fn single_value(
    args: &[String],
    hint: &'static str,
    example: &'static str,
) -> Result<String, SettingError> {
    let value = args.join(" ");
    let value = value.trim();
    if value.is_empty() {
        return Err(SettingError::MissingArgs { hint, example });
    }
    Ok(value.to_string())
}

fn format_resolved(resolved: Option<&Resolved>, render: impl Fn(&str) -> String) -> String {
    match resolved {
        Some(resolved) => format!("{} ({})", render(&resolved.value), resolved.source),
        None => "(unset)".to_string(),
    }
}

pub struct ApiKeyHandler;

impl SettingHandler for ApiKeyHandler {
    fn key(&self) -> &'static str {
        "api-key"
    }

    fn set(&self, args: &[String], config: &ConfigStore) -> Result<String, SettingError> {
        let value = single_value(
            args,
            "Provide the API key to store.",
            "ichat set api-key sk-...",
        )?;
        if value.chars().any(char::is_whitespace) {
            return Err(SettingError::InvalidValue {
                key: self.key(),
                reason: "API keys cannot contain whitespace".to_string(),
            });
        }
        config.set_api_key(&value)?;
        Ok(format!("✅ Set api-key to: {}", mask_secret(&value)))
    }

    fn unset(&self, config: &ConfigStore) -> Result<String, SettingError> {
        config.remove_api_key()?;
        Ok("✅ Unset api-key".to_string())
    }

    fn format(&self, resolved: &ResolvedConfig) -> String {
        format_resolved(resolved.api_key.as_ref(), mask_secret)
    }
}

pub struct ApiUrlHandler;

impl SettingHandler for ApiUrlHandler {
    fn key(&self) -> &'static str {
        "api-url"
    }

    fn set(&self, args: &[String], config: &ConfigStore) -> Result<String, SettingError> {
        let value = single_value(
            args,
            "Provide the API base URL to store.",
            "ichat set api-url https://api.example.com",
        )?;
        let value = normalize_base_url(&value);
        if !(value.starts_with("http://") || value.starts_with("https://")) {
            return Err(SettingError::InvalidValue {
                key: self.key(),
                reason: "the URL must start with http:// or https://".to_string(),
            });
        }
        config.set_api_url(&value)?;
        Ok(format!("✅ Set api-url to: {value}"))
    }

    fn unset(&self, config: &ConfigStore) -> Result<String, SettingError> {
        config.remove_api_url()?;
        Ok("✅ Unset api-url".to_string())
    }

    fn format(&self, resolved: &ResolvedConfig) -> String {
        format_resolved(resolved.api_url.as_ref(), str::to_string)
    }
}

pub struct HighlightStyleHandler;

impl SettingHandler for HighlightStyleHandler {
    fn key(&self) -> &'static str {
        "highlight-style"
    }

    fn set(&self, args: &[String], config: &ConfigStore) -> Result<String, SettingError> {
        let value = single_value(
            args,
            "Provide the name of a code highlighting style.",
            "ichat set highlight-style github-dark",
        )?;
        config.set_highlight_style(&value)?;
        Ok(format!("✅ Set highlight-style to: {value}"))
    }

    fn unset(&self, config: &ConfigStore) -> Result<String, SettingError> {
        config.remove_highlight_style()?;
        Ok("✅ Unset highlight-style".to_string())
    }

    fn format(&self, resolved: &ResolvedConfig) -> String {
        resolved
            .highlight_style
            .clone()
            .unwrap_or_else(|| "(unset)".to_string())
    }
}
