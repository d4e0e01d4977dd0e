use std::fmt;

pub const API_KEY_ENV: &str = "ICHAT_API_KEY";
pub const API_URL_ENV: &str = "ICHAT_API_URL";

/// Fallback credentials used when nothing is stored.
///
/// Library code never reads the environment itself; the binary builds this
/// with [`ConfigDefaults::from_env`] at startup and passes it down.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDefaults {
    pub api_key: Option<String>,
    pub api_url: Option<String>,
}

impl ConfigDefaults {
    pub fn new(api_key: Option<String>, api_url: Option<String>) -> Self {
        Self {
            api_key: non_empty(api_key),
            api_url: non_empty(api_url),
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            std::env::var(API_KEY_ENV).ok(),
            std::env::var(API_URL_ENV).ok(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Stored,
    Default,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Stored => f.write_str("stored"),
            ConfigSource::Default => f.write_str("environment default"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub value: String,
    pub source: ConfigSource,
}

/// The effective configuration after applying the precedence
/// stored value → injected default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub api_key: Option<Resolved>,
    pub api_url: Option<Resolved>,
    pub highlight_style: Option<String>,
}

impl ResolvedConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.api_url.is_some()
    }

    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.api_key, &self.api_url) {
            (Some(key), Some(url)) => Some(Credentials {
                api_key: key.value.clone(),
                api_url: url.value.clone(),
            }),
            _ => None,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub api_url: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("api_url", &self.api_url)
            .finish()
    }
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// First present candidate wins.
pub(crate) fn resolve_first(candidates: &[(Option<String>, ConfigSource)]) -> Option<Resolved> {
    candidates.iter().find_map(|(value, source)| {
        non_empty(value.clone()).map(|value| Resolved {
            value,
            source: *source,
        })
    })
}
