//! Persistent API credentials and UI preferences.

use std::sync::Arc;

use tracing::warn;

use crate::core::storage::{KeyValueStore, StorageError};
use crate::utils::url::normalize_base_url;

pub mod data;

#[cfg(test)]
mod tests;

pub use data::{ConfigDefaults, ConfigSource, Credentials, Resolved, ResolvedConfig};

use data::{non_empty, resolve_first};

pub const API_KEY_KEY: &str = "chat_api_key";
pub const API_URL_KEY: &str = "chat_api_url";
pub const HIGHLIGHT_STYLE_KEY: &str = "chat_highlight_style";

/// Each entry is stored under its own key as a bare string. The API key may
/// live in a separate secret store (the OS keyring) from everything else.
pub struct ConfigStore {
    store: Arc<dyn KeyValueStore>,
    secrets: Arc<dyn KeyValueStore>,
}

impl ConfigStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            secrets: Arc::clone(&store),
            store,
        }
    }

    pub fn with_secret_store(
        store: Arc<dyn KeyValueStore>,
        secrets: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self { store, secrets }
    }

    pub fn api_key(&self) -> Result<Option<String>, StorageError> {
        Ok(non_empty(self.secrets.get(API_KEY_KEY)?))
    }

    pub fn set_api_key(&self, api_key: &str) -> Result<(), StorageError> {
        self.secrets.set(API_KEY_KEY, api_key.trim())
    }

    pub fn remove_api_key(&self) -> Result<(), StorageError> {
        self.secrets.remove(API_KEY_KEY)
    }

    pub fn api_url(&self) -> Result<Option<String>, StorageError> {
        Ok(non_empty(self.store.get(API_URL_KEY)?))
    }

    pub fn set_api_url(&self, api_url: &str) -> Result<(), StorageError> {
        self.store.set(API_URL_KEY, &normalize_base_url(api_url))
    }

    pub fn remove_api_url(&self) -> Result<(), StorageError> {
        self.store.remove(API_URL_KEY)
    }

    pub fn highlight_style(&self) -> Result<Option<String>, StorageError> {
        Ok(non_empty(self.store.get(HIGHLIGHT_STYLE_KEY)?))
    }

    pub fn set_highlight_style(&self, style: &str) -> Result<(), StorageError> {
        self.store.set(HIGHLIGHT_STYLE_KEY, style.trim())
    }

    pub fn remove_highlight_style(&self) -> Result<(), StorageError> {
        self.store.remove(HIGHLIGHT_STYLE_KEY)
    }

    /// Apply the precedence stored value → `defaults` to every entry.
    pub fn resolve(&self, defaults: &ConfigDefaults) -> Result<ResolvedConfig, StorageError> {
        Ok(ResolvedConfig {
            api_key: resolve_first(&[
                (self.stored_api_key_or_fallback()?, ConfigSource::Stored),
                (defaults.api_key.clone(), ConfigSource::Default),
            ]),
            api_url: resolve_first(&[
                (self.api_url()?, ConfigSource::Stored),
                (
                    defaults.api_url.as_deref().map(normalize_base_url),
                    ConfigSource::Default,
                ),
            ]),
            highlight_style: self.highlight_style()?,
        })
    }

    /// A keyring that is locked or unavailable reads as "nothing stored" so
    /// the environment default can still apply; other failures propagate.
    fn stored_api_key_or_fallback(&self) -> Result<Option<String>, StorageError> {
        match self.api_key() {
            Err(StorageError::Keyring(err)) if err.is_recoverable() => {
                warn!("Keyring unavailable ({err}); falling back to environment defaults");
                Ok(None)
            }
            other => other,
        }
    }

    pub fn resolve_credentials(
        &self,
        defaults: &ConfigDefaults,
    ) -> Result<Option<Credentials>, StorageError> {
        Ok(self.resolve(defaults)?.credentials())
    }
}
