use super::*;
use crate::core::keyring::KeyringAccessError;
use crate::core::storage::{FileStore, KeyValueStore, MemoryStore};
use std::sync::Arc;
use tempfile::TempDir;

fn memory_config() -> ConfigStore {
    ConfigStore::new(Arc::new(MemoryStore::new()))
}

#[test]
fn unset_entries_resolve_to_unconfigured() {
    let config = memory_config();
    let resolved = config.resolve(&ConfigDefaults::default()).expect("resolve");

    assert!(!resolved.is_configured());
    assert_eq!(resolved.credentials(), None);
    assert_eq!(resolved.highlight_style, None);
}

#[test]
fn stored_values_take_precedence_over_defaults() {
    let config = memory_config();
    config.set_api_key("stored-key").unwrap();
    let defaults = ConfigDefaults::new(
        Some("default-key".to_string()),
        Some("https://default.example.com/".to_string()),
    );

    let resolved = config.resolve(&defaults).expect("resolve");
    assert_eq!(
        resolved.api_key,
        Some(Resolved {
            value: "stored-key".to_string(),
            source: ConfigSource::Stored,
        })
    );
    assert_eq!(
        resolved.api_url,
        Some(Resolved {
            value: "https://default.example.com".to_string(),
            source: ConfigSource::Default,
        })
    );
    assert!(resolved.is_configured());
}

#[test]
fn empty_values_count_as_unset() {
    let config = memory_config();
    config.set_api_key("   ").unwrap();
    config.set_api_url("https://api.example.com").unwrap();

    let defaults = ConfigDefaults::new(Some(String::new()), None);
    assert_eq!(defaults.api_key, None);

    let resolved = config.resolve(&defaults).expect("resolve");
    assert_eq!(resolved.api_key, None);
    assert!(!resolved.is_configured());
}

#[test]
fn entries_are_independently_removable() {
    let config = memory_config();
    config.set_api_key("k").unwrap();
    config.set_api_url("https://api.example.com///").unwrap();
    config.set_highlight_style("github-dark").unwrap();

    assert_eq!(
        config.api_url().unwrap().as_deref(),
        Some("https://api.example.com")
    );

    config.remove_api_key().unwrap();
    assert_eq!(config.api_key().unwrap(), None);
    assert!(config.api_url().unwrap().is_some());
    assert_eq!(
        config.highlight_style().unwrap().as_deref(),
        Some("github-dark")
    );

    config.remove_highlight_style().unwrap();
    config.remove_api_url().unwrap();
    assert_eq!(
        config.resolve(&ConfigDefaults::default()).unwrap(),
        ResolvedConfig::default()
    );
}

#[test]
fn secrets_can_live_in_a_separate_store() {
    let plain = Arc::new(MemoryStore::new());
    let secrets = Arc::new(MemoryStore::new());
    let config = ConfigStore::with_secret_store(plain.clone(), secrets.clone());

    config.set_api_key("sk-secret").unwrap();
    config.set_api_url("https://api.example.com").unwrap();

    assert_eq!(plain.get(API_KEY_KEY).unwrap(), None);
    assert_eq!(secrets.get(API_KEY_KEY).unwrap().as_deref(), Some("sk-secret"));
    assert_eq!(
        plain.get(API_URL_KEY).unwrap().as_deref(),
        Some("https://api.example.com")
    );
}

#[test]
fn config_survives_reopening_the_file_store() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("storage.toml");

    let config = ConfigStore::new(Arc::new(FileStore::new(path.clone())));
    config.set_api_key("persisted-key").unwrap();
    config.set_api_url("https://persisted.example.com").unwrap();

    let reopened = ConfigStore::new(Arc::new(FileStore::new(path)));
    let credentials = reopened
        .resolve_credentials(&ConfigDefaults::default())
        .unwrap()
        .expect("configured");
    assert_eq!(credentials.api_key, "persisted-key");
    assert_eq!(credentials.api_url, "https://persisted.example.com");
}

#[test]
fn credentials_debug_redacts_the_key() {
    let credentials = Credentials {
        api_key: "sk-very-secret".to_string(),
        api_url: "https://api.example.com".to_string(),
    };
    let rendered = format!("{credentials:?}");
    assert!(!rendered.contains("sk-very-secret"));
    assert!(rendered.contains("https://api.example.com"));
}

/// Secret store whose every read fails with the given keyring error.
struct FailingKeyring(fn() -> keyring::Error);

impl KeyValueStore for FailingKeyring {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(KeyringAccessError::from((self.0)()).into())
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(KeyringAccessError::from((self.0)()).into())
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(KeyringAccessError::from((self.0)()).into())
    }
}

fn env_defaults() -> ConfigDefaults {
    ConfigDefaults::new(
        Some("env-key".to_string()),
        Some("https://api.example.com".to_string()),
    )
}

#[test]
fn locked_keyring_falls_back_to_defaults() {
    let config = ConfigStore::with_secret_store(
        Arc::new(MemoryStore::new()),
        Arc::new(FailingKeyring(|| {
            keyring::Error::PlatformFailure("keychain is locked".into())
        })),
    );

    let credentials = config
        .resolve_credentials(&env_defaults())
        .expect("recoverable keyring failures do not abort resolution")
        .expect("defaults apply");
    assert_eq!(credentials.api_key, "env-key");
    assert_eq!(credentials.api_url, "https://api.example.com");

    let resolved = config.resolve(&env_defaults()).expect("resolve");
    assert_eq!(
        resolved.api_key.map(|key| key.source),
        Some(ConfigSource::Default)
    );
}

#[test]
fn permanent_keyring_failures_still_propagate() {
    let config = ConfigStore::with_secret_store(
        Arc::new(MemoryStore::new()),
        Arc::new(FailingKeyring(|| keyring::Error::BadEncoding(vec![0xff]))),
    );

    let err = config
        .resolve_credentials(&env_defaults())
        .expect_err("permanent failures surface");
    assert!(matches!(err, StorageError::Keyring(ref inner) if !inner.is_recoverable()));
}
