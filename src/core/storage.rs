//! Durable string key-value storage backing the config and session stores.
//!
//! [`FileStore`] keeps every entry in one TOML file under the platform data
//! directory and rewrites it atomically on each change. [`MemoryStore`] is
//! the ephemeral variant used by tests and `--no-persist` runs.

use std::collections::{BTreeMap, HashMap};
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::core::keyring::KeyringAccessError;

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug)]
pub enum StorageError {
    /// No home directory to derive the data directory from.
    NoDataDir,
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    Serialize(String),
    Keyring(KeyringAccessError),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NoDataDir => write!(f, "Failed to determine the data directory"),
            StorageError::Read { path, source } => {
                write!(f, "Failed to read {}: {}", path_display(path), source)
            }
            StorageError::Parse { path, source } => {
                write!(f, "Failed to parse {}: {}", path_display(path), source)
            }
            StorageError::Write { path, source } => {
                write!(f, "Failed to write {}: {}", path_display(path), source)
            }
            StorageError::Serialize(message) => write!(f, "Failed to serialize data: {message}"),
            StorageError::Keyring(err) => write!(f, "Keyring access failed: {err}"),
        }
    }
}

impl StdError for StorageError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            StorageError::Read { source, .. } | StorageError::Write { source, .. } => Some(source),
            StorageError::Parse { source, .. } => Some(source),
            StorageError::Keyring(err) => Some(err),
            StorageError::NoDataDir | StorageError::Serialize(_) => None,
        }
    }
}

impl From<KeyringAccessError> for StorageError {
    fn from(err: KeyringAccessError) -> Self {
        StorageError::Keyring(err)
    }
}

/// Render a path with `~` in place of the home directory on Unix.
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            if let Ok(relative) = path.strip_prefix(PathBuf::from(home)) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StorageFile {
    #[serde(default)]
    entries: BTreeMap<String, String>,
}

#[derive(Default)]
struct CacheState {
    entries: Option<BTreeMap<String, String>>,
    modified: Option<SystemTime>,
}

/// TOML-file store with an in-memory cache that is revalidated against the
/// file's modification time, so edits made by another process are seen.
pub struct FileStore {
    path: PathBuf,
    state: Mutex<CacheState>,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// `storage.toml` inside the platform data directory.
    pub fn default_path() -> Result<PathBuf, StorageError> {
        let proj_dirs = ProjectDirs::from("org", "ichat", "ichat").ok_or(StorageError::NoDataDir)?;
        Ok(proj_dirs.data_dir().join("storage.toml"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_path(path: &Path) -> Result<BTreeMap<String, String>, StorageError> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = fs::read_to_string(path).map_err(|source| StorageError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: StorageFile = toml::from_str(&contents).map_err(|source| StorageError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(file.entries)
    }

    fn save_to_path(path: &Path, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let write_err = |source: std::io::Error| StorageError::Write {
            path: path.to_path_buf(),
            source,
        };
        let parent = path.parent().filter(|dir| !dir.as_os_str().is_empty());
        if let Some(dir) = parent {
            fs::create_dir_all(dir).map_err(write_err)?;
        }

        let file = StorageFile {
            entries: entries.clone(),
        };
        let contents =
            toml::to_string_pretty(&file).map_err(|err| StorageError::Serialize(err.to_string()))?;
        let mut temp_file = match parent {
            Some(dir) => NamedTempFile::new_in(dir),
            None => NamedTempFile::new(),
        }
        .map_err(write_err)?;

        temp_file.write_all(contents.as_bytes()).map_err(write_err)?;
        temp_file.as_file_mut().sync_all().map_err(write_err)?;
        temp_file
            .persist(path)
            .map_err(|err| write_err(err.error))?;
        debug!(path = %path_display(path), entries = entries.len(), "Persisted storage file");
        Ok(())
    }

    fn modified_time(path: &Path) -> Option<SystemTime> {
        fs::metadata(path).ok()?.modified().ok()
    }

    fn with_fresh_entries<R>(
        &self,
        f: impl FnOnce(&mut CacheState) -> Result<R, StorageError>,
    ) -> Result<R, StorageError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let disk_modified = Self::modified_time(&self.path);
        if state.entries.is_none() || state.modified != disk_modified {
            state.entries = Some(Self::load_from_path(&self.path)?);
            state.modified = disk_modified;
        }
        f(&mut state)
    }

    fn mutate(
        &self,
        mutator: impl FnOnce(&mut BTreeMap<String, String>),
    ) -> Result<(), StorageError> {
        self.with_fresh_entries(|state| {
            let mut working = state.entries.clone().unwrap_or_default();
            mutator(&mut working);
            Self::save_to_path(&self.path, &working)?;
            state.modified = Self::modified_time(&self.path);
            state.entries = Some(working);
            Ok(())
        })
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.with_fresh_entries(|state| {
            Ok(state
                .entries
                .as_ref()
                .and_then(|entries| entries.get(key).cloned()))
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.mutate(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.mutate(|entries| {
            entries.remove(key);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn missing_file_reads_as_empty() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = FileStore::new(temp_dir.path().join("nonexistent.toml"));

        assert_eq!(store.get("chat_api_key").expect("get failed"), None);
        assert!(!store.path().exists());
    }

    #[test]
    fn file_store_persistence_lifecycle() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("nested").join("storage.toml");

        let store = FileStore::new(path.clone());
        store.set("chat_api_url", "https://api.example.com").expect("set failed");
        store
            .set("chat_sessions", r#"{"1":{"name":"a \"quoted\" name"}}"#)
            .expect("set failed");

        let reopened = FileStore::new(path.clone());
        assert_eq!(
            reopened.get("chat_api_url").expect("get failed").as_deref(),
            Some("https://api.example.com")
        );
        assert_eq!(
            reopened.get("chat_sessions").expect("get failed").as_deref(),
            Some(r#"{"1":{"name":"a \"quoted\" name"}}"#)
        );

        reopened.remove("chat_api_url").expect("remove failed");
        let again = FileStore::new(path);
        assert_eq!(again.get("chat_api_url").expect("get failed"), None);
        assert!(again.get("chat_sessions").expect("get failed").is_some());
    }

    #[test]
    fn file_store_detects_external_updates() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("storage.toml");
        let store = FileStore::new(path.clone());

        store.set("chat_highlight_style", "github").expect("set failed");
        assert_eq!(
            store.get("chat_highlight_style").expect("get failed").as_deref(),
            Some("github")
        );

        std::thread::sleep(Duration::from_millis(1100));

        let external = FileStore::new(path);
        external.set("chat_highlight_style", "monokai").expect("external set failed");

        assert_eq!(
            store.get("chat_highlight_style").expect("reload failed").as_deref(),
            Some("monokai")
        );
    }

    #[test]
    fn parse_errors_name_the_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("storage.toml");
        fs::write(&path, "entries = [not toml").expect("write failed");

        let err = FileStore::new(path).get("anything").expect_err("should fail");
        assert!(matches!(err, StorageError::Parse { .. }));
        assert!(err.to_string().starts_with("Failed to parse "));
    }

    #[test]
    fn memory_store_round_trips_values() {
        let store = MemoryStore::new();
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }
}
