//! Persisted user preferences behind a narrow key-value interface.
//!
//! Things like "this popup was dismissed" or a theme override are stored
//! through a [`PreferenceStore`] handed to whoever needs it, instead of being
//! read from ambient global state.
//!
//! # Examples
//!
//! ```rust
//! use serde_json::json;
//! use storefront_core::preferences::{MemoryPreferences, PreferenceStore};
//!
//! let prefs = MemoryPreferences::new();
//! prefs.set("theme", json!("dark")).unwrap();
//! assert_eq!(prefs.get("theme"), Some(json!("dark")));
//!
//! prefs.clear("theme").unwrap();
//! assert_eq!(prefs.get("theme"), None);
//! ```

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;

/// Errors from a preference store.
#[derive(Debug)]
pub enum PreferenceError {
    /// Reading or writing the backing file failed.
    Io(std::io::Error),
    /// The backing file held something other than a JSON object.
    Serialize(serde_json::Error),
}

impl std::fmt::Display for PreferenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "preference file error: {}", e),
            Self::Serialize(e) => write!(f, "preference encoding error: {}", e),
        }
    }
}

impl std::error::Error for PreferenceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Serialize(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for PreferenceError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for PreferenceError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialize(e)
    }
}

/// A persisted key-value store for user preferences.
pub trait PreferenceStore {
    /// The value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<Value>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: Value) -> Result<(), PreferenceError>;

    /// Remove `key`. Removing an absent key is not an error.
    fn clear(&self, key: &str) -> Result<(), PreferenceError>;
}

type Entries = BTreeMap<String, Value>;

fn lock(entries: &Mutex<Entries>) -> MutexGuard<'_, Entries> {
    entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Preferences held in memory for the lifetime of the value.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    entries: Mutex<Entries>,
}

impl MemoryPreferences {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Option<Value> {
        lock(&self.entries).get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<(), PreferenceError> {
        lock(&self.entries).insert(key.to_string(), value);
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), PreferenceError> {
        lock(&self.entries).remove(key);
        Ok(())
    }
}

/// Preferences persisted as one JSON object in a file.
///
/// The file is read once on open and rewritten after every change. A missing
/// file opens as an empty store.
#[derive(Debug)]
pub struct JsonFilePreferences {
    path: PathBuf,
    entries: Mutex<Entries>,
}

impl JsonFilePreferences {
    /// Open the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PreferenceError> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => Entries::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Entries::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), entries = entries.len(), "opened preference file");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Write the whole map to a sibling file, then rename it over the old one.
    /// A crash mid-write leaves the previous file intact.
    fn persist(&self, entries: &Entries) -> Result<(), PreferenceError> {
        let text = serde_json::to_string_pretty(entries)?;
        let temp_path = self.temp_path();

        let mut file = std::fs::File::create(&temp_path)?;
        file.write_all(text.as_bytes())?;
        file.sync_all()?;
        drop(file);

        if let Err(e) = std::fs::rename(&temp_path, &self.path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(())
    }
}

impl PreferenceStore for JsonFilePreferences {
    fn get(&self, key: &str) -> Option<Value> {
        lock(&self.entries).get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<(), PreferenceError> {
        let mut entries = lock(&self.entries);
        let previous = entries.insert(key.to_string(), value);
        if let Err(e) = self.persist(&entries) {
            match previous {
                Some(v) => entries.insert(key.to_string(), v),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), PreferenceError> {
        let mut entries = lock(&self.entries);
        let Some(previous) = entries.remove(key) else {
            return Ok(());
        };
        if let Err(e) = self.persist(&entries) {
            entries.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn memory_set_get_clear() {
        let prefs = MemoryPreferences::new();
        assert_eq!(prefs.get("popup:welcome"), None);

        prefs.set("popup:welcome", json!(true)).unwrap();
        assert_eq!(prefs.get("popup:welcome"), Some(json!(true)));

        prefs.set("popup:welcome", json!(false)).unwrap();
        assert_eq!(prefs.get("popup:welcome"), Some(json!(false)));

        prefs.clear("popup:welcome").unwrap();
        prefs.clear("popup:welcome").unwrap();
        assert_eq!(prefs.get("popup:welcome"), None);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let prefs = JsonFilePreferences::open(&path).unwrap();
        prefs.set("theme", json!({"mode": "dark"})).unwrap();
        prefs.set("popup:newsletter", json!("2026-10-16")).unwrap();
        prefs.clear("popup:newsletter").unwrap();
        drop(prefs);

        let reopened = JsonFilePreferences::open(&path).unwrap();
        assert_eq!(reopened.get("theme"), Some(json!({"mode": "dark"})));
        assert_eq!(reopened.get("popup:newsletter"), None);
        assert_eq!(reopened.path(), path.as_path());
    }

    #[test]
    fn file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = JsonFilePreferences::open(dir.path().join("absent.json")).unwrap();
        assert_eq!(prefs.get("anything"), None);
    }

    #[test]
    fn file_store_rejects_non_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        let err = JsonFilePreferences::open(&path).unwrap_err();
        assert!(matches!(err, PreferenceError::Serialize(_)));
        assert!(err.to_string().contains("preference encoding error"));
    }

    #[test]
    fn file_store_replaces_file_without_leaving_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let prefs = JsonFilePreferences::open(&path).unwrap();
        prefs.set("theme", json!("dark")).unwrap();
        prefs.set("currency", json!("EUR")).unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("prefs.json")]);

        let text = std::fs::read_to_string(&path).unwrap();
        let on_disk: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(on_disk, json!({"currency": "EUR", "theme": "dark"}));
    }

    #[test]
    fn file_store_keeps_old_contents_when_replace_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, r#"{"theme": "light"}"#).unwrap();
        let prefs = JsonFilePreferences::open(&path).unwrap();

        // A directory in the temp file's place makes the write fail before
        // the original is touched.
        std::fs::create_dir(dir.path().join("prefs.json.tmp")).unwrap();
        let err = prefs.set("theme", json!("dark")).unwrap_err();

        assert!(matches!(err, PreferenceError::Io(_)));
        assert_eq!(prefs.get("theme"), Some(json!("light")));
        let reopened = JsonFilePreferences::open(&path).unwrap();
        assert_eq!(reopened.get("theme"), Some(json!("light")));
    }

    #[test]
    fn file_store_rolls_back_on_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone").join("prefs.json");

        let prefs = JsonFilePreferences::open(&path).unwrap();
        let err = prefs.set("theme", json!("light")).unwrap_err();

        assert!(matches!(err, PreferenceError::Io(_)));
        assert_eq!(prefs.get("theme"), None);
    }
}
