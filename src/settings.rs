// src/settings.rs

//! Key-value settings
//!
//! The whitelist and vendor name are persisted through a [`SettingsStore`].
//! Values are JSON so list and scalar settings share one interface.

use crate::error::{Error, Result};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Persistent key-value store
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;

    fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Read a list of strings, ignoring non-string members
    fn get_string_list(&self, key: &str) -> Result<Vec<String>> {
        Ok(match self.get(key)? {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        })
    }
}

/// Settings held in memory for the life of the process
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<HashMap<String, Value>>,
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }
}

/// Settings persisted as a JSON object on disk
///
/// Every write replaces the file atomically. A write lock serializes writers
/// within the process.
#[derive(Debug)]
pub struct JsonFileSettings {
    path: PathBuf,
    lock: RwLock<()>,
}

impl JsonFileSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str(&content)? {
            Value::Object(map) => Ok(map),
            _ => Err(Error::Settings(format!(
                "{} does not contain a JSON object",
                self.path.display()
            ))),
        }
    }

    fn store(&self, map: &Map<String, Value>) -> Result<()> {
        let dir = self.path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(dir)?;

        let mut temp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut temp, map)?;
        temp.write_all(b"\n")?;
        temp.persist(&self.path)
            .map_err(|e| Error::Settings(format!("failed to write {}: {}", self.path.display(), e.error)))?;

        debug!("Saved settings to {}", self.path.display());
        Ok(())
    }
}

impl SettingsStore for JsonFileSettings {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let _guard = self.lock.read();
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let _guard = self.lock.write();
        let mut map = self.load()?;
        map.insert(key.to_string(), value);
        self.store(&map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_memory_settings() {
        let settings = MemorySettings::default();
        assert!(settings.get("vendor").unwrap().is_none());
        settings.set("vendor", json!("acme")).unwrap();
        assert_eq!(settings.get("vendor").unwrap(), Some(json!("acme")));
    }

    #[test]
    fn test_json_file_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/settings.json");

        let settings = JsonFileSettings::new(&path);
        settings.set("plugins", json!(["acme/acme.php"])).unwrap();
        settings.set("vendor", json!("acme")).unwrap();

        let reopened = JsonFileSettings::new(&path);
        assert_eq!(reopened.get_string_list("plugins").unwrap(), ["acme/acme.php"]);
        assert_eq!(reopened.get("vendor").unwrap(), Some(json!("acme")));
    }

    #[test]
    fn test_string_list_ignores_other_values() {
        let settings = MemorySettings::default();
        settings.set("themes", json!(["twentyten", 3, null])).unwrap();
        assert_eq!(settings.get_string_list("themes").unwrap(), ["twentyten"]);

        settings.set("themes", json!("not a list")).unwrap();
        assert!(settings.get_string_list("themes").unwrap().is_empty());
    }

    #[test]
    fn test_non_object_file_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.json");
        fs::write(&path, "[1, 2]").unwrap();

        let err = JsonFileSettings::new(&path).get("vendor").unwrap_err();
        assert!(matches!(err, Error::Settings(_)));
    }
}
