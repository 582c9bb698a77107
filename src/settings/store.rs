//! Durable per-module settings storage.
//!
//! One flat JSON file per module at
//! `<storage>/<name_lower>/<name_lower>_settings.json`, mapping access id (or
//! name) to the current value. Files are scoped one-per-module, so no
//! cross-module locking is needed.

use std::io;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::settings::container::ModuleSettings;
use crate::settings::setting::SetOutcome;

/// Storage-layer errors. A missing settings file is not an error; anything
/// else indicates a problem beyond the module's control and propagates.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("corrupt settings file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Reads and writes per-module settings files under one storage root.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    storage_dir: PathBuf,
}

impl SettingsStore {
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
        }
    }

    fn module_dir(&self, module_name: &str) -> PathBuf {
        self.storage_dir.join(module_name.to_lowercase())
    }

    fn settings_path(&self, module_name: &str) -> PathBuf {
        self.module_dir(module_name)
            .join(format!("{}_settings.json", module_name.to_lowercase()))
    }

    /// Serialize every setting as `{access_id_or_name: value}`, creating the
    /// module's storage directory if absent.
    pub async fn write_settings(
        &self,
        module_name: &str,
        settings: &ModuleSettings,
    ) -> Result<(), StorageError> {
        let mut map = Map::new();
        for setting in settings.iter() {
            map.insert(setting.access_id().to_string(), setting.value_json());
        }

        let dir = self.module_dir(module_name);
        tokio::fs::create_dir_all(&dir).await?;

        let contents = serde_json::to_vec_pretty(&Value::Object(map))
            .map_err(|source| StorageError::Corrupt {
                path: self.settings_path(module_name),
                source,
            })?;
        tokio::fs::write(self.settings_path(module_name), contents).await?;
        Ok(())
    }

    /// Read the persisted settings map. A missing file means "no persisted
    /// overrides yet" and yields an empty map.
    pub async fn read_settings(
        &self,
        module_name: &str,
    ) -> Result<Map<String, Value>, StorageError> {
        let path = self.settings_path(module_name);
        let contents = match tokio::fs::read(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(module = module_name, "no persisted settings yet");
                return Ok(Map::new());
            }
            Err(e) => return Err(e.into()),
        };

        let value: Value = serde_json::from_slice(&contents)
            .map_err(|source| StorageError::Corrupt { path, source })?;
        match value {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }

    /// Merge persisted values into live settings, then write back so any
    /// discarded or defaulted value is normalized into storage.
    ///
    /// Unknown keys (setting removed or renamed since the file was written)
    /// and values that fail validation are logged and dropped; the in-memory
    /// default stays in place.
    pub async fn reconcile(
        &self,
        module_name: &str,
        settings: &mut ModuleSettings,
    ) -> Result<(), StorageError> {
        let stored = self.read_settings(module_name).await?;

        for (key, value) in &stored {
            match settings.find_mut(key) {
                Some(setting) => {
                    if setting.set_value(value) == SetOutcome::Rejected {
                        warn!(
                            module = module_name,
                            key, %value,
                            "invalid persisted setting value, keeping default"
                        );
                    }
                }
                None => {
                    warn!(module = module_name, key, "unrecognized setting key, ignoring");
                }
            }
        }

        self.write_settings(module_name, settings).await
    }

    fn storage_file_path(&self, module_name: &str, file_name: &str) -> PathBuf {
        self.module_dir(module_name).join(file_name)
    }

    /// Write a free-form module storage file (non-setting state).
    pub async fn write_file(
        &self,
        module_name: &str,
        file_name: &str,
        contents: &str,
    ) -> Result<(), StorageError> {
        let dir = self.module_dir(module_name);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(self.storage_file_path(module_name, file_name), contents).await?;
        Ok(())
    }

    /// Read a free-form module storage file; `None` when it does not exist.
    pub async fn read_file(
        &self,
        module_name: &str,
        file_name: &str,
    ) -> Result<Option<String>, StorageError> {
        match tokio::fs::read_to_string(self.storage_file_path(module_name, file_name)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }
}
