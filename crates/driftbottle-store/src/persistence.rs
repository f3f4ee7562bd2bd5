// SPDX-FileCopyrightText: 2026 Driftbottle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collection persistence.
//!
//! Each collection is one JSON document. [`JsonFileStore`] keeps them as
//! files under a data directory and replaces them atomically;
//! [`MemoryCollectionStore`] keeps them in memory for tests and ephemeral runs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use driftbottle_config::model::StorageConfig;
use driftbottle_core::{
    AdapterType, CollectionKey, CollectionStore, DriftbottleError, HealthStatus, PluginAdapter,
};

fn storage_error(message: String) -> DriftbottleError {
    DriftbottleError::Storage {
        source: message.into(),
    }
}

/// File-backed store: one JSON file per collection.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
    users_file: String,
    letters_file: String,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            users_file: "users.json".to_string(),
            letters_file: "letters.json".to_string(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            dir: PathBuf::from(&config.data_dir),
            users_file: config.users_file.clone(),
            letters_file: config.letters_file.clone(),
        }
    }

    /// Path of the file backing `key`.
    pub fn path_for(&self, key: CollectionKey) -> PathBuf {
        let file = match key {
            CollectionKey::Users => &self.users_file,
            CollectionKey::Letters => &self.letters_file,
        };
        self.dir.join(file)
    }

    async fn write_atomic(path: &Path, contents: &str) -> Result<(), DriftbottleError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                storage_error(format!("failed to create {}: {e}", parent.display()))
            })?;
        }

        let temp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&temp_path, contents)
            .await
            .map_err(|e| storage_error(format!("failed to write {}: {e}", temp_path.display())))?;

        if let Err(e) = tokio::fs::rename(&temp_path, path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(storage_error(format!(
                "failed to replace {}: {e}",
                path.display()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for JsonFileStore {
    fn name(&self) -> &str {
        "json-file"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, DriftbottleError> {
        match tokio::fs::metadata(&self.dir).await {
            Ok(meta) if meta.is_dir() => Ok(HealthStatus::Healthy),
            Ok(_) => Ok(HealthStatus::Unhealthy(format!(
                "{} is not a directory",
                self.dir.display()
            ))),
            Err(e) => Ok(HealthStatus::Degraded(format!(
                "data directory {} unavailable: {e}",
                self.dir.display()
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), DriftbottleError> {
        debug!(dir = %self.dir.display(), "json store shutting down");
        Ok(())
    }
}

#[async_trait]
impl CollectionStore for JsonFileStore {
    async fn read(&self, key: CollectionKey) -> Result<Option<String>, DriftbottleError> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    async fn write(&self, key: CollectionKey, contents: &str) -> Result<(), DriftbottleError> {
        Self::write_atomic(&self.path_for(key), contents).await
    }
}

/// In-memory store. Optionally fails every write to exercise save-failure paths.
#[derive(Debug, Default)]
pub struct MemoryCollectionStore {
    documents: Mutex<HashMap<CollectionKey, String>>,
    fail_writes: AtomicBool,
}

impl MemoryCollectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a raw document, bypassing serialization.
    pub fn insert_raw(&self, key: CollectionKey, contents: impl Into<String>) {
        self.lock().insert(key, contents.into());
    }

    /// Returns the raw document last written for `key`.
    pub fn raw(&self, key: CollectionKey) -> Option<String> {
        self.lock().get(&key).cloned()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CollectionKey, String>> {
        self.documents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl PluginAdapter for MemoryCollectionStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, DriftbottleError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), DriftbottleError> {
        Ok(())
    }
}

#[async_trait]
impl CollectionStore for MemoryCollectionStore {
    async fn read(&self, key: CollectionKey) -> Result<Option<String>, DriftbottleError> {
        Ok(self.raw(key))
    }

    async fn write(&self, key: CollectionKey, contents: &str) -> Result<(), DriftbottleError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(storage_error(format!("write to {key} refused")));
        }
        self.insert_raw(key, contents);
        Ok(())
    }
}

/// Loads a collection, healing a missing or corrupt document.
///
/// When the document is absent or does not parse, the default value is
/// written back and returned. Only a failed read is an error.
pub async fn load_collection<T>(
    store: &dyn CollectionStore,
    key: CollectionKey,
) -> Result<T, DriftbottleError>
where
    T: DeserializeOwned + Serialize + Default,
{
    let parsed = match store.read(key).await? {
        Some(contents) => match serde_json::from_str::<T>(&contents) {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!(collection = %key, error = %e, "collection is corrupt, resetting to empty");
                T::default()
            }
        },
        None => {
            debug!(collection = %key, "collection missing, creating empty");
            T::default()
        }
    };

    save_collection(store, key, &parsed).await;
    Ok(parsed)
}

/// Writes a full snapshot of a collection. Failures are logged, never raised.
///
/// Returns whether the write landed so callers and tests can observe it.
pub async fn save_collection<T: Serialize>(
    store: &dyn CollectionStore,
    key: CollectionKey,
    value: &T,
) -> bool {
    let contents = match serde_json::to_string_pretty(value) {
        Ok(contents) => contents,
        Err(e) => {
            error!(collection = %key, error = %e, "failed to serialize collection");
            return false;
        }
    };

    match store.write(key, &contents).await {
        Ok(()) => true,
        Err(e) => {
            error!(collection = %key, error = %e, "failed to persist collection");
            false
        }
    }
}
