//! Client Storage Module
//!
//! Durable key-value persistence for local application state.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::{debug, error, info};

/// Storage port used by stateful components.
///
/// Values are JSON strings keyed by a short name. Implementations must be
/// safe to share across the command handlers and background tasks.
pub trait StateStore: Send + Sync {
    /// Persist a JSON payload under a key, replacing any previous value.
    fn write(&self, key: &str, json: &str) -> Result<(), StorageError>;

    /// Read the payload stored under a key, if any.
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Remove the payload stored under a key. Removing a missing key is not
    /// an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Disk-backed store writing one JSON file per key in the app data directory.
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    /// Create a store rooted at the platform app data directory.
    pub fn new() -> Self {
        let root = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("StatementConsole");
        Self::with_root(root)
    }

    /// Create a store rooted at an explicit directory.
    pub fn with_root(root: PathBuf) -> Self {
        if let Err(e) = std::fs::create_dir_all(&root) {
            error!("Failed to create storage directory: {}", e);
        }

        debug!("Client storage initialized at: {:?}", root);

        Self { root }
    }

    fn file_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }
}

impl StateStore for DiskStore {
    fn write(&self, key: &str, json: &str) -> Result<(), StorageError> {
        let file_path = self.file_path(key);
        std::fs::write(&file_path, json).map_err(|e| StorageError::Io(e.to_string()))?;

        debug!("Saved state for key: {}", key);
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let file_path = self.file_path(key);

        if !file_path.exists() {
            return Ok(None);
        }

        let json =
            std::fs::read_to_string(&file_path).map_err(|e| StorageError::Io(e.to_string()))?;
        Ok(Some(json))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let file_path = self.file_path(key);

        if file_path.exists() {
            std::fs::remove_file(&file_path).map_err(|e| StorageError::Io(e.to_string()))?;
            info!("Deleted stored state for key: {}", key);
        }

        Ok(())
    }
}

impl Default for DiskStore {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory store for tests and headless runs.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn write(&self, key: &str, json: &str) -> Result<(), StorageError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StorageError::Io("storage lock poisoned".into()))?;
        entries.insert(key.to_string(), json.to_string());
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| StorageError::Io("storage lock poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StorageError::Io("storage lock poisoned".into()))?;
        entries.remove(key);
        Ok(())
    }
}

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}
