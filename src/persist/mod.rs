//! Draft persistence for form values.
//!
//! Snapshots are JSON objects stored under a caller-chosen key in a
//! recoverable key-value store. A missing key means "no snapshot".
//!
//! - `MemoryStore`: session-like store shared by clone
//! - `FileStore`: one JSON file per key under a directory
//! - `Persistence`: load/save/clear on top of an optional store
//! - `DebouncedSaver`: collapses bursts of changes into one write

pub mod debounce;
pub mod file;
pub mod memory;

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::ValueBundle;

pub use debounce::{DebouncedSaver, DEFAULT_DEBOUNCE};
pub use file::FileStore;
pub use memory::MemoryStore;

/// Errors raised by a store backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store lock poisoned while {0}")]
    Poisoned(&'static str),
}

/// Errors raised while persisting a snapshot
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Failed to encode snapshot for '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Snapshot for '{key}' is not a JSON object")]
    NotAnObject { key: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Recoverable string key-value store
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Save/load/clear of value bundles.
///
/// Without a backend every operation is a no-op, which is how headless
/// contexts (no session storage) are handled.
#[derive(Clone, Default)]
pub struct Persistence {
    store: Option<Arc<dyn KeyValueStore>>,
}

impl Persistence {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store: Some(store) }
    }

    /// Persistence with no backend
    pub fn disabled() -> Self {
        Self { store: None }
    }

    pub fn is_available(&self) -> bool {
        self.store.is_some()
    }

    /// Load a snapshot. Unreadable or malformed snapshots count as absent.
    pub fn load(&self, key: &str) -> Option<ValueBundle> {
        let store = self.store.as_ref()?;

        let raw = match store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "Failed to read persisted snapshot");
                return None;
            }
        };

        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(serde_json::Value::Object(values)) => Some(values),
            Ok(_) => {
                warn!(key, "Persisted snapshot is not an object, ignoring");
                None
            }
            Err(e) => {
                warn!(key, error = %e, "Failed to parse persisted snapshot");
                None
            }
        }
    }

    /// Write a snapshot immediately
    pub fn save(&self, key: &str, values: &ValueBundle) -> Result<(), PersistError> {
        let Some(store) = self.store.as_ref() else {
            return Ok(());
        };

        let json = serde_json::to_string(values).map_err(|source| PersistError::Encode {
            key: key.to_string(),
            source,
        })?;
        store.set(key, &json)?;
        debug!(key, fields = values.len(), "Persisted snapshot");
        Ok(())
    }

    /// Remove a snapshot; removing an absent key is not an error
    pub fn clear(&self, key: &str) -> Result<(), PersistError> {
        let Some(store) = self.store.as_ref() else {
            return Ok(());
        };

        store.remove(key)?;
        debug!(key, "Cleared persisted snapshot");
        Ok(())
    }
}

/// Merge a loaded snapshot over explicit defaults (snapshot wins)
pub fn merge_snapshot(defaults: ValueBundle, snapshot: Option<ValueBundle>) -> ValueBundle {
    let Some(snapshot) = snapshot else {
        return defaults;
    };

    let mut merged = defaults;
    for (field, value) in snapshot {
        merged.insert(field, value);
    }
    merged
}
