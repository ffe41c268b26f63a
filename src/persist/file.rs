//! File-backed key-value store.
//!
//! Each key maps to `<dir>/<hash16>.json`. Writes go through a temp file in
//! the same directory and are renamed into place while holding an exclusive
//! lock on `<dir>/.lock`.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use super::{KeyValueStore, StoreError};

/// Store that survives process restarts
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create drafts directory: {}", dir.display()))?;
        Ok(Self { dir })
    }

    /// Store rooted at the configured drafts directory
    pub fn from_config() -> Result<Self> {
        Self::open(crate::config::drafts_dir()?)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path holding the snapshot for a key
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", hash_key(key)))
    }

    fn lock(&self) -> Result<File, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.dir.join(".lock"))?;
        file.lock_exclusive()?;
        Ok(file)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let lock = self.lock()?;

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(value.as_bytes())?;
        tmp.flush()?;
        tmp.persist(self.path_for(key)).map_err(|e| e.error)?;

        lock.unlock()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let lock = self.lock()?;

        match fs::remove_file(self.path_for(key)) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        lock.unlock()?;
        Ok(())
    }
}

/// Hash a store key into a file-name-safe stem (first 16 hex chars of SHA256)
pub fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_get_remove() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::open(temp.path().join("drafts")).unwrap();

        assert!(store.get("wizard-onboarding").unwrap().is_none());

        store.set("wizard-onboarding", r#"{"step":2}"#).unwrap();
        assert_eq!(
            store.get("wizard-onboarding").unwrap().as_deref(),
            Some(r#"{"step":2}"#)
        );

        store.set("wizard-onboarding", r#"{"step":3}"#).unwrap();
        assert_eq!(
            store.get("wizard-onboarding").unwrap().as_deref(),
            Some(r#"{"step":3}"#)
        );

        store.remove("wizard-onboarding").unwrap();
        assert!(store.get("wizard-onboarding").unwrap().is_none());
        assert!(store.remove("wizard-onboarding").is_ok());
    }

    #[test]
    fn test_keys_with_separators_stay_inside_dir() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::open(temp.path()).unwrap();

        let path = store.path_for("../../etc/passwd");
        assert_eq!(path.parent(), Some(temp.path()));
    }

    #[test]
    fn test_hash_key_consistency() {
        assert_eq!(hash_key("signup"), hash_key("signup"));
        assert_ne!(hash_key("signup"), hash_key("login"));
        assert_eq!(hash_key("signup").len(), 16);
    }
}
