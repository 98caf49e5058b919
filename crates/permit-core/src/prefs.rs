//! Durable boolean flags.
//!
//! The rationale oracle remembers, per permission, whether the platform ever
//! asked for an explanation. Those flags must survive restarts, so they live
//! behind [`FlagStore`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Key/value storage for boolean flags.
pub trait FlagStore: Send + Sync {
    /// Read a flag. `None` if it was never written.
    fn get(&self, key: &str) -> Option<bool>;

    /// Write a flag.
    fn set(&self, key: &str, value: bool) -> Result<()>;

    /// Drop every stored flag.
    fn clear(&self) -> Result<()>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process flag store. Nothing is persisted.
#[derive(Debug, Default)]
pub struct MemoryFlagStore {
    flags: Mutex<BTreeMap<String, bool>>,
}

impl MemoryFlagStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FlagStore for MemoryFlagStore {
    fn get(&self, key: &str) -> Option<bool> {
        lock(&self.flags).get(key).copied()
    }

    fn set(&self, key: &str, value: bool) -> Result<()> {
        lock(&self.flags).insert(key.to_string(), value);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        lock(&self.flags).clear();
        Ok(())
    }
}

/// On-disk layout of [`JsonFlagStore`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct FlagFile {
    #[serde(default)]
    flags: BTreeMap<String, bool>,
}

impl FlagFile {
    fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        serde_json::from_str(&data).map_err(|e| {
            Error::FlagStore(format!(
                "Failed to parse flag file {}: {}",
                path.display(),
                e
            ))
        })
    }

    fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Flag store backed by a JSON file, rewritten on every change.
#[derive(Debug)]
pub struct JsonFlagStore {
    path: PathBuf,
    file: Mutex<FlagFile>,
}

impl JsonFlagStore {
    /// Open the store at `path`. A missing file starts out empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = FlagFile::load(&path)?;
        debug!(path = %path.display(), flags = file.flags.len(), "Flag store opened");
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }
}

impl FlagStore for JsonFlagStore {
    fn get(&self, key: &str) -> Option<bool> {
        lock(&self.file).flags.get(key).copied()
    }

    fn set(&self, key: &str, value: bool) -> Result<()> {
        let mut file = lock(&self.file);
        if file.flags.get(key) == Some(&value) {
            return Ok(());
        }
        let mut next = file.clone();
        next.flags.insert(key.to_string(), value);
        next.save(&self.path)?;
        *file = next;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut file = lock(&self.file);
        FlagFile::default().save(&self.path)?;
        file.flags.clear();
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryFlagStore::new();
        assert_eq!(store.get("a"), None);
        store.set("a", true).unwrap();
        assert_eq!(store.get("a"), Some(true));
        store.clear().unwrap();
        assert_eq!(store.get("a"), None);
    }

    #[test]
    fn json_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("flags.json");

        let store = JsonFlagStore::open(&path).unwrap();
        store.set("show_rationale__x", true).unwrap();
        drop(store);

        let reopened = JsonFlagStore::open(&path).unwrap();
        assert_eq!(reopened.get("show_rationale__x"), Some(true));
        assert_eq!(reopened.get("other"), None);
    }

    #[test]
    fn failed_write_leaves_flags_untouched() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the parent directory should be
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();

        let store = JsonFlagStore::open(blocker.join("flags.json")).unwrap();
        assert!(store.set("show_rationale__x", true).is_err());
        assert_eq!(store.get("show_rationale__x"), None);
    }

    #[test]
    fn json_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flags.json");
        std::fs::write(&path, "not json").unwrap();

        let err = JsonFlagStore::open(&path).unwrap_err();
        assert!(matches!(err, Error::FlagStore(_)));
    }
}
