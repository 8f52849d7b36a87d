//! Key-value storage seam for the local cache.
//!
//! [`KeyValueStore`] stands in for browser local storage: a flat namespace of
//! string keys holding string values. Two backings are provided, an in-memory
//! map for tests and embedding, and a directory of files for hosts that need
//! the cache to survive restarts.

use crate::error::{Error, Result};
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Raw string storage. Implementations are synchronous and expected to be
/// fast; they never suspend.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    /// All keys currently stored, in no particular order.
    fn keys(&self) -> Result<Vec<String>>;
}

/// Typed JSON access on top of any [`KeyValueStore`].
pub trait KeyValueStoreExt: KeyValueStore {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw)
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStoreExt for S {}

/// In-memory store with an optional size quota.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes that would push the total stored size (keys plus
    /// values) past `bytes`, like a browser's storage quota.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            entries: DashMap::new(),
            quota_bytes: Some(bytes),
        }
    }

    fn used_bytes_without(&self, key: &str) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.key() != key)
            .map(|entry| entry.key().len() + entry.value().len())
            .sum()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if let Some(quota) = self.quota_bytes {
            let needed = self.used_bytes_without(key) + key.len() + value.len();
            if needed > quota {
                return Err(Error::storage(
                    key,
                    format!("quota exceeded ({needed} > {quota} bytes)"),
                ));
            }
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.iter().map(|e| e.key().clone()).collect())
    }
}

/// File-backed store: one file per key inside a directory.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash mid-write leaves the previous value intact.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

const TMP_SUFFIX: &str = ".tmp";

impl FileStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| Error::storage(dir.display().to_string(), e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && !key.ends_with(TMP_SUFFIX)
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(Error::storage(key, "key is not a valid file name"));
        }
        Ok(self.dir.join(key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::storage(key, e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp = self.dir.join(format!("{key}{TMP_SUFFIX}"));
        fs::write(&tmp, value).map_err(|e| Error::storage(key, e))?;
        fs::rename(&tmp, &path).map_err(|e| Error::storage(key, e))
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::storage(key, e)),
        }
    }

    fn keys(&self) -> Result<Vec<String>> {
        let entries =
            fs::read_dir(&self.dir).map_err(|e| Error::storage(self.dir.display().to_string(), e))?;

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::storage(self.dir.display().to_string(), e))?;
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.ends_with(TMP_SUFFIX) {
                    keys.push(name.to_string());
                }
            }
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn memory_store_basics() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a").unwrap(), None);

        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));

        let mut keys = store.keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);

        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        // Removing a missing key is fine
        store.remove("a").unwrap();
    }

    #[test]
    fn memory_store_quota() {
        let store = MemoryStore::with_quota(10);
        store.set("k", "12345").unwrap();
        // Overwriting the same key only counts the new value
        store.set("k", "123456789").unwrap();

        let err = store.set("other", "12345").unwrap_err();
        assert!(matches!(err, Error::Storage { ref key, .. } if key == "other"));
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn typed_access() {
        let store = MemoryStore::new();
        store.set_json("doc", &json!({"n": 1})).unwrap();
        let value: Option<Value> = store.get_json("doc").unwrap();
        assert_eq!(value, Some(json!({"n": 1})));

        store.set("broken", "{not json").unwrap();
        assert!(matches!(
            store.get_json::<Value>("broken"),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn typed_access_through_trait_object() {
        let store: Box<dyn KeyValueStore> = Box::new(MemoryStore::new());
        store.set_json("list", &vec![1, 2, 3]).unwrap();
        let list: Option<Vec<i32>> = store.get_json("list").unwrap();
        assert_eq!(list, Some(vec![1, 2, 3]));
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("cache")).unwrap();

        store.set("tedsai_menu", "[]").unwrap();
        assert_eq!(store.get("tedsai_menu").unwrap().as_deref(), Some("[]"));
        assert_eq!(store.keys().unwrap(), vec!["tedsai_menu"]);

        // Reopening sees the same data
        let reopened = FileStore::open(store.dir()).unwrap();
        assert_eq!(reopened.get("tedsai_menu").unwrap().as_deref(), Some("[]"));

        store.remove("tedsai_menu").unwrap();
        assert_eq!(store.get("tedsai_menu").unwrap(), None);
        store.remove("tedsai_menu").unwrap();
    }

    #[test]
    fn file_store_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        for key in ["../escape", "a/b", "", ".hidden", "x.tmp"] {
            assert!(store.set(key, "v").is_err(), "accepted {key:?}");
        }
    }
}
