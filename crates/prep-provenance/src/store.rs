//! Object store collaborator
//!
//! The ledger only needs put/get/list/delete by `(bucket, key)`. Keys may
//! contain `/` (ex: `proj1/data_20240501.csv`).
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;

use tracing::debug;
use walkdir::WalkDir;

use crate::error::ProvenanceError;

pub trait ObjectStore: Send + Sync {
    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<(), ProvenanceError>;

    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ProvenanceError>;

    /// All keys in `bucket`, sorted.
    fn list(&self, bucket: &str) -> Result<Vec<String>, ProvenanceError>;

    fn delete(&self, bucket: &str, key: &str) -> Result<(), ProvenanceError>;
}

fn not_found(bucket: &str, key: &str) -> ProvenanceError {
    ProvenanceError::NotFound {
        bucket: bucket.to_string(),
        key: key.to_string(),
    }
}

/// Process-local store for tests and dry runs.
#[derive(Default)]
pub struct InMemoryStore {
    objects: RwLock<BTreeMap<(String, String), Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> ProvenanceError {
    ProvenanceError::Network("in-memory store lock poisoned".to_string())
}

impl ObjectStore for InMemoryStore {
    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<(), ProvenanceError> {
        let mut objects = self.objects.write().map_err(poisoned)?;
        objects.insert((bucket.to_string(), key.to_string()), bytes.to_vec());
        Ok(())
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ProvenanceError> {
        let objects = self.objects.read().map_err(poisoned)?;
        objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| not_found(bucket, key))
    }

    fn list(&self, bucket: &str) -> Result<Vec<String>, ProvenanceError> {
        let objects = self.objects.read().map_err(poisoned)?;
        Ok(objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect())
    }

    fn delete(&self, bucket: &str, key: &str) -> Result<(), ProvenanceError> {
        let mut objects = self.objects.write().map_err(poisoned)?;
        objects
            .remove(&(bucket.to_string(), key.to_string()))
            .map(|_| ())
            .ok_or_else(|| not_found(bucket, key))
    }
}

/// Buckets are directories under `root`; keys are relative paths.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, ProvenanceError> {
        check_relative(bucket)?;
        Ok(self.root.join(bucket))
    }

    fn path(&self, bucket: &str, key: &str) -> Result<PathBuf, ProvenanceError> {
        check_relative(key)?;
        Ok(self.bucket_dir(bucket)?.join(key))
    }
}

fn check_relative(part: &str) -> Result<(), ProvenanceError> {
    let escapes = part.is_empty()
        || Path::new(part)
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
    if escapes {
        return Err(ProvenanceError::InvalidInput(format!(
            "'{}' is not a relative object path",
            part
        )));
    }
    Ok(())
}

fn io_error(path: &Path, err: std::io::Error) -> ProvenanceError {
    ProvenanceError::Network(format!("{}: {}", path.display(), err))
}

impl ObjectStore for FsObjectStore {
    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<(), ProvenanceError> {
        let path = self.path(bucket, key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }
        std::fs::write(&path, bytes).map_err(|e| io_error(&path, e))?;
        debug!(bucket, key, bytes = bytes.len(), "object stored");
        Ok(())
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ProvenanceError> {
        let path = self.path(bucket, key)?;
        std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => not_found(bucket, key),
            _ => io_error(&path, e),
        })
    }

    fn list(&self, bucket: &str) -> Result<Vec<String>, ProvenanceError> {
        let dir = self.bucket_dir(bucket)?;
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for entry in WalkDir::new(&dir) {
            let entry = entry.map_err(|e| ProvenanceError::Network(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(&dir) {
                let key: Vec<String> = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().to_string())
                    .collect();
                keys.push(key.join("/"));
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn delete(&self, bucket: &str, key: &str) -> Result<(), ProvenanceError> {
        let path = self.path(bucket, key)?;
        std::fs::remove_file(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => not_found(bucket, key),
            _ => io_error(&path, e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(store: &dyn ObjectStore) {
        store.put("bronze", "proj1/a.csv", b"1").unwrap();
        store.put("bronze", "b.csv", b"2").unwrap();
        store.put("silver", "c.csv", b"3").unwrap();

        assert_eq!(store.get("bronze", "proj1/a.csv").unwrap(), b"1");
        assert_eq!(store.list("bronze").unwrap(), vec!["b.csv", "proj1/a.csv"]);
        assert!(store.get("bronze", "zzz").unwrap_err().is_not_found());

        store.delete("bronze", "b.csv").unwrap();
        assert_eq!(store.list("bronze").unwrap(), vec!["proj1/a.csv"]);
        assert!(store.delete("bronze", "b.csv").unwrap_err().is_not_found());
    }

    #[test]
    fn test_in_memory_store() {
        exercise(&InMemoryStore::new());
    }

    #[test]
    fn test_fs_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        exercise(&store);
        assert!(store.list("empty").unwrap().is_empty());
    }

    #[test]
    fn test_fs_store_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        assert!(matches!(
            store.put("bronze", "../outside", b"x"),
            Err(ProvenanceError::InvalidInput(_))
        ));
        assert!(store.put("/abs", "k", b"x").is_err());
    }
}
