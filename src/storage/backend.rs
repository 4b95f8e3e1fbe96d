//! Key-value backends.
//!
//! Values are opaque bytes addressed by `(namespace, key)`. Nothing in this
//! module knows about envelopes or metadata.

use crate::error::{VaultError, VaultResult};
use crate::utils::fs::{ensure_dir_exists, write_file_atomic};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

const FILE_EXTENSION: &str = "json";

/// Trait for storage backends
#[async_trait]
pub trait KeyValueBackend: Send + Sync + fmt::Debug {
    /// Read a value, `None` if absent
    async fn get(&self, namespace: &str, key: &str) -> VaultResult<Option<Vec<u8>>>;

    /// Create or replace a value
    async fn put(&self, namespace: &str, key: &str, value: &[u8]) -> VaultResult<()>;

    /// Remove a value, returning whether it existed
    async fn delete(&self, namespace: &str, key: &str) -> VaultResult<bool>;

    /// Keys present in a namespace, sorted
    async fn keys(&self, namespace: &str) -> VaultResult<Vec<String>>;
}

fn check_key(key: &str) -> VaultResult<()> {
    let safe = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if safe {
        Ok(())
    } else {
        Err(VaultError::storage(format!("invalid storage key: {:?}", key)))
    }
}

/// Ephemeral backend for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<BTreeMap<(String, String), Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueBackend for MemoryBackend {
    async fn get(&self, namespace: &str, key: &str) -> VaultResult<Option<Vec<u8>>> {
        let entries = self.entries.read().await;
        Ok(entries.get(&(namespace.to_string(), key.to_string())).cloned())
    }

    async fn put(&self, namespace: &str, key: &str, value: &[u8]) -> VaultResult<()> {
        check_key(namespace)?;
        check_key(key)?;
        let mut entries = self.entries.write().await;
        entries.insert((namespace.to_string(), key.to_string()), value.to_vec());
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> VaultResult<bool> {
        let mut entries = self.entries.write().await;
        Ok(entries
            .remove(&(namespace.to_string(), key.to_string()))
            .is_some())
    }

    async fn keys(&self, namespace: &str) -> VaultResult<Vec<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, key)| key.clone())
            .collect())
    }
}

/// Durable backend storing one JSON file per value.
///
/// Layout is `<root>/<namespace>/<key>.json`. Writes go through a temporary
/// file and a rename so a crash never leaves a truncated value behind.
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, namespace: &str, key: &str) -> VaultResult<PathBuf> {
        check_key(namespace)?;
        check_key(key)?;
        Ok(self
            .root
            .join(namespace)
            .join(format!("{}.{}", key, FILE_EXTENSION)))
    }
}

#[async_trait]
impl KeyValueBackend for FileBackend {
    async fn get(&self, namespace: &str, key: &str) -> VaultResult<Option<Vec<u8>>> {
        let path = self.path_for(namespace, key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, namespace: &str, key: &str, value: &[u8]) -> VaultResult<()> {
        let path = self.path_for(namespace, key)?;
        ensure_dir_exists(&self.root.join(namespace)).await?;
        write_file_atomic(&path, value).await
    }

    async fn delete(&self, namespace: &str, key: &str) -> VaultResult<bool> {
        let path = self.path_for(namespace, key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self, namespace: &str) -> VaultResult<Vec<String>> {
        check_key(namespace)?;
        let dir = self.root.join(namespace);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn exercise(backend: &dyn KeyValueBackend) {
        assert_eq!(backend.get("envelopes", "a").await.unwrap(), None);

        backend.put("envelopes", "b", b"two").await.unwrap();
        backend.put("envelopes", "a", b"one").await.unwrap();
        backend.put("metadata", "a", b"meta").await.unwrap();

        assert_eq!(backend.get("envelopes", "a").await.unwrap(), Some(b"one".to_vec()));
        assert_eq!(backend.keys("envelopes").await.unwrap(), vec!["a", "b"]);

        backend.put("envelopes", "a", b"uno").await.unwrap();
        assert_eq!(backend.get("envelopes", "a").await.unwrap(), Some(b"uno".to_vec()));

        assert!(backend.delete("envelopes", "a").await.unwrap());
        assert!(!backend.delete("envelopes", "a").await.unwrap());
        assert_eq!(backend.keys("envelopes").await.unwrap(), vec!["b"]);
        assert_eq!(backend.keys("metadata").await.unwrap(), vec!["a"]);
        assert!(backend.keys("state").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_backend() {
        exercise(&MemoryBackend::new()).await;
    }

    #[tokio::test]
    async fn test_file_backend() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path());
        exercise(&backend).await;

        assert!(dir.path().join("envelopes").join("b.json").exists());
        assert!(!dir.path().join("envelopes").join("b.tmp").exists());
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path());
        assert!(backend.put("envelopes", "../escape", b"x").await.is_err());
        assert!(backend.get("../etc", "passwd").await.is_err());
        assert!(MemoryBackend::new().put("envelopes", "a/b", b"x").await.is_err());
    }
}
