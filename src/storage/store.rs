//! # Vault Store
//!
//! Persists each vault as two paired records: the encrypted envelope and its
//! unencrypted metadata projection. The pair is kept consistent without
//! native transactions by ordering the writes:
//!
//! - save writes the envelope first and the metadata last
//! - delete removes the metadata first and the envelope last
//!
//! A crash between the two writes can therefore leave an orphaned envelope,
//! which is invisible to listing, but never metadata pointing at a missing
//! envelope.

use super::backend::{FileBackend, KeyValueBackend, MemoryBackend};
use crate::error::{VaultError, VaultResult};
use crate::vaults::{EncryptedVaultEnvelope, VaultId, VaultMetadata};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

const ENVELOPES: &str = "envelopes";
const METADATA: &str = "metadata";
const STATE: &str = "state";

/// Envelope and metadata persistence over any [`KeyValueBackend`]
#[derive(Debug, Clone)]
pub struct VaultStore {
    backend: Arc<dyn KeyValueBackend>,
}

impl VaultStore {
    pub fn new(backend: Arc<dyn KeyValueBackend>) -> Self {
        Self { backend }
    }

    /// Store backed by process memory
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Store backed by files under `dir`
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileBackend::new(dir)))
    }

    async fn read_json<T: DeserializeOwned>(&self, namespace: &str, key: &str) -> VaultResult<Option<T>> {
        match self.backend.get(namespace, key).await? {
            Some(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(|e| {
                VaultError::storage(format!("corrupt {} record '{}': {}", namespace, key, e))
            }),
            None => Ok(None),
        }
    }

    async fn write_json<T: Serialize>(&self, namespace: &str, key: &str, value: &T) -> VaultResult<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.backend.put(namespace, key, &bytes).await
    }

    /// Persist an envelope together with its metadata
    pub async fn save_vault(
        &self,
        envelope: &EncryptedVaultEnvelope,
        metadata: &VaultMetadata,
    ) -> VaultResult<()> {
        if envelope.vault_id != metadata.vault_id {
            return Err(VaultError::record(format!(
                "metadata for {} does not match envelope {}",
                metadata.vault_id, envelope.vault_id
            )));
        }
        let key = envelope.vault_id.as_str();

        self.write_json(ENVELOPES, key, envelope).await?;
        self.write_json(METADATA, key, metadata).await?;

        log::debug!("Saved vault {}", envelope.vault_id);
        Ok(())
    }

    /// Load an envelope, `None` if the vault does not exist
    pub async fn load_vault(&self, id: &VaultId) -> VaultResult<Option<EncryptedVaultEnvelope>> {
        self.read_json(ENVELOPES, id.as_str()).await
    }

    pub async fn get_metadata(&self, id: &VaultId) -> VaultResult<Option<VaultMetadata>> {
        self.read_json(METADATA, id.as_str()).await
    }

    /// Replace the metadata of an existing vault
    pub async fn save_metadata(&self, metadata: &VaultMetadata) -> VaultResult<()> {
        if !self.vault_exists(&metadata.vault_id).await? {
            return Err(VaultError::not_found(metadata.vault_id.as_str()));
        }
        self.write_json(METADATA, metadata.vault_id.as_str(), metadata).await
    }

    /// Whether both halves of the pair are present
    pub async fn vault_exists(&self, id: &VaultId) -> VaultResult<bool> {
        Ok(self.backend.get(ENVELOPES, id.as_str()).await?.is_some()
            && self.backend.get(METADATA, id.as_str()).await?.is_some())
    }

    /// Remove a vault, returning whether anything was deleted
    pub async fn delete_vault(&self, id: &VaultId) -> VaultResult<bool> {
        let had_metadata = self.backend.delete(METADATA, id.as_str()).await?;
        let had_envelope = self.backend.delete(ENVELOPES, id.as_str()).await?;

        if had_metadata != had_envelope {
            log::warn!("Vault {} was only half present when deleted", id);
        }
        Ok(had_metadata || had_envelope)
    }

    /// Metadata of every complete vault, oldest first.
    ///
    /// Metadata without an envelope and unreadable entries are skipped.
    pub async fn list_vaults(&self) -> VaultResult<Vec<VaultMetadata>> {
        let envelopes = self.backend.keys(ENVELOPES).await?;
        let mut vaults = Vec::new();

        for key in self.backend.keys(METADATA).await? {
            if envelopes.binary_search(&key).is_err() {
                log::warn!("Skipping metadata {} with no envelope", key);
                continue;
            }
            match self.read_json::<VaultMetadata>(METADATA, &key).await {
                Ok(Some(metadata)) => vaults.push(metadata),
                Ok(None) => {}
                Err(e) => log::warn!("Skipping vault {}: {}", key, e),
            }
        }

        vaults.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.vault_id.cmp(&b.vault_id))
        });
        Ok(vaults)
    }

    /// Read an auxiliary state document
    pub async fn load_state<T: DeserializeOwned>(&self, name: &str) -> VaultResult<Option<T>> {
        self.read_json(STATE, name).await
    }

    /// Write an auxiliary state document
    pub async fn save_state<T: Serialize>(&self, name: &str, value: &T) -> VaultResult<()> {
        self.write_json(STATE, name, value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vaults::record::tests::sample_record;
    use crate::vaults::EnvelopeCipher;
    use async_trait::async_trait;

    fn sealed_pair() -> (EncryptedVaultEnvelope, VaultMetadata) {
        let record = sample_record();
        let envelope = EnvelopeCipher::insecure_for_tests()
            .encrypt(&record, "passphrase")
            .unwrap();
        (envelope, record.metadata(None))
    }

    #[tokio::test]
    async fn test_save_load_delete() {
        let store = VaultStore::in_memory();
        let (envelope, metadata) = sealed_pair();
        let id = envelope.vault_id.clone();

        assert!(!store.vault_exists(&id).await.unwrap());
        store.save_vault(&envelope, &metadata).await.unwrap();

        assert!(store.vault_exists(&id).await.unwrap());
        assert_eq!(store.load_vault(&id).await.unwrap(), Some(envelope));
        assert_eq!(store.get_metadata(&id).await.unwrap(), Some(metadata));
        assert_eq!(store.list_vaults().await.unwrap().len(), 1);

        assert!(store.delete_vault(&id).await.unwrap());
        assert!(!store.delete_vault(&id).await.unwrap());
        assert_eq!(store.load_vault(&id).await.unwrap(), None);
        assert!(store.list_vaults().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mismatched_pair_rejected() {
        let store = VaultStore::in_memory();
        let (envelope, _) = sealed_pair();
        let (_, other_metadata) = sealed_pair();
        assert!(store.save_vault(&envelope, &other_metadata).await.is_err());
        assert!(store.list_vaults().await.unwrap().is_empty());
    }

    #[derive(Debug, Default)]
    struct RefusingBackend {
        inner: MemoryBackend,
        refuse: &'static str,
    }

    #[async_trait]
    impl KeyValueBackend for RefusingBackend {
        async fn get(&self, namespace: &str, key: &str) -> VaultResult<Option<Vec<u8>>> {
            self.inner.get(namespace, key).await
        }

        async fn put(&self, namespace: &str, key: &str, value: &[u8]) -> VaultResult<()> {
            if namespace == self.refuse {
                return Err(VaultError::storage("disk full"));
            }
            self.inner.put(namespace, key, value).await
        }

        async fn delete(&self, namespace: &str, key: &str) -> VaultResult<bool> {
            self.inner.delete(namespace, key).await
        }

        async fn keys(&self, namespace: &str) -> VaultResult<Vec<String>> {
            self.inner.keys(namespace).await
        }
    }

    #[tokio::test]
    async fn test_failed_envelope_write_leaves_no_metadata() {
        let store = VaultStore::new(Arc::new(RefusingBackend {
            inner: MemoryBackend::new(),
            refuse: ENVELOPES,
        }));
        let (envelope, metadata) = sealed_pair();

        assert!(store.save_vault(&envelope, &metadata).await.is_err());
        assert_eq!(store.get_metadata(&envelope.vault_id).await.unwrap(), None);
        assert!(store.list_vaults().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_orphaned_envelope_is_not_listed() {
        let store = VaultStore::new(Arc::new(RefusingBackend {
            inner: MemoryBackend::new(),
            refuse: METADATA,
        }));
        let (envelope, metadata) = sealed_pair();

        assert!(store.save_vault(&envelope, &metadata).await.is_err());
        assert!(!store.vault_exists(&envelope.vault_id).await.unwrap());
        assert!(store.list_vaults().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_metadata_without_envelope_skipped() {
        let backend = Arc::new(MemoryBackend::new());
        let store = VaultStore::new(backend.clone());
        let (envelope, metadata) = sealed_pair();
        store.save_vault(&envelope, &metadata).await.unwrap();

        backend.delete(ENVELOPES, envelope.vault_id.as_str()).await.unwrap();
        assert!(store.list_vaults().await.unwrap().is_empty());
        assert!(store.save_metadata(&metadata).await.is_err());
    }

    #[tokio::test]
    async fn test_backends_are_interchangeable() {
        let dir = tempfile::tempdir().unwrap();
        let (envelope, metadata) = sealed_pair();

        for store in [VaultStore::in_memory(), VaultStore::open(dir.path())] {
            store.save_vault(&envelope, &metadata).await.unwrap();
            let loaded = store.load_vault(&envelope.vault_id).await.unwrap().unwrap();
            assert_eq!(loaded, envelope);
            assert_eq!(store.list_vaults().await.unwrap(), vec![metadata.clone()]);
        }

        let reopened = VaultStore::open(dir.path());
        assert!(reopened.vault_exists(&envelope.vault_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_state_documents() {
        let store = VaultStore::in_memory();
        assert_eq!(store.load_state::<Vec<u32>>("counters").await.unwrap(), None);
        store.save_state("counters", &vec![1u32, 2, 3]).await.unwrap();
        assert_eq!(
            store.load_state::<Vec<u32>>("counters").await.unwrap(),
            Some(vec![1, 2, 3])
        );
    }
}
