//! # Vault Manager
//!
//! Operations exposed to the owning application. Composes the compatibility
//! engine, the envelope cipher, and the store; key derivation always runs on
//! the blocking pool.

use crate::compat::{CompatibilityEngine, ValidationResult};
use crate::error::{VaultError, VaultResult};
use crate::lifecycle::{Clock, CooldownLedger, SystemClock, UrgencyThresholds, VaultStatus};
use crate::storage::VaultStore;
use crate::vaults::{
    EncryptedVaultEnvelope, EnvelopeCipher, ExportDocument, KdfParams, QrToken, VaultData,
    VaultId, VaultMetadata,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use zeroize::Zeroizing;

/// High-level vault operations
#[derive(Debug, Clone)]
pub struct VaultManager {
    store: VaultStore,
    cipher: EnvelopeCipher,
    engine: CompatibilityEngine,
    clock: Arc<dyn Clock>,
    thresholds: UrgencyThresholds,
}

impl VaultManager {
    pub fn new(
        store: VaultStore,
        cipher: EnvelopeCipher,
        engine: CompatibilityEngine,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            cipher,
            engine,
            clock,
            thresholds: UrgencyThresholds::default(),
        }
    }

    /// Manager with production crypto, built-in rules and wall-clock time
    pub fn with_defaults(store: VaultStore) -> Self {
        Self::new(
            store,
            EnvelopeCipher::new(),
            CompatibilityEngine::default(),
            Arc::new(SystemClock),
        )
    }

    pub fn with_thresholds(mut self, thresholds: UrgencyThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn store(&self) -> &VaultStore {
        &self.store
    }

    pub fn engine(&self) -> &CompatibilityEngine {
        &self.engine
    }

    fn secret(passphrase: &str) -> Zeroizing<String> {
        Zeroizing::new(passphrase.to_string())
    }

    /// Gate a record on configuration and structural validity
    fn accept(&self, record: &VaultData) -> VaultResult<ValidationResult> {
        let result = self.engine.validate(&record.configuration());
        if !result.valid {
            return Err(VaultError::config(result.error_summary()));
        }
        record.validate()?;

        for warning in &result.warnings {
            log::warn!("Vault {}: {}", record.id, warning.message);
        }
        let allocated = record.allocation_total();
        if !record.beneficiaries.is_empty() && allocated < 100 {
            log::warn!(
                "Vault {} allocates {}% to beneficiaries; the remainder stays with the owner",
                record.id,
                allocated
            );
        }
        Ok(result)
    }

    async fn sealed(&self, id: &VaultId) -> VaultResult<EncryptedVaultEnvelope> {
        self.store
            .load_vault(id)
            .await?
            .ok_or_else(|| VaultError::not_found(id.as_str()))
    }

    pub async fn list_vaults(&self) -> VaultResult<Vec<VaultMetadata>> {
        self.store.list_vaults().await
    }

    /// Validate, encrypt and persist a new vault
    pub async fn create_vault(&self, mut record: VaultData, passphrase: &str) -> VaultResult<VaultId> {
        self.accept(&record)?;
        if self.store.load_vault(&record.id).await?.is_some() {
            return Err(VaultError::record(format!("vault {} already exists", record.id)));
        }

        let now = self.clock.now();
        record.created_at = now;
        record.updated_at = now;

        let metadata = record.metadata(None);
        let envelope = self
            .cipher
            .encrypt_in_background(record, Self::secret(passphrase))
            .await?;
        self.store.save_vault(&envelope, &metadata).await?;

        log::info!("Created vault {} ({})", metadata.vault_id, metadata.name);
        Ok(metadata.vault_id)
    }

    /// Decrypt a stored vault
    pub async fn load_vault(&self, id: &VaultId, passphrase: &str) -> VaultResult<VaultData> {
        let envelope = self.sealed(id).await?;
        self.cipher
            .decrypt_in_background(envelope, Self::secret(passphrase))
            .await
    }

    /// Replace a vault's record, re-encrypting it wholesale.
    ///
    /// The passphrase must open the current envelope; the creation time and
    /// check-in history are carried over.
    pub async fn update_vault(&self, id: &VaultId, mut record: VaultData, passphrase: &str) -> VaultResult<()> {
        if &record.id != id {
            return Err(VaultError::record(format!(
                "record {} cannot replace vault {}",
                record.id, id
            )));
        }
        self.accept(&record)?;

        let current = self.load_vault(id, passphrase).await?;
        let last_check_in = self
            .store
            .get_metadata(id)
            .await?
            .and_then(|metadata| metadata.last_check_in);

        record.created_at = current.created_at;
        record.updated_at = self.clock.now();

        let metadata = record.metadata(last_check_in);
        let envelope = self
            .cipher
            .encrypt_in_background(record, Self::secret(passphrase))
            .await?;
        self.store.save_vault(&envelope, &metadata).await?;

        log::info!("Updated vault {}", id);
        Ok(())
    }

    /// Delete a vault and its cooldown history; `false` if it did not exist
    pub async fn delete_vault(&self, id: &VaultId) -> VaultResult<bool> {
        let deleted = self.store.delete_vault(id).await?;
        if deleted {
            let mut ledger = CooldownLedger::load(&self.store).await?;
            if ledger.clear_vault(id) > 0 {
                ledger.save(&self.store).await?;
            }
            log::info!("Deleted vault {}", id);
        }
        Ok(deleted)
    }

    /// Export a vault after proving the passphrase opens it
    pub async fn export_vault(&self, id: &VaultId, passphrase: &str) -> VaultResult<ExportDocument> {
        let envelope = self.sealed(id).await?;
        self.cipher
            .decrypt_in_background(envelope.clone(), Self::secret(passphrase))
            .await?;

        log::info!("Exported vault {}", id);
        ExportDocument::new(envelope, self.clock.now())
    }

    /// Verify an export document and return its envelope, without persisting
    pub fn import_vault(&self, document: &str) -> VaultResult<EncryptedVaultEnvelope> {
        Ok(ExportDocument::parse(document)?.envelope)
    }

    /// Persist an envelope from elsewhere once the passphrase opens it
    async fn adopt(&self, mut envelope: EncryptedVaultEnvelope, passphrase: &str) -> VaultResult<VaultId> {
        let record = self
            .cipher
            .decrypt_in_background(envelope.clone(), Self::secret(passphrase))
            .await?;
        if self.store.load_vault(&record.id).await?.is_some() {
            return Err(VaultError::record(format!("vault {} already exists", record.id)));
        }

        envelope.created_at = record.created_at;
        envelope.updated_at = record.updated_at;
        self.store.save_vault(&envelope, &record.metadata(None)).await?;

        log::info!("Restored vault {} ({})", record.id, record.name);
        Ok(record.id)
    }

    /// Import an export document and store it as a vault
    pub async fn restore_vault(&self, document: &str, passphrase: &str) -> VaultResult<VaultId> {
        let envelope = self.import_vault(document)?;
        self.adopt(envelope, passphrase).await
    }

    /// Compact token for a vault sealed with the default KDF parameters
    pub async fn export_qr(&self, id: &VaultId, passphrase: &str) -> VaultResult<QrToken> {
        let envelope = self.sealed(id).await?;
        if envelope.kdf.params != KdfParams::default() {
            return Err(VaultError::format(
                "compact tokens require the default key derivation parameters",
            ));
        }
        self.cipher
            .decrypt_in_background(envelope.clone(), Self::secret(passphrase))
            .await?;
        QrToken::from_envelope(&envelope)
    }

    /// Store the vault carried by a compact token
    pub async fn import_qr(&self, token: &str, passphrase: &str) -> VaultResult<VaultId> {
        let envelope = QrToken::decode(token)?.into_envelope(KdfParams::default(), self.clock.now())?;
        self.adopt(envelope, passphrase).await
    }

    /// Record proof of life and reset the vault's notification cooldowns
    pub async fn check_in(&self, id: &VaultId) -> VaultResult<DateTime<Utc>> {
        let mut metadata = self
            .store
            .get_metadata(id)
            .await?
            .ok_or_else(|| VaultError::not_found(id.as_str()))?;

        let now = self.clock.now();
        metadata.last_check_in = Some(now);
        self.store.save_metadata(&metadata).await?;

        let mut ledger = CooldownLedger::load(&self.store).await?;
        if ledger.clear_vault(id) > 0 {
            ledger.save(&self.store).await?;
        }

        log::info!("Checked in on vault {}", id);
        Ok(now)
    }

    pub async fn vault_status(&self, id: &VaultId) -> VaultResult<VaultStatus> {
        let metadata = self
            .store
            .get_metadata(id)
            .await?
            .ok_or_else(|| VaultError::not_found(id.as_str()))?;
        Ok(VaultStatus::evaluate(&metadata, self.clock.now(), &self.thresholds))
    }

    /// Status of every listed vault
    pub async fn statuses(&self) -> VaultResult<Vec<(VaultMetadata, VaultStatus)>> {
        let now = self.clock.now();
        Ok(self
            .store
            .list_vaults()
            .await?
            .into_iter()
            .map(|metadata| {
                let status = VaultStatus::evaluate(&metadata, now, &self.thresholds);
                (metadata, status)
            })
            .collect())
    }
}
