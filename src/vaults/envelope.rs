//! # Encrypted Vault Envelope
//!
//! Seals a [`VaultData`] record under a passphrase-derived key. The key comes
//! from Argon2id with a fresh salt per encryption, and the record is sealed
//! with AES-256-GCM under a fresh IV. The vault id and format version are
//! bound as associated data, so an envelope cannot be relabeled as another
//! vault without failing authentication.
//!
//! Every failure that could be caused by a wrong passphrase or by tampering
//! surfaces as the single generic [`VaultError::DecryptionFailed`].

use crate::config::{envelope as format, kdf};
use crate::error::{VaultError, VaultResult};
use crate::vaults::record::{VaultData, VaultId};
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce, Tag};
use argon2::{Algorithm, Argon2, Params, Version};
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
    pub key_length: usize,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: kdf::MEMORY_KIB,
            iterations: kdf::ITERATIONS,
            parallelism: kdf::PARALLELISM,
            key_length: kdf::KEY_LENGTH,
        }
    }
}

impl KdfParams {
    /// Whether these parameters are strong enough for new envelopes
    pub fn meets_minimum(&self) -> bool {
        self.memory_kib >= kdf::MIN_MEMORY_KIB
            && self.iterations >= kdf::MIN_ITERATIONS
            && self.parallelism >= 1
            && self.key_length == kdf::KEY_LENGTH
    }

    /// Whether an envelope carrying these parameters may be opened
    pub fn within_bounds(&self) -> bool {
        (1..=kdf::MAX_MEMORY_KIB).contains(&self.memory_kib)
            && (1..=kdf::MAX_ITERATIONS).contains(&self.iterations)
            && (1..=kdf::MAX_PARALLELISM).contains(&self.parallelism)
            && self.key_length == kdf::KEY_LENGTH
    }

    /// Derive a symmetric key from a passphrase and salt
    pub fn derive(&self, passphrase: &str, salt: &[u8]) -> VaultResult<Zeroizing<Vec<u8>>> {
        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(self.key_length),
        )
        .map_err(|e| VaultError::crypto(format!("invalid KDF parameters: {}", e)))?;

        let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let mut key = Zeroizing::new(vec![0u8; self.key_length]);
        argon
            .hash_password_into(passphrase.as_bytes(), salt, &mut key)
            .map_err(|e| VaultError::crypto(format!("key derivation failed: {}", e)))?;
        Ok(key)
    }
}

/// Derive a 256-bit key with the production parameters
pub fn derive_key(passphrase: &str, salt: &[u8]) -> VaultResult<Zeroizing<Vec<u8>>> {
    KdfParams::default().derive(passphrase, salt)
}

/// Fresh random salt
pub fn generate_salt() -> [u8; kdf::SALT_LENGTH] {
    let mut salt = [0u8; kdf::SALT_LENGTH];
    rand::rng().fill_bytes(&mut salt);
    salt
}

/// KDF description stored with the envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KdfDescriptor {
    pub algorithm: String,
    #[serde(with = "base64_bytes")]
    pub salt: Vec<u8>,
    #[serde(flatten)]
    pub params: KdfParams,
}

/// Persisted, encrypted form of a vault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedVaultEnvelope {
    pub vault_id: VaultId,
    pub format_version: u32,
    pub algorithm: String,
    pub kdf: KdfDescriptor,
    #[serde(with = "base64_bytes")]
    pub iv: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub auth_tag: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn associated_data(vault_id: &VaultId, format_version: u32) -> Vec<u8> {
    let mut aad = Vec::with_capacity(vault_id.as_str().len() + 5);
    aad.extend_from_slice(vault_id.as_str().as_bytes());
    aad.push(0);
    aad.extend_from_slice(&format_version.to_be_bytes());
    aad
}

/// Passphrase-based envelope encryption
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeCipher {
    params: KdfParams,
}

impl Default for EnvelopeCipher {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvelopeCipher {
    /// Cipher with the production KDF parameters
    pub fn new() -> Self {
        Self {
            params: KdfParams::default(),
        }
    }

    /// Cipher with custom KDF parameters, which must meet the minimum
    pub fn with_params(params: KdfParams) -> VaultResult<Self> {
        if !params.meets_minimum() || !params.within_bounds() {
            return Err(VaultError::crypto(format!(
                "KDF parameters below minimum: m={} KiB, t={}, p={}",
                params.memory_kib, params.iterations, params.parallelism
            )));
        }
        Ok(Self { params })
    }

    /// Cheap parameters so unit tests do not spend seconds per derivation
    #[cfg(test)]
    pub(crate) fn insecure_for_tests() -> Self {
        Self {
            params: KdfParams {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
                key_length: kdf::KEY_LENGTH,
            },
        }
    }

    pub fn params(&self) -> KdfParams {
        self.params
    }

    /// Seal a record under a passphrase
    pub fn encrypt(&self, data: &VaultData, passphrase: &str) -> VaultResult<EncryptedVaultEnvelope> {
        let salt = generate_salt();
        let mut iv = [0u8; format::IV_LENGTH];
        rand::rng().fill_bytes(&mut iv);

        let key = self.params.derive(passphrase, &salt)?;
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| VaultError::crypto(format!("invalid key length: {}", e)))?;

        let mut buffer = Zeroizing::new(serde_json::to_vec(data)?);
        let aad = associated_data(&data.id, format::FORMAT_VERSION);
        let tag = cipher
            .encrypt_in_place_detached(Nonce::from_slice(&iv), &aad, buffer.as_mut_slice())
            .map_err(|_| VaultError::crypto("encryption failed"))?;

        log::debug!("Sealed vault {} ({} bytes)", data.id, buffer.len());

        Ok(EncryptedVaultEnvelope {
            vault_id: data.id.clone(),
            format_version: format::FORMAT_VERSION,
            algorithm: format::ALGORITHM.to_string(),
            kdf: KdfDescriptor {
                algorithm: kdf::ALGORITHM.to_string(),
                salt: salt.to_vec(),
                params: self.params,
            },
            iv: iv.to_vec(),
            auth_tag: tag.to_vec(),
            ciphertext: buffer.to_vec(),
            created_at: data.created_at,
            updated_at: data.updated_at,
        })
    }

    /// Open an envelope.
    ///
    /// The KDF parameters are taken from the envelope itself, bounded so a
    /// crafted file cannot demand unbounded memory.
    pub fn decrypt(&self, envelope: &EncryptedVaultEnvelope, passphrase: &str) -> VaultResult<VaultData> {
        if envelope.format_version != format::FORMAT_VERSION {
            return Err(VaultError::format(format!(
                "envelope format version {} is not supported",
                envelope.format_version
            )));
        }
        if envelope.algorithm != format::ALGORITHM {
            return Err(VaultError::format(format!(
                "unknown envelope algorithm '{}'",
                envelope.algorithm
            )));
        }
        if envelope.kdf.algorithm != kdf::ALGORITHM {
            return Err(VaultError::format(format!(
                "unknown key derivation '{}'",
                envelope.kdf.algorithm
            )));
        }
        if !envelope.kdf.params.within_bounds() {
            return Err(VaultError::format("key derivation parameters out of range"));
        }
        if envelope.iv.len() != format::IV_LENGTH || envelope.auth_tag.len() != format::TAG_LENGTH {
            return Err(VaultError::DecryptionFailed);
        }

        let key = envelope
            .kdf
            .params
            .derive(passphrase, &envelope.kdf.salt)
            .map_err(|_| VaultError::DecryptionFailed)?;
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| VaultError::DecryptionFailed)?;

        let mut buffer = Zeroizing::new(envelope.ciphertext.clone());
        let aad = associated_data(&envelope.vault_id, envelope.format_version);
        cipher
            .decrypt_in_place_detached(
                Nonce::from_slice(&envelope.iv),
                &aad,
                buffer.as_mut_slice(),
                Tag::from_slice(&envelope.auth_tag),
            )
            .map_err(|_| VaultError::DecryptionFailed)?;

        let record: VaultData =
            serde_json::from_slice(&buffer).map_err(|_| VaultError::DecryptionFailed)?;
        if record.id != envelope.vault_id {
            return Err(VaultError::DecryptionFailed);
        }
        Ok(record)
    }

    /// [`encrypt`](Self::encrypt) on the blocking pool
    pub async fn encrypt_in_background(
        self,
        data: VaultData,
        passphrase: Zeroizing<String>,
    ) -> VaultResult<EncryptedVaultEnvelope> {
        tokio::task::spawn_blocking(move || self.encrypt(&data, &passphrase))
            .await
            .map_err(|e| VaultError::operation("encrypt", e.to_string()))?
    }

    /// [`decrypt`](Self::decrypt) on the blocking pool
    pub async fn decrypt_in_background(
        self,
        envelope: EncryptedVaultEnvelope,
        passphrase: Zeroizing<String>,
    ) -> VaultResult<VaultData> {
        tokio::task::spawn_blocking(move || self.decrypt(&envelope, &passphrase))
            .await
            .map_err(|e| VaultError::operation("decrypt", e.to_string()))?
    }
}

/// Serde adapter storing binary fields as standard base64
pub(crate) mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<T, S>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: AsRef<[u8]>,
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes.as_ref()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text.as_bytes()).map_err(serde::de::Error::custom)
    }
}
