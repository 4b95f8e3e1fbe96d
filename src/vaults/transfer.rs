//! Portable transfer formats for encrypted vaults.
//!
//! Two formats are supported: a JSON export document carrying the full
//! envelope plus an integrity checksum, and a compact `HV1:` token small
//! enough for a QR code.

use crate::config::envelope as format;
use crate::error::{VaultError, VaultResult};
use crate::vaults::envelope::{EncryptedVaultEnvelope, KdfDescriptor, KdfParams};
use crate::vaults::record::VaultId;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Truncated SHA-256 over the compact JSON serialization.
///
/// `Value` objects are `BTreeMap`s unless serde_json's `preserve_order`
/// feature is enabled, so keys come out sorted at every level.
fn checksum_of(value: &Value) -> String {
    let digest = Sha256::digest(value.to_string().as_bytes());
    let mut checksum = hex::encode(digest);
    checksum.truncate(format::CHECKSUM_HEX_LENGTH);
    checksum
}

/// Self-describing export file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub format: String,
    pub exported_at: DateTime<Utc>,
    pub envelope: EncryptedVaultEnvelope,
    #[serde(rename = "integrityChecksum")]
    pub checksum: String,
}

impl ExportDocument {
    /// Wrap an envelope for export, computing its checksum
    pub fn new(envelope: EncryptedVaultEnvelope, exported_at: DateTime<Utc>) -> VaultResult<Self> {
        let checksum = checksum_of(&serde_json::to_value(&envelope)?);
        Ok(Self {
            format: format::EXPORT_FORMAT.to_string(),
            exported_at,
            envelope,
            checksum,
        })
    }

    pub fn to_json(&self) -> VaultResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and verify an export document.
    ///
    /// The checksum is verified against the envelope exactly as it appears
    /// in the file, before the envelope is interpreted.
    pub fn parse(json: &str) -> VaultResult<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| VaultError::format(format!("export is not valid JSON: {}", e)))?;

        let tag = value.get("format").and_then(Value::as_str);
        if tag != Some(format::EXPORT_FORMAT) {
            return Err(VaultError::format(format!(
                "unrecognized export format {:?}",
                tag.unwrap_or("<missing>")
            )));
        }

        let envelope = value
            .get("envelope")
            .ok_or_else(|| VaultError::format("export has no envelope"))?;
        let expected = value
            .get("integrityChecksum")
            .and_then(Value::as_str)
            .ok_or_else(|| VaultError::format("export has no checksum"))?;

        let actual = checksum_of(envelope);
        if actual != expected {
            log::warn!("Export checksum mismatch: expected {}, got {}", expected, actual);
            return Err(VaultError::Integrity {
                expected: expected.to_string(),
                actual,
            });
        }

        serde_json::from_value(value)
            .map_err(|e| VaultError::format(format!("malformed export document: {}", e)))
    }
}

/// Build the export JSON for an envelope
pub fn export_to_file(envelope: &EncryptedVaultEnvelope, exported_at: DateTime<Utc>) -> VaultResult<String> {
    ExportDocument::new(envelope.clone(), exported_at)?.to_json()
}

/// Recover the envelope from export JSON
pub fn import_from_file(json: &str) -> VaultResult<EncryptedVaultEnvelope> {
    Ok(ExportDocument::parse(json)?.envelope)
}

#[derive(Serialize, Deserialize)]
struct CompactToken {
    i: String,
    c: String,
    s: String,
    v: String,
}

/// Decoded content of a compact token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrPayload {
    pub vault_id: VaultId,
    /// Ciphertext with the authentication tag appended
    pub sealed: Vec<u8>,
    pub salt: Vec<u8>,
    pub iv: Vec<u8>,
}

impl QrPayload {
    /// Rebuild an envelope.
    ///
    /// Compact tokens do not carry KDF parameters, so the caller supplies the
    /// ones the envelope was sealed with.
    pub fn into_envelope(self, params: KdfParams, now: DateTime<Utc>) -> VaultResult<EncryptedVaultEnvelope> {
        if self.sealed.len() < format::TAG_LENGTH || self.iv.len() != format::IV_LENGTH {
            return Err(VaultError::format("QR token payload is truncated"));
        }
        let mut ciphertext = self.sealed;
        let auth_tag = ciphertext.split_off(ciphertext.len() - format::TAG_LENGTH);

        Ok(EncryptedVaultEnvelope {
            vault_id: self.vault_id,
            format_version: format::FORMAT_VERSION,
            algorithm: format::ALGORITHM.to_string(),
            kdf: KdfDescriptor {
                algorithm: crate::config::kdf::ALGORITHM.to_string(),
                salt: self.salt,
                params,
            },
            iv: self.iv,
            auth_tag,
            ciphertext,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Compact single-string encoding of an envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrToken(String);

impl QrToken {
    pub fn from_envelope(envelope: &EncryptedVaultEnvelope) -> VaultResult<Self> {
        let mut sealed = envelope.ciphertext.clone();
        sealed.extend_from_slice(&envelope.auth_tag);

        let compact = CompactToken {
            i: envelope.vault_id.to_string(),
            c: STANDARD.encode(&sealed),
            s: STANDARD.encode(&envelope.kdf.salt),
            v: STANDARD.encode(&envelope.iv),
        };
        let json = serde_json::to_vec(&compact)?;
        Ok(Self(format!("{}{}", format::QR_PREFIX, URL_SAFE_NO_PAD.encode(json))))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse a token string
    pub fn decode(token: &str) -> VaultResult<QrPayload> {
        let body = token
            .trim()
            .strip_prefix(format::QR_PREFIX)
            .ok_or_else(|| VaultError::format("not a vault QR token"))?;

        let json = URL_SAFE_NO_PAD
            .decode(body.as_bytes())
            .map_err(|e| VaultError::format(format!("QR token encoding: {}", e)))?;
        let compact: CompactToken = serde_json::from_slice(&json)
            .map_err(|e| VaultError::format(format!("QR token payload: {}", e)))?;

        let field = |name: &str, text: &str| {
            STANDARD
                .decode(text.as_bytes())
                .map_err(|e| VaultError::format(format!("QR token field '{}': {}", name, e)))
        };

        Ok(QrPayload {
            vault_id: compact.i.parse()?,
            sealed: field("c", &compact.c)?,
            salt: field("s", &compact.s)?,
            iv: field("v", &compact.v)?,
        })
    }
}

impl std::fmt::Display for QrToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vaults::envelope::EnvelopeCipher;
    use crate::vaults::record::tests::sample_record;
    use crate::vaults::record::VaultData;
    use chrono::TimeZone;

    const PASSPHRASE: &str = "hunter2 hunter2";

    fn sealed() -> (EnvelopeCipher, EncryptedVaultEnvelope) {
        let (cipher, _, envelope) = sealed_record();
        (cipher, envelope)
    }

    fn sealed_record() -> (EnvelopeCipher, VaultData, EncryptedVaultEnvelope) {
        let cipher = EnvelopeCipher::insecure_for_tests();
        let record = sample_record();
        let envelope = cipher.encrypt(&record, PASSPHRASE).unwrap();
        (cipher, record, envelope)
    }

    fn exported_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_checksum_ignores_key_order() {
        let shuffled: Value = serde_json::from_str(r#"{"b":1,"a":{"d":[1,{"z":0,"y":"x"}],"c":null}}"#).unwrap();
        let sorted: Value = serde_json::from_str(r#"{"a":{"c":null,"d":[1,{"y":"x","z":0}]},"b":1}"#).unwrap();
        assert_eq!(shuffled.to_string(), r#"{"a":{"c":null,"d":[1,{"y":"x","z":0}]},"b":1}"#);
        assert_eq!(checksum_of(&shuffled), checksum_of(&sorted));
        assert_eq!(checksum_of(&sorted).len(), format::CHECKSUM_HEX_LENGTH);
    }

    #[test]
    fn test_export_wire_names() {
        let (_, _, envelope) = sealed_record();
        let value: Value = serde_json::from_str(&export_to_file(&envelope, exported_at()).unwrap()).unwrap();
        for field in ["format", "exportedAt", "envelope", "integrityChecksum"] {
            assert!(value.get(field).is_some(), "missing {}", field);
        }
        assert!(value.get("checksum").is_none());
    }

    #[test]
    fn test_export_import_round_trip() {
        let (cipher, record, envelope) = sealed_record();
        let json = export_to_file(&envelope, exported_at()).unwrap();
        assert!(json.contains(format::EXPORT_FORMAT));

        let imported = import_from_file(&json).unwrap();
        assert_eq!(imported, envelope);
        assert_eq!(cipher.decrypt(&imported, PASSPHRASE).unwrap(), record);
    }

    #[test]
    fn test_any_envelope_change_fails_checksum() {
        let (_, envelope) = sealed();
        let json = export_to_file(&envelope, exported_at()).unwrap();
        let original: Value = serde_json::from_str(&json).unwrap();

        for field in ["vaultId", "ciphertext", "iv", "authTag", "createdAt"] {
            let mut tampered = original.clone();
            let text = tampered["envelope"][field].as_str().unwrap().to_string();
            let mut chars: Vec<char> = text.chars().collect();
            chars[1] = if chars[1] == 'A' { 'B' } else { 'A' };
            tampered["envelope"][field] = Value::String(chars.into_iter().collect());

            let err = import_from_file(&tampered.to_string()).unwrap_err();
            assert!(matches!(err, VaultError::Integrity { .. }), "field {}", field);
        }

        let mut tampered = original.clone();
        tampered["envelope"]["formatVersion"] = Value::from(2);
        assert!(matches!(import_from_file(&tampered.to_string()), Err(VaultError::Integrity { .. })));
    }

    #[test]
    fn test_key_order_does_not_matter() {
        let (_, envelope) = sealed();
        let document = ExportDocument::new(envelope.clone(), exported_at()).unwrap();

        // serde_json::Value emits keys sorted, unlike the struct field order
        let reordered = serde_json::to_value(&document).unwrap().to_string();
        assert_eq!(import_from_file(&reordered).unwrap(), envelope);
    }

    #[test]
    fn test_wrong_format_tag() {
        let (_, envelope) = sealed();
        let json = export_to_file(&envelope, exported_at()).unwrap();
        let json = json.replace(format::EXPORT_FORMAT, "heirvault-export-v0");

        assert!(matches!(import_from_file(&json), Err(VaultError::UnsupportedFormat { .. })));
        assert!(matches!(import_from_file("not json"), Err(VaultError::UnsupportedFormat { .. })));
    }

    #[test]
    fn test_qr_round_trip() {
        let (cipher, envelope) = sealed();
        let token = QrToken::from_envelope(&envelope).unwrap();
        assert!(token.as_str().starts_with(format::QR_PREFIX));
        assert!(!token.as_str()[format::QR_PREFIX.len()..].contains('='));

        let payload = QrToken::decode(token.as_str()).unwrap();
        assert_eq!(payload.vault_id, envelope.vault_id);

        let rebuilt = payload.into_envelope(cipher.params(), exported_at()).unwrap();
        assert_eq!(rebuilt.ciphertext, envelope.ciphertext);
        assert_eq!(rebuilt.auth_tag, envelope.auth_tag);
        assert!(cipher.decrypt(&rebuilt, PASSPHRASE).is_ok());
    }

    #[test]
    fn test_qr_rejects_garbage() {
        assert!(QrToken::decode("HV2:abc").is_err());
        assert!(QrToken::decode("HV1:!!!").is_err());

        let short = QrPayload {
            vault_id: "v1".parse().unwrap(),
            sealed: vec![0; 4],
            salt: vec![0; 16],
            iv: vec![0; 12],
        };
        assert!(short.into_envelope(KdfParams::default(), exported_at()).is_err());
    }
}
