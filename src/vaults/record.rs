//! # Vault Domain Record
//!
//! [`VaultData`] is the plaintext record sealed inside an envelope. It holds
//! the structured inputs of the spending policy (keys, time locks, thresholds,
//! beneficiaries) but never a compiled script, an address derivation, or a
//! signature.
//!
//! [`VaultMetadata`] is the unencrypted projection stored next to the
//! envelope so vaults can be listed and monitored without a passphrase. It
//! must never carry key material.

use crate::compat::{Infrastructure, Logic, Modifier, VaultConfiguration};
use crate::error::{VaultError, VaultResult};
use crate::config::lifecycle;
use bitcoin::{absolute, Network};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

const MAX_ID_LENGTH: usize = 64;

/// Vault identity.
///
/// Restricted to ASCII alphanumerics, `-` and `_` so it is safe as a file name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VaultId(String);

impl VaultId {
    /// Fresh random identity
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for VaultId {
    type Error = VaultError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let well_formed = !value.is_empty()
            && value.len() <= MAX_ID_LENGTH
            && value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if well_formed {
            Ok(Self(value))
        } else {
            Err(VaultError::record(format!("invalid vault id: {:?}", value)))
        }
    }
}

impl FromStr for VaultId {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_string())
    }
}

impl From<VaultId> for String {
    fn from(id: VaultId) -> Self {
        id.0
    }
}

impl fmt::Display for VaultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role a public key plays in the policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyRole {
    Owner,
    Heir,
    Backup,
    Oracle,
}

/// Labeled public key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyDescriptor {
    pub label: String,
    /// Hex-encoded secp256k1 public key, full or x-only
    pub pubkey: String,
    pub role: KeyRole,
}

impl KeyDescriptor {
    /// Check the key is well-formed secp256k1 encoding
    pub fn validate(&self) -> VaultResult<()> {
        let parses = bitcoin::PublicKey::from_str(&self.pubkey).is_ok()
            || bitcoin::secp256k1::XOnlyPublicKey::from_str(&self.pubkey).is_ok();
        if parses {
            Ok(())
        } else {
            Err(VaultError::record(format!(
                "key '{}' is not a valid secp256k1 public key",
                self.label
            )))
        }
    }
}

/// Absolute time lock expressed as a block height
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timelock {
    pub height: u32,
    pub purpose: String,
}

impl Timelock {
    pub fn validate(&self) -> VaultResult<()> {
        absolute::Height::from_consensus(self.height)
            .map(|_| ())
            .map_err(|e| VaultError::record(format!("time lock '{}': {}", self.purpose, e)))
    }
}

/// Threshold parameters for multisig-style logic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Threshold {
    pub required: u8,
    pub total: u8,
    /// Requirement after the decay time lock, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decayed_required: Option<u8>,
}

/// Heir entitled to a share of the vault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Beneficiary {
    pub label: String,
    /// Index into [`VaultData::keys`]
    pub key_index: usize,
    /// Allocation percentage, 0..=100
    pub percentage: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Email address notified when the vault expires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
}

/// The vault domain record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultData {
    pub id: VaultId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub network: Network,
    /// Placeholder for the compiled spending policy; compiled externally
    #[serde(default)]
    pub policy: Option<String>,
    #[serde(default)]
    pub keys: Vec<KeyDescriptor>,
    #[serde(default)]
    pub timelocks: Vec<Timelock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<Threshold>,
    #[serde(default)]
    pub beneficiaries: Vec<Beneficiary>,
    pub infrastructure: BTreeSet<Infrastructure>,
    pub primary_logic: Logic,
    #[serde(default)]
    pub gates: BTreeSet<Logic>,
    #[serde(default)]
    pub modifiers: BTreeSet<Modifier>,
    /// Check-in interval for inactivity-triggered vaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inactivity_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_date: Option<DateTime<Utc>>,
    /// Receive address placeholder, derived externally
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_contact: Option<String>,
}

impl VaultData {
    /// Derive an empty record from an accepted configuration
    pub fn from_configuration(
        name: impl Into<String>,
        config: &VaultConfiguration,
        network: Network,
        now: DateTime<Utc>,
    ) -> Self {
        let config = config.canonical();
        Self {
            id: VaultId::generate(),
            created_at: now,
            updated_at: now,
            name: name.into(),
            description: String::new(),
            network,
            policy: None,
            keys: Vec::new(),
            timelocks: Vec::new(),
            threshold: None,
            beneficiaries: Vec::new(),
            infrastructure: config.infrastructure,
            primary_logic: config.primary_logic,
            gates: config.gates,
            modifiers: config.modifiers,
            inactivity_days: None,
            lock_date: None,
            address: None,
            owner_contact: None,
        }
    }

    /// Configuration this record was built from
    pub fn configuration(&self) -> VaultConfiguration {
        VaultConfiguration {
            infrastructure: self.infrastructure.clone(),
            primary_logic: self.primary_logic,
            gates: self.gates.clone(),
            modifiers: self.modifiers.clone(),
        }
        .canonical()
    }

    /// Sum of beneficiary allocations
    pub fn allocation_total(&self) -> u32 {
        self.beneficiaries
            .iter()
            .map(|beneficiary| u32::from(beneficiary.percentage))
            .sum()
    }

    /// Structural checks on the record.
    ///
    /// An allocation below 100 is accepted: the remainder stays with the owner.
    pub fn validate(&self) -> VaultResult<()> {
        if self.name.trim().is_empty() {
            return Err(VaultError::record("vault name must not be empty"));
        }

        for key in &self.keys {
            key.validate()?;
        }

        for timelock in &self.timelocks {
            timelock.validate()?;
        }

        for beneficiary in &self.beneficiaries {
            if beneficiary.key_index >= self.keys.len() {
                return Err(VaultError::record(format!(
                    "beneficiary '{}' references key #{} but only {} keys exist",
                    beneficiary.label,
                    beneficiary.key_index,
                    self.keys.len()
                )));
            }
            if beneficiary.percentage > 100 {
                return Err(VaultError::record(format!(
                    "beneficiary '{}' is allocated {}%",
                    beneficiary.label, beneficiary.percentage
                )));
            }
        }

        let total = self.allocation_total();
        if total > 100 {
            return Err(VaultError::record(format!(
                "beneficiary allocations sum to {}%",
                total
            )));
        }

        if let Some(threshold) = self.threshold {
            let decayed_ok = threshold
                .decayed_required
                .map_or(true, |decayed| decayed >= 1 && decayed <= threshold.required);
            if threshold.required == 0 || threshold.required > threshold.total || !decayed_ok {
                return Err(VaultError::record(format!(
                    "invalid threshold {}-of-{}",
                    threshold.required, threshold.total
                )));
            }
            if usize::from(threshold.total) > self.keys.len() {
                return Err(VaultError::record(format!(
                    "threshold spans {} keys but only {} are listed",
                    threshold.total,
                    self.keys.len()
                )));
            }
        }

        if self.primary_logic == Logic::DeadManSwitch && !matches!(self.inactivity_days, Some(days) if days > 0) {
            return Err(VaultError::record(
                "a dead man's switch needs a positive inactivity interval",
            ));
        }
        if let Some(days) = self.inactivity_days {
            if days > lifecycle::MAX_INACTIVITY_DAYS {
                return Err(VaultError::record(format!(
                    "inactivity interval of {} days exceeds the {} day limit",
                    days,
                    lifecycle::MAX_INACTIVITY_DAYS
                )));
            }
        }

        Ok(())
    }

    /// Unencrypted projection for listing and monitoring
    pub fn metadata(&self, last_check_in: Option<DateTime<Utc>>) -> VaultMetadata {
        VaultMetadata {
            vault_id: self.id.clone(),
            name: self.name.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            network: self.network,
            infrastructure: self.infrastructure.iter().copied().collect(),
            primary_logic: self.primary_logic,
            gates: self.gates.iter().copied().collect(),
            beneficiary_count: self.beneficiaries.len(),
            address: self.address.clone(),
            lock_date: self.lock_date,
            inactivity_days: self.inactivity_days,
            last_check_in,
            owner_contact: self.owner_contact.clone(),
            beneficiary_contacts: self
                .beneficiaries
                .iter()
                .filter_map(|beneficiary| {
                    beneficiary.contact.as_ref().map(|contact| BeneficiaryContact {
                        label: beneficiary.label.clone(),
                        contact: contact.clone(),
                    })
                })
                .collect(),
        }
    }
}

/// Notification address of a beneficiary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeneficiaryContact {
    pub label: String,
    pub contact: String,
}

/// Unencrypted listing projection of a vault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultMetadata {
    pub vault_id: VaultId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub network: Network,
    pub infrastructure: Vec<Infrastructure>,
    pub primary_logic: Logic,
    #[serde(default)]
    pub gates: Vec<Logic>,
    pub beneficiary_count: usize,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub lock_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub inactivity_days: Option<u32>,
    #[serde(default)]
    pub last_check_in: Option<DateTime<Utc>>,
    #[serde(default)]
    pub owner_contact: Option<String>,
    #[serde(default)]
    pub beneficiary_contacts: Vec<BeneficiaryContact>,
}

impl VaultMetadata {
    /// Most recent proof of life; creation counts as the first check-in
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_check_in.unwrap_or(self.created_at)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) const OWNER_KEY: &str =
        "02c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5";
    pub(crate) const HEIR_KEY: &str =
        "f9308a019258c31049344f85f89d5229b531c845836f99b08601f113bce036f9";

    pub(crate) fn sample_record() -> VaultData {
        let config = VaultConfiguration::new(Logic::DeadManSwitch)
            .with_infrastructure(Infrastructure::Nostr)
            .with_gate(Logic::Challenge);
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let mut record = VaultData::from_configuration("Family savings", &config, Network::Signet, now);
        record.description = "Cold storage for the kids".to_string();
        record.keys = vec![
            KeyDescriptor {
                label: "owner".to_string(),
                pubkey: OWNER_KEY.to_string(),
                role: KeyRole::Owner,
            },
            KeyDescriptor {
                label: "alice".to_string(),
                pubkey: HEIR_KEY.to_string(),
                role: KeyRole::Heir,
            },
        ];
        record.timelocks = vec![Timelock {
            height: 900_000,
            purpose: "heir recovery".to_string(),
        }];
        record.beneficiaries = vec![Beneficiary {
            label: "alice".to_string(),
            key_index: 1,
            percentage: 100,
            condition: None,
            contact: Some("alice@example.com".to_string()),
        }];
        record.inactivity_days = Some(90);
        record.owner_contact = Some("owner@example.com".to_string());
        record
    }

    #[test]
    fn test_vault_id_validation() {
        assert!(VaultId::generate().as_str().len() == 36);
        assert!("abc-DEF_123".parse::<VaultId>().is_ok());
        assert!("../etc/passwd".parse::<VaultId>().is_err());
        assert!("".parse::<VaultId>().is_err());
        assert!(serde_json::from_str::<VaultId>("\"a/b\"").is_err());
    }

    #[test]
    fn test_sample_record_is_valid() {
        sample_record().validate().unwrap();
    }

    #[test]
    fn test_bad_key_rejected() {
        let mut record = sample_record();
        record.keys[0].pubkey = "02deadbeef".to_string();
        assert!(matches!(record.validate(), Err(VaultError::InvalidRecord { .. })));
    }

    #[test]
    fn test_allocation_rules() {
        let mut record = sample_record();
        record.beneficiaries[0].percentage = 60;
        assert_eq!(record.allocation_total(), 60);
        assert!(record.validate().is_ok());

        record.beneficiaries.push(Beneficiary {
            label: "bob".to_string(),
            key_index: 0,
            percentage: 50,
            condition: Some("after 2030".to_string()),
            contact: None,
        });
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_beneficiary_key_index_checked() {
        let mut record = sample_record();
        record.beneficiaries[0].key_index = 5;
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_timelock_must_be_a_height() {
        let mut record = sample_record();
        record.timelocks[0].height = 1_700_000_000;
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_dead_man_switch_needs_interval() {
        let mut record = sample_record();
        record.inactivity_days = None;
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_inactivity_interval_is_bounded() {
        let mut record = sample_record();
        record.inactivity_days = Some(lifecycle::MAX_INACTIVITY_DAYS);
        assert!(record.validate().is_ok());

        record.inactivity_days = Some(100_000_000);
        assert!(matches!(record.validate(), Err(VaultError::InvalidRecord { .. })));
    }

    #[test]
    fn test_metadata_carries_no_key_material() {
        let record = sample_record();
        let metadata = record.metadata(None);
        let json = serde_json::to_string(&metadata).unwrap();

        assert!(!json.contains(OWNER_KEY));
        assert!(!json.contains(HEIR_KEY));
        assert_eq!(metadata.beneficiary_count, 1);
        assert_eq!(metadata.beneficiary_contacts[0].contact, "alice@example.com");
        assert_eq!(metadata.last_activity(), record.created_at);
    }
}
