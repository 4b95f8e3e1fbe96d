//! Notification cooldown ledger.
//!
//! Records when a notification was last delivered for each typed key. The
//! ledger is the only lifecycle state that is persisted.

use super::urgency::UrgencyTier;
use crate::error::VaultResult;
use crate::storage::VaultStore;
use crate::vaults::VaultId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

const LEDGER_DOCUMENT: &str = "cooldowns";

/// What a notification was about
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CooldownKey {
    /// Owner reminder for a vault at a given tier
    Tier {
        #[serde(rename = "vaultId")]
        vault_id: VaultId,
        tier: UrgencyTier,
    },
    /// Expiry notice to one beneficiary
    Beneficiary {
        #[serde(rename = "vaultId")]
        vault_id: VaultId,
        contact: String,
    },
}

impl CooldownKey {
    pub fn vault_id(&self) -> &VaultId {
        match self {
            CooldownKey::Tier { vault_id, .. } | CooldownKey::Beneficiary { vault_id, .. } => vault_id,
        }
    }
}

/// Persisted form of one ledger entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CooldownEntry {
    pub key: CooldownKey,
    pub sent_at: DateTime<Utc>,
}

/// Last delivery time per cooldown key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<CooldownEntry>", into = "Vec<CooldownEntry>")]
pub struct CooldownLedger {
    entries: BTreeMap<CooldownKey, DateTime<Utc>>,
}

impl From<Vec<CooldownEntry>> for CooldownLedger {
    fn from(entries: Vec<CooldownEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| (entry.key, entry.sent_at))
                .collect(),
        }
    }
}

impl From<CooldownLedger> for Vec<CooldownEntry> {
    fn from(ledger: CooldownLedger) -> Self {
        ledger
            .entries
            .into_iter()
            .map(|(key, sent_at)| CooldownEntry { key, sent_at })
            .collect()
    }
}

impl CooldownLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the persisted ledger, empty if none was saved yet
    pub async fn load(store: &VaultStore) -> VaultResult<Self> {
        Ok(store.load_state(LEDGER_DOCUMENT).await?.unwrap_or_default())
    }

    pub async fn save(&self, store: &VaultStore) -> VaultResult<()> {
        store.save_state(LEDGER_DOCUMENT, self).await
    }

    pub fn last_sent(&self, key: &CooldownKey) -> Option<DateTime<Utc>> {
        self.entries.get(key).copied()
    }

    /// Whether more than `cooldown` has elapsed since the last delivery
    pub fn is_due(&self, key: &CooldownKey, cooldown: Duration, now: DateTime<Utc>) -> bool {
        match self.last_sent(key) {
            None => true,
            Some(sent_at) => (now - sent_at)
                .to_std()
                .map_or(false, |elapsed| elapsed > cooldown),
        }
    }

    pub fn record(&mut self, key: CooldownKey, sent_at: DateTime<Utc>) {
        self.entries.insert(key, sent_at);
    }

    /// Forget every entry of one vault, returning how many were removed
    pub fn clear_vault(&mut self, vault_id: &VaultId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.vault_id() != vault_id);
        before - self.entries.len()
    }

    /// Keep only entries of the given vaults, returning how many were removed
    pub fn retain_vaults(&mut self, live: &BTreeSet<VaultId>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| live.contains(key.vault_id()));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn key(vault: &str, tier: UrgencyTier) -> CooldownKey {
        CooldownKey::Tier {
            vault_id: vault.parse().unwrap(),
            tier,
        }
    }

    #[test]
    fn test_cooldown_window() {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
        let day = Duration::from_secs(86_400);
        let mut ledger = CooldownLedger::new();
        let warning = key("v1", UrgencyTier::Warning);

        assert!(ledger.is_due(&warning, day, now));
        ledger.record(warning.clone(), now);
        assert!(!ledger.is_due(&warning, day, now + chrono::Duration::hours(23)));
        assert!(ledger.is_due(&warning, day, now + chrono::Duration::hours(25)));

        // Keys are per tier
        assert!(ledger.is_due(&key("v1", UrgencyTier::Critical), day, now));
        // A clock that went backwards never makes an entry due
        assert!(!ledger.is_due(&warning, day, now - chrono::Duration::days(3)));
    }

    #[test]
    fn test_keys_do_not_collide() {
        let mut ledger = CooldownLedger::new();
        let now = Utc::now();
        ledger.record(
            CooldownKey::Beneficiary {
                vault_id: "v1".parse().unwrap(),
                contact: "critical".to_string(),
            },
            now,
        );
        assert!(ledger.last_sent(&key("v1", UrgencyTier::Critical)).is_none());
    }

    #[test]
    fn test_clear_and_retain() {
        let now = Utc::now();
        let mut ledger = CooldownLedger::new();
        ledger.record(key("v1", UrgencyTier::Warning), now);
        ledger.record(key("v1", UrgencyTier::Critical), now);
        ledger.record(key("v2", UrgencyTier::Expired), now);

        assert_eq!(ledger.clear_vault(&"v1".parse().unwrap()), 2);
        assert_eq!(ledger.len(), 1);

        let live = BTreeSet::from(["v3".parse().unwrap()]);
        assert_eq!(ledger.retain_vaults(&live), 1);
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn test_persisted_in_store() {
        let store = VaultStore::in_memory();
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
        let mut ledger = CooldownLedger::load(&store).await.unwrap();
        assert!(ledger.is_empty());

        ledger.record(key("v1", UrgencyTier::Warning), now);
        ledger.record(
            CooldownKey::Beneficiary {
                vault_id: "v1".parse().unwrap(),
                contact: "heir@example.com".to_string(),
            },
            now,
        );
        ledger.save(&store).await.unwrap();

        assert_eq!(CooldownLedger::load(&store).await.unwrap(), ledger);
    }
}
