//! Named configuration bundles offered as shortcuts.

use super::options::{Infrastructure, Logic, Modifier, VaultConfiguration};
use lazy_static::lazy_static;
use serde::Serialize;

/// A named, pre-validated configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preset {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub config: VaultConfiguration,
}

lazy_static! {
    static ref CATALOG: Vec<Preset> = vec![
        Preset {
            id: "time-capsule",
            name: "Time Capsule",
            description: "Funds unlock for heirs at a fixed date, with an encrypted cloud copy",
            config: VaultConfiguration::new(Logic::Timelock)
                .with_infrastructure(Infrastructure::Cloud)
                .with_gate(Logic::Challenge),
        },
        Preset {
            id: "dead-man-switch",
            name: "Dead Man's Switch",
            description: "Heirs gain access if the owner stops checking in; heartbeats over Nostr",
            config: VaultConfiguration::new(Logic::DeadManSwitch)
                .with_infrastructure(Infrastructure::Nostr)
                .with_gate(Logic::Challenge)
                .with_modifier(Modifier::Staggered),
        },
        Preset {
            id: "family-multisig",
            name: "Family Multisig",
            description: "2-of-3 family cosigners decaying to 1-of-2 after the lock expires",
            config: VaultConfiguration::new(Logic::MultisigDecay)
                .with_infrastructure(Infrastructure::MultisigDistribution)
                .with_infrastructure(Infrastructure::Cloud)
                .with_gate(Logic::Challenge),
        },
        Preset {
            id: "social-recovery",
            name: "Social Recovery",
            description: "A quorum of trusted contacts holding Shamir shares releases the vault",
            config: VaultConfiguration::new(Logic::SocialRecovery)
                .with_infrastructure(Infrastructure::Shamir)
                .with_infrastructure(Infrastructure::Nostr)
                .with_gate(Logic::Challenge),
        },
        Preset {
            id: "oracle-release",
            name: "Oracle Release",
            description: "An oracle attestation published on Nostr triggers a staggered release",
            config: VaultConfiguration::new(Logic::Oracle)
                .with_infrastructure(Infrastructure::Nostr)
                .with_gate(Logic::Challenge)
                .with_modifier(Modifier::Staggered),
        },
        Preset {
            id: "cold-storage",
            name: "Air-Gapped Cold Storage",
            description: "Offline signer with Shamir-split backups and a fixed unlock date",
            config: VaultConfiguration::new(Logic::Timelock)
                .with_infrastructure(Infrastructure::Airgap)
                .with_infrastructure(Infrastructure::Shamir)
                .with_gate(Logic::Challenge),
        },
        Preset {
            id: "coercion-resistant",
            name: "Coercion Resistant",
            description: "Dead man's switch with a decoy wallet and duress routing",
            config: VaultConfiguration::new(Logic::DeadManSwitch)
                .with_infrastructure(Infrastructure::Nostr)
                .with_infrastructure(Infrastructure::Shamir)
                .with_gate(Logic::Challenge)
                .with_modifier(Modifier::Decoy)
                .with_modifier(Modifier::Duress),
        },
    ];
}

/// Every preset, in display order
pub fn catalog() -> &'static [Preset] {
    &CATALOG
}

/// Look up a preset by id
pub fn find(id: &str) -> Option<&'static Preset> {
    CATALOG.iter().find(|preset| preset.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compat::engine::validate;

    #[test]
    fn test_every_preset_validates() {
        for preset in catalog() {
            let result = validate(&preset.config);
            assert!(result.valid, "{}: {}", preset.id, result.error_summary());
            assert!(result.warnings.is_empty(), "{}", preset.id);
        }
    }

    #[test]
    fn test_preset_ids_are_unique() {
        let mut ids: Vec<_> = catalog().iter().map(|preset| preset.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), catalog().len());
        assert!(find("dead-man-switch").is_some());
        assert!(find("unknown").is_none());
    }
}
