//! Option vocabulary for vault configurations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Where vault material is kept and how it reaches heirs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Infrastructure {
    /// Encrypted record on the owner's device. Always present.
    Local,
    /// Encrypted backup published to Nostr relays; also carries heartbeats.
    Nostr,
    /// Encrypted backup in third-party cloud storage.
    Cloud,
    /// Backup split into Shamir shares held by trustees.
    Shamir,
    /// Cosigner keys distributed to independent holders.
    MultisigDistribution,
    /// Offline signer that never touches a network.
    Airgap,
}

/// Inheritance logic, usable as the primary trigger or as an extra gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Logic {
    /// Unlock at a fixed block height or date.
    Timelock,
    /// Unlock after the owner stops checking in.
    DeadManSwitch,
    /// Threshold that lowers once a time lock expires.
    MultisigDecay,
    /// Threshold of trusted contacts.
    SocialRecovery,
    /// Unlock on an oracle attestation.
    Oracle,
    /// Knowledge challenge an heir must answer. Gate only.
    Challenge,
}

/// Release modifiers applied on top of the unlock logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    /// Release funds in tranches over time.
    Staggered,
    /// Keep a decoy wallet for coercion scenarios.
    Decoy,
    /// Route a duress passphrase to an alternate path.
    Duress,
}

macro_rules! option_names {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// Every variant, in canonical order
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            /// Wire name of this option
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().replace('-', "_").as_str() {
                    $($name => Ok($ty::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($ty).to_lowercase(), s)),
                }
            }
        }
    };
}

option_names!(Infrastructure {
    Local => "local",
    Nostr => "nostr",
    Cloud => "cloud",
    Shamir => "shamir",
    MultisigDistribution => "multisig_distribution",
    Airgap => "airgap",
});

option_names!(Logic {
    Timelock => "timelock",
    DeadManSwitch => "dead_man_switch",
    MultisigDecay => "multisig_decay",
    SocialRecovery => "social_recovery",
    Oracle => "oracle",
    Challenge => "challenge",
});

option_names!(Modifier {
    Staggered => "staggered",
    Decoy => "decoy",
    Duress => "duress",
});

/// Any single option, tagged by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "option", rename_all = "snake_case")]
pub enum OptionRef {
    Infrastructure(Infrastructure),
    Logic(Logic),
    Modifier(Modifier),
}

impl fmt::Display for OptionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionRef::Infrastructure(option) => write!(f, "{}", option),
            OptionRef::Logic(option) => write!(f, "{}", option),
            OptionRef::Modifier(option) => write!(f, "{}", option),
        }
    }
}

impl From<Infrastructure> for OptionRef {
    fn from(option: Infrastructure) -> Self {
        OptionRef::Infrastructure(option)
    }
}

impl From<Logic> for OptionRef {
    fn from(option: Logic) -> Self {
        OptionRef::Logic(option)
    }
}

impl From<Modifier> for OptionRef {
    fn from(option: Modifier) -> Self {
        OptionRef::Modifier(option)
    }
}

/// Slot an option is being added into, for incremental queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    Infrastructure,
    PrimaryLogic,
    Gate,
    Modifier,
}

/// Draft vault configuration, as edited during creation.
///
/// Collections are ordered sets so that validation output does not depend on
/// the order options were picked in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultConfiguration {
    #[serde(default)]
    pub infrastructure: BTreeSet<Infrastructure>,
    pub primary_logic: Logic,
    #[serde(default)]
    pub gates: BTreeSet<Logic>,
    #[serde(default)]
    pub modifiers: BTreeSet<Modifier>,
}

impl VaultConfiguration {
    /// Create a configuration with local storage and the given primary logic
    pub fn new(primary_logic: Logic) -> Self {
        Self {
            infrastructure: BTreeSet::from([Infrastructure::Local]),
            primary_logic,
            gates: BTreeSet::new(),
            modifiers: BTreeSet::new(),
        }
    }

    pub fn with_infrastructure(mut self, option: Infrastructure) -> Self {
        self.infrastructure.insert(option);
        self
    }

    pub fn with_gate(mut self, gate: Logic) -> Self {
        self.gates.insert(gate);
        self
    }

    pub fn with_modifier(mut self, modifier: Modifier) -> Self {
        self.modifiers.insert(modifier);
        self
    }

    /// Copy with the local option injected
    pub fn canonical(&self) -> Self {
        let mut canonical = self.clone();
        canonical.infrastructure.insert(Infrastructure::Local);
        canonical
    }

    /// Primary logic followed by every gate
    pub fn all_logic(&self) -> impl Iterator<Item = Logic> + '_ {
        std::iter::once(self.primary_logic).chain(self.gates.iter().copied())
    }

    /// Whether the primary or any gate uses this logic
    pub fn uses_logic(&self, logic: Logic) -> bool {
        self.primary_logic == logic || self.gates.contains(&logic)
    }

    /// Whether this option is part of the configuration in any slot
    pub fn contains(&self, option: OptionRef) -> bool {
        match option {
            OptionRef::Infrastructure(infra) => self.infrastructure.contains(&infra),
            OptionRef::Logic(logic) => self.uses_logic(logic),
            OptionRef::Modifier(modifier) => self.modifiers.contains(&modifier),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_name_round_trip() {
        for infra in Infrastructure::ALL {
            assert_eq!(infra.as_str().parse::<Infrastructure>().unwrap(), *infra);
        }
        assert_eq!("dead-man-switch".parse::<Logic>().unwrap(), Logic::DeadManSwitch);
        assert!("vault".parse::<Modifier>().is_err());
    }

    #[test]
    fn test_local_is_injected() {
        let json = r#"{"infrastructure":["nostr"],"primaryLogic":"timelock"}"#;
        let config: VaultConfiguration = serde_json::from_str(json).unwrap();
        assert!(!config.infrastructure.contains(&Infrastructure::Local));
        assert!(config.canonical().infrastructure.contains(&Infrastructure::Local));
        assert!(VaultConfiguration::new(Logic::Oracle)
            .infrastructure
            .contains(&Infrastructure::Local));
    }

    #[test]
    fn test_order_irrelevant() {
        let a = VaultConfiguration::new(Logic::Timelock)
            .with_infrastructure(Infrastructure::Nostr)
            .with_infrastructure(Infrastructure::Shamir);
        let b = VaultConfiguration::new(Logic::Timelock)
            .with_infrastructure(Infrastructure::Shamir)
            .with_infrastructure(Infrastructure::Nostr);
        assert_eq!(a, b);
    }
}
