//! # Compatibility Rule Data
//!
//! The conflict, requirement, and redundancy graph consulted by the
//! [`CompatibilityEngine`](super::CompatibilityEngine). Rules are plain data:
//! the built-in set can be replaced by one loaded from JSON without touching
//! evaluation code.
//!
//! Symmetric relations (infrastructure conflicts, logic incompatibility and
//! redundancy) are stored once per unordered pair and looked up in both
//! directions.

use super::options::{Infrastructure, Logic, Modifier, OptionRef};
use crate::error::{VaultError, VaultResult};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Two infrastructure options that cannot coexist, or that duplicate each other
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfrastructurePair {
    pub a: Infrastructure,
    pub b: Infrastructure,
    pub reason: String,
}

impl InfrastructurePair {
    fn matches(&self, x: Infrastructure, y: Infrastructure) -> bool {
        (self.a == x && self.b == y) || (self.a == y && self.b == x)
    }
}

/// Two logic kinds that are unsafe together, or wasteful together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicPair {
    pub a: Logic,
    pub b: Logic,
    pub reason: String,
}

impl LogicPair {
    fn matches(&self, x: Logic, y: Logic) -> bool {
        (self.a == x && self.b == y) || (self.a == y && self.b == x)
    }
}

/// Infrastructure prerequisites of a logic kind.
///
/// `all_of` is a hard AND; `any_of` is satisfied by a single member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicRequirement {
    pub logic: Logic,
    #[serde(default)]
    pub all_of: Vec<Infrastructure>,
    #[serde(default)]
    pub any_of: Vec<Infrastructure>,
    pub reason: String,
}

/// A modifier that cannot be combined with an infrastructure or logic option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierConflict {
    pub modifier: Modifier,
    pub with: OptionRef,
    pub reason: String,
}

/// A modifier that should travel with a partner modifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierPairing {
    pub modifier: Modifier,
    pub partner: Modifier,
    pub reason: String,
}

/// Structural signals feeding the advisory recommendation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationSignals {
    /// Infrastructure that keeps a copy away from the owner's device
    pub offsite: Vec<Infrastructure>,
    /// Infrastructure that splits backup material between holders
    pub split: Vec<Infrastructure>,
    /// Infrastructure able to carry liveness heartbeats
    pub heartbeat: Vec<Infrastructure>,
    /// Logic kinds that act as a challenge gate
    pub challenge: Vec<Logic>,
    pub pairings: Vec<ModifierPairing>,
}

/// Complete declarative rule set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    pub infrastructure_conflicts: Vec<InfrastructurePair>,
    #[serde(default)]
    pub infrastructure_redundancies: Vec<InfrastructurePair>,
    pub requirements: Vec<LogicRequirement>,
    pub logic_incompatibilities: Vec<LogicPair>,
    #[serde(default)]
    pub logic_redundancies: Vec<LogicPair>,
    pub modifier_conflicts: Vec<ModifierConflict>,
    #[serde(default)]
    pub gate_only: Vec<Logic>,
    pub signals: RecommendationSignals,
}

lazy_static! {
    /// Built-in rules, checked for consistency by the test suite
    pub static ref DEFAULT_RULES: RuleSet = RuleSet::builtin();
}

impl Default for RuleSet {
    fn default() -> Self {
        DEFAULT_RULES.clone()
    }
}

fn infra_pair(a: Infrastructure, b: Infrastructure, reason: &str) -> InfrastructurePair {
    InfrastructurePair {
        a,
        b,
        reason: reason.to_string(),
    }
}

fn logic_pair(a: Logic, b: Logic, reason: &str) -> LogicPair {
    LogicPair {
        a,
        b,
        reason: reason.to_string(),
    }
}

impl RuleSet {
    /// The rules shipped with the crate
    pub fn builtin() -> Self {
        use Infrastructure::*;
        use Logic::*;

        Self {
            infrastructure_conflicts: vec![
                infra_pair(
                    Airgap,
                    Nostr,
                    "an air-gapped setup cannot publish backups or heartbeats to relays",
                ),
                infra_pair(
                    Airgap,
                    Cloud,
                    "an air-gapped setup cannot synchronise backups to cloud storage",
                ),
            ],
            infrastructure_redundancies: vec![infra_pair(
                Shamir,
                MultisigDistribution,
                "distributed cosigner keys already spread recovery material across holders",
            )],
            requirements: vec![
                LogicRequirement {
                    logic: MultisigDecay,
                    all_of: vec![MultisigDistribution],
                    any_of: vec![],
                    reason: "decaying thresholds need cosigner keys handed to their holders"
                        .to_string(),
                },
                LogicRequirement {
                    logic: SocialRecovery,
                    all_of: vec![],
                    any_of: vec![Shamir, MultisigDistribution],
                    reason: "trusted contacts need shares or cosigner keys to act on".to_string(),
                },
                LogicRequirement {
                    logic: Oracle,
                    all_of: vec![Nostr],
                    any_of: vec![],
                    reason: "oracle attestations are delivered as Nostr events".to_string(),
                },
            ],
            logic_incompatibilities: vec![logic_pair(
                Oracle,
                Timelock,
                "an immutable time lock cannot be released early by an oracle attestation",
            )],
            logic_redundancies: vec![
                logic_pair(
                    Timelock,
                    DeadManSwitch,
                    "both are time-based triggers; the later one never matters",
                ),
                logic_pair(
                    MultisigDecay,
                    SocialRecovery,
                    "both are threshold schemes over the same set of holders",
                ),
            ],
            modifier_conflicts: vec![
                ModifierConflict {
                    modifier: Modifier::Staggered,
                    with: OptionRef::Logic(SocialRecovery),
                    reason: "a social recovery quorum releases everything in one step".to_string(),
                },
                ModifierConflict {
                    modifier: Modifier::Duress,
                    with: OptionRef::Logic(Timelock),
                    reason: "a pure time lock has no alternate path to route duress to"
                        .to_string(),
                },
                ModifierConflict {
                    modifier: Modifier::Decoy,
                    with: OptionRef::Infrastructure(Cloud),
                    reason: "cloud-synchronised metadata reveals which wallet is the decoy"
                        .to_string(),
                },
            ],
            gate_only: vec![Challenge],
            signals: RecommendationSignals {
                offsite: vec![Nostr, Cloud],
                split: vec![Shamir, MultisigDistribution],
                heartbeat: vec![Nostr],
                challenge: vec![Challenge],
                pairings: vec![ModifierPairing {
                    modifier: Modifier::Decoy,
                    partner: Modifier::Duress,
                    reason: "a decoy only helps if a duress passphrase routes an attacker to it"
                        .to_string(),
                }],
            },
        }
    }

    /// Load a rule set from JSON, rejecting internally inconsistent tables
    pub fn from_json(json: &str) -> VaultResult<Self> {
        let rules: RuleSet = serde_json::from_str(json)?;
        let issues = rules.consistency_issues();
        if !issues.is_empty() {
            return Err(VaultError::config(format!(
                "inconsistent rule set: {}",
                issues.join("; ")
            )));
        }
        Ok(rules)
    }

    pub fn infrastructure_conflict(
        &self,
        a: Infrastructure,
        b: Infrastructure,
    ) -> Option<&InfrastructurePair> {
        self.infrastructure_conflicts.iter().find(|rule| rule.matches(a, b))
    }

    pub fn infrastructure_redundancy(
        &self,
        a: Infrastructure,
        b: Infrastructure,
    ) -> Option<&InfrastructurePair> {
        self.infrastructure_redundancies
            .iter()
            .find(|rule| rule.matches(a, b))
    }

    pub fn requirements_for(&self, logic: Logic) -> impl Iterator<Item = &LogicRequirement> {
        self.requirements.iter().filter(move |rule| rule.logic == logic)
    }

    pub fn logic_incompatibility(&self, a: Logic, b: Logic) -> Option<&LogicPair> {
        self.logic_incompatibilities
            .iter()
            .find(|rule| rule.matches(a, b))
    }

    pub fn logic_redundancy(&self, a: Logic, b: Logic) -> Option<&LogicPair> {
        self.logic_redundancies.iter().find(|rule| rule.matches(a, b))
    }

    pub fn modifier_conflicts(&self, modifier: Modifier) -> impl Iterator<Item = &ModifierConflict> {
        self.modifier_conflicts
            .iter()
            .filter(move |rule| rule.modifier == modifier)
    }

    pub fn is_gate_only(&self, logic: Logic) -> bool {
        self.gate_only.contains(&logic)
    }

    /// Cross-check the tables against each other.
    ///
    /// Returns a human-readable line per inconsistency; empty means consistent.
    pub fn consistency_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        let mut seen = BTreeSet::new();
        for rule in &self.infrastructure_conflicts {
            if rule.a == rule.b {
                issues.push(format!("{} is declared to conflict with itself", rule.a));
            }
            if !seen.insert((rule.a.min(rule.b), rule.a.max(rule.b))) {
                issues.push(format!("conflict {} / {} is declared twice", rule.a, rule.b));
            }
            if self.infrastructure_redundancy(rule.a, rule.b).is_some() {
                issues.push(format!(
                    "{} / {} is declared both conflicting and redundant",
                    rule.a, rule.b
                ));
            }
        }

        let mut seen = BTreeSet::new();
        for rule in self
            .logic_incompatibilities
            .iter()
            .chain(self.logic_redundancies.iter())
        {
            if !seen.insert((rule.a.min(rule.b), rule.a.max(rule.b))) {
                issues.push(format!(
                    "logic pair {} / {} appears more than once across incompatibility and redundancy tables",
                    rule.a, rule.b
                ));
            }
        }

        for rule in &self.requirements {
            for (i, x) in rule.all_of.iter().enumerate() {
                for y in &rule.all_of[i + 1..] {
                    if self.infrastructure_conflict(*x, *y).is_some() {
                        issues.push(format!(
                            "{} requires both {} and {}, which conflict",
                            rule.logic, x, y
                        ));
                    }
                }
            }
            if !rule.any_of.is_empty()
                && rule.any_of.iter().all(|candidate| {
                    rule.all_of
                        .iter()
                        .any(|required| self.infrastructure_conflict(*candidate, *required).is_some())
                })
            {
                issues.push(format!(
                    "no alternative required by {} is compatible with its mandatory infrastructure",
                    rule.logic
                ));
            }
        }

        for rule in &self.modifier_conflicts {
            if let OptionRef::Infrastructure(Infrastructure::Local) = rule.with {
                issues.push(format!(
                    "{} conflicts with local storage, which is always present",
                    rule.modifier
                ));
            }
        }

        for pairing in &self.signals.pairings {
            if pairing.modifier == pairing.partner {
                issues.push(format!("{} is paired with itself", pairing.modifier));
            }
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_rules_are_consistent() {
        assert!(RuleSet::builtin().consistency_issues().is_empty());
    }

    #[test]
    fn test_conflicts_are_symmetric() {
        let rules = RuleSet::builtin();
        for rule in &rules.infrastructure_conflicts {
            assert!(rules.infrastructure_conflict(rule.a, rule.b).is_some());
            assert!(rules.infrastructure_conflict(rule.b, rule.a).is_some());
        }
        assert!(rules.logic_incompatibility(Logic::Timelock, Logic::Oracle).is_some());
        assert!(rules.logic_redundancy(Logic::DeadManSwitch, Logic::Timelock).is_some());
    }

    #[test]
    fn test_json_round_trip() {
        let json = serde_json::to_string(&RuleSet::builtin()).unwrap();
        let loaded = RuleSet::from_json(&json).unwrap();
        assert_eq!(loaded, RuleSet::builtin());
    }

    #[test]
    fn test_inconsistent_rules_are_rejected() {
        let mut rules = RuleSet::builtin();
        rules.logic_redundancies.push(logic_pair(
            Logic::Timelock,
            Logic::Oracle,
            "drifted",
        ));
        rules.requirements.push(LogicRequirement {
            logic: Logic::Timelock,
            all_of: vec![Infrastructure::Airgap, Infrastructure::Cloud],
            any_of: vec![],
            reason: "drifted".to_string(),
        });

        let issues = rules.consistency_issues();
        assert_eq!(issues.len(), 2);

        let json = serde_json::to_string(&rules).unwrap();
        assert!(matches!(
            RuleSet::from_json(&json),
            Err(VaultError::Configuration { .. })
        ));
    }
}
