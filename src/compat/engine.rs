//! # Configuration Compatibility Engine
//!
//! Validates a draft [`VaultConfiguration`] against a [`RuleSet`] and answers
//! incremental "can this option be added" queries.
//!
//! ## Passes
//!
//! ```text
//! config ──► infrastructure conflicts ─┐
//!        ──► logic requirements ───────┤
//!        ──► logic combinations ───────┼──► dedup by rule code ──► recommendations
//!        ──► modifier conflicts ───────┘
//! ```
//!
//! The engine is a pure function of its input: no I/O, no hidden state. The
//! same configuration always yields the same ordered result.

use super::options::{Infrastructure, Logic, Modifier, OptionKind, OptionRef, VaultConfiguration};
use super::rules::{RuleSet, DEFAULT_RULES};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Rule category behind a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    InfrastructureConflict,
    MissingInfrastructure,
    MissingAnyInfrastructure,
    GateOnlyLogic,
    LogicIncompatible,
    ModifierConflict,
    RedundantInfrastructure,
    RedundantLogic,
    DuplicateGate,
}

/// Identity of a finding, used for deduplication
pub type RuleCode = (IssueKind, Vec<OptionRef>);

/// An error or warning produced by a rule pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub message: String,
    /// Options involved, sorted
    pub options: Vec<OptionRef>,
}

impl Issue {
    fn new(kind: IssueKind, message: String, options: impl IntoIterator<Item = OptionRef>) -> Self {
        let options: BTreeSet<OptionRef> = options.into_iter().collect();
        Self {
            kind,
            message,
            options: options.into_iter().collect(),
        }
    }

    pub fn code(&self) -> RuleCode {
        (self.kind, self.options.clone())
    }

    /// Whether this finding names the given option
    pub fn names(&self, option: OptionRef) -> bool {
        self.options.contains(&option)
    }
}

/// Advisory signal category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    SinglePointOfFailure,
    MissingHeartbeat,
    NoChallengeGate,
    UnpairedModifier,
}

/// Informational suggestion. Never blocks acceptance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub message: String,
    pub suggested: Vec<OptionRef>,
}

/// Outcome of validating a configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
    pub recommendations: Vec<Recommendation>,
}

impl ValidationResult {
    pub fn has_recommendation(&self, kind: RecommendationKind) -> bool {
        self.recommendations.iter().any(|rec| rec.kind == kind)
    }

    /// All error messages joined for display
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|issue| issue.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// An option placed into a specific slot of the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "slot", content = "option", rename_all = "snake_case")]
pub enum OptionChoice {
    Infrastructure(Infrastructure),
    PrimaryLogic(Logic),
    Gate(Logic),
    Modifier(Modifier),
}

impl OptionChoice {
    pub fn kind(&self) -> OptionKind {
        match self {
            OptionChoice::Infrastructure(_) => OptionKind::Infrastructure,
            OptionChoice::PrimaryLogic(_) => OptionKind::PrimaryLogic,
            OptionChoice::Gate(_) => OptionKind::Gate,
            OptionChoice::Modifier(_) => OptionKind::Modifier,
        }
    }

    pub fn option(&self) -> OptionRef {
        match *self {
            OptionChoice::Infrastructure(infra) => infra.into(),
            OptionChoice::PrimaryLogic(logic) | OptionChoice::Gate(logic) => logic.into(),
            OptionChoice::Modifier(modifier) => modifier.into(),
        }
    }

    /// Hypothetical configuration with this choice applied
    fn apply(&self, config: &VaultConfiguration) -> VaultConfiguration {
        let mut next = config.clone();
        match *self {
            OptionChoice::Infrastructure(infra) => {
                next.infrastructure.insert(infra);
            }
            OptionChoice::PrimaryLogic(logic) => {
                next.primary_logic = logic;
                next.gates.remove(&logic);
            }
            OptionChoice::Gate(logic) => {
                next.gates.insert(logic);
            }
            OptionChoice::Modifier(modifier) => {
                next.modifiers.insert(modifier);
            }
        }
        next
    }
}

/// Answer to an incremental "can this option be added" query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanAdd {
    pub can_add: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CanAdd {
    fn allowed() -> Self {
        Self {
            can_add: true,
            reason: None,
        }
    }

    fn blocked(reason: impl Into<String>) -> Self {
        Self {
            can_add: false,
            reason: Some(reason.into()),
        }
    }
}

/// Availability of one option in one slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionAvailability {
    pub option: OptionRef,
    pub can_add: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Per-category option availability for progressive disclosure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableOptions {
    pub infrastructure: Vec<OptionAvailability>,
    pub primary_logic: Vec<OptionAvailability>,
    pub gates: Vec<OptionAvailability>,
    pub modifiers: Vec<OptionAvailability>,
}

/// Rule evaluator over a swappable [`RuleSet`]
#[derive(Debug, Clone)]
pub struct CompatibilityEngine {
    rules: Arc<RuleSet>,
}

impl Default for CompatibilityEngine {
    fn default() -> Self {
        Self::new(DEFAULT_RULES.clone())
    }
}

impl CompatibilityEngine {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules: Arc::new(rules),
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Validate a configuration.
    ///
    /// The local option is injected before evaluation. Errors and warnings are
    /// deduplicated by rule code, keeping the first occurrence.
    pub fn validate(&self, config: &VaultConfiguration) -> ValidationResult {
        let config = config.canonical();
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        self.check_infrastructure(&config, &mut errors, &mut warnings);
        self.check_requirements(&config, &mut errors);
        self.check_logic(&config, &mut errors, &mut warnings);
        self.check_modifiers(&config, &mut errors);

        let errors = dedup_by_code(errors);
        let warnings = dedup_by_code(warnings);
        let recommendations = self.recommend(&config);

        ValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
            recommendations,
        }
    }

    fn check_infrastructure(
        &self,
        config: &VaultConfiguration,
        errors: &mut Vec<Issue>,
        warnings: &mut Vec<Issue>,
    ) {
        // Both directions are visited; dedup collapses the mirrored finding.
        for &a in &config.infrastructure {
            for &b in &config.infrastructure {
                if a == b {
                    continue;
                }
                if let Some(rule) = self.rules.infrastructure_conflict(a, b) {
                    errors.push(Issue::new(
                        IssueKind::InfrastructureConflict,
                        format!("{} conflicts with {}: {}", a, b, rule.reason),
                        [OptionRef::from(a), OptionRef::from(b)],
                    ));
                }
                if let Some(rule) = self.rules.infrastructure_redundancy(a, b) {
                    warnings.push(Issue::new(
                        IssueKind::RedundantInfrastructure,
                        format!("{} is redundant with {}: {}", a, b, rule.reason),
                        [OptionRef::from(a), OptionRef::from(b)],
                    ));
                }
            }
        }
    }

    fn check_requirements(&self, config: &VaultConfiguration, errors: &mut Vec<Issue>) {
        for logic in config.all_logic() {
            for rule in self.rules.requirements_for(logic) {
                for required in &rule.all_of {
                    if !config.infrastructure.contains(required) {
                        errors.push(Issue::new(
                            IssueKind::MissingInfrastructure,
                            format!("{} requires {}: {}", logic, required, rule.reason),
                            [OptionRef::from(logic), OptionRef::from(*required)],
                        ));
                    }
                }

                if !rule.any_of.is_empty()
                    && !rule.any_of.iter().any(|option| config.infrastructure.contains(option))
                {
                    let names: Vec<&str> = rule.any_of.iter().map(|option| option.as_str()).collect();
                    errors.push(Issue::new(
                        IssueKind::MissingAnyInfrastructure,
                        format!(
                            "{} requires one of {}: {}",
                            logic,
                            names.join(", "),
                            rule.reason
                        ),
                        std::iter::once(OptionRef::from(logic))
                            .chain(rule.any_of.iter().map(|option| OptionRef::from(*option))),
                    ));
                }
            }
        }
    }

    fn check_logic(
        &self,
        config: &VaultConfiguration,
        errors: &mut Vec<Issue>,
        warnings: &mut Vec<Issue>,
    ) {
        let primary = config.primary_logic;
        if self.rules.is_gate_only(primary) {
            errors.push(Issue::new(
                IssueKind::GateOnlyLogic,
                format!("{} can only be used as an additional gate", primary),
                [OptionRef::from(primary)],
            ));
        }
        if config.gates.contains(&primary) {
            warnings.push(Issue::new(
                IssueKind::DuplicateGate,
                format!("{} is both the primary logic and a gate", primary),
                [OptionRef::from(primary)],
            ));
        }

        let logic: BTreeSet<Logic> = config.all_logic().collect();
        for &a in &logic {
            for &b in &logic {
                if a == b {
                    continue;
                }
                if let Some(rule) = self.rules.logic_incompatibility(a, b) {
                    errors.push(Issue::new(
                        IssueKind::LogicIncompatible,
                        format!("{} is incompatible with {}: {}", a, b, rule.reason),
                        [OptionRef::from(a), OptionRef::from(b)],
                    ));
                }
                if let Some(rule) = self.rules.logic_redundancy(a, b) {
                    warnings.push(Issue::new(
                        IssueKind::RedundantLogic,
                        format!("{} is redundant with {}: {}", a, b, rule.reason),
                        [OptionRef::from(a), OptionRef::from(b)],
                    ));
                }
            }
        }
    }

    fn check_modifiers(&self, config: &VaultConfiguration, errors: &mut Vec<Issue>) {
        for &modifier in &config.modifiers {
            for rule in self.rules.modifier_conflicts(modifier) {
                if config.contains(rule.with) {
                    errors.push(Issue::new(
                        IssueKind::ModifierConflict,
                        format!("{} cannot be combined with {}: {}", modifier, rule.with, rule.reason),
                        [OptionRef::from(modifier), rule.with],
                    ));
                }
            }
        }
    }

    fn recommend(&self, config: &VaultConfiguration) -> Vec<Recommendation> {
        let signals = &self.rules.signals;
        let has_any = |options: &[Infrastructure]| {
            options.iter().any(|option| config.infrastructure.contains(option))
        };
        let mut recommendations = Vec::new();

        if !has_any(&signals.offsite) && !has_any(&signals.split) {
            recommendations.push(Recommendation {
                kind: RecommendationKind::SinglePointOfFailure,
                message: "Only local storage holds this vault; add an off-site or split backup"
                    .to_string(),
                suggested: signals
                    .offsite
                    .iter()
                    .chain(signals.split.iter())
                    .map(|option| OptionRef::from(*option))
                    .collect(),
            });
        }

        if config.uses_logic(Logic::DeadManSwitch) && !has_any(&signals.heartbeat) {
            recommendations.push(Recommendation {
                kind: RecommendationKind::MissingHeartbeat,
                message: "A dead man's switch works best with infrastructure that can carry check-in heartbeats"
                    .to_string(),
                suggested: signals.heartbeat.iter().map(|option| OptionRef::from(*option)).collect(),
            });
        }

        if !signals.challenge.iter().any(|gate| config.gates.contains(gate)) {
            recommendations.push(Recommendation {
                kind: RecommendationKind::NoChallengeGate,
                message: "Consider a challenge gate so heirs must prove knowledge before release"
                    .to_string(),
                suggested: signals.challenge.iter().map(|gate| OptionRef::from(*gate)).collect(),
            });
        }

        for pairing in &signals.pairings {
            if config.modifiers.contains(&pairing.modifier)
                && !config.modifiers.contains(&pairing.partner)
            {
                recommendations.push(Recommendation {
                    kind: RecommendationKind::UnpairedModifier,
                    message: format!(
                        "{} without {}: {}",
                        pairing.modifier, pairing.partner, pairing.reason
                    ),
                    suggested: vec![pairing.partner.into()],
                });
            }
        }

        recommendations
    }

    /// Check whether adding an option introduces an error that names it.
    ///
    /// Errors already present in the current configuration are ignored, so a
    /// draft that is invalid for unrelated reasons can still grow.
    pub fn can_add(&self, config: &VaultConfiguration, choice: OptionChoice) -> CanAdd {
        let config = config.canonical();
        if let OptionChoice::Gate(logic) = choice {
            if logic == config.primary_logic {
                return CanAdd::blocked(format!("{} is already the primary logic", logic));
            }
        }

        let baseline: BTreeSet<RuleCode> =
            self.validate(&config).errors.iter().map(Issue::code).collect();
        let option = choice.option();
        let hypothetical = self.validate(&choice.apply(&config));

        match hypothetical
            .errors
            .iter()
            .find(|issue| issue.names(option) && !baseline.contains(&issue.code()))
        {
            Some(issue) => CanAdd::blocked(issue.message.clone()),
            None => CanAdd::allowed(),
        }
    }

    /// Availability of every known option, per category
    pub fn available_options(&self, config: &VaultConfiguration) -> AvailableOptions {
        let check = |choice: OptionChoice| {
            let answer = self.can_add(config, choice);
            OptionAvailability {
                option: choice.option(),
                can_add: answer.can_add,
                reason: answer.reason,
            }
        };

        AvailableOptions {
            infrastructure: Infrastructure::ALL
                .iter()
                .map(|option| check(OptionChoice::Infrastructure(*option)))
                .collect(),
            primary_logic: Logic::ALL
                .iter()
                .map(|logic| check(OptionChoice::PrimaryLogic(*logic)))
                .collect(),
            gates: Logic::ALL
                .iter()
                .filter(|logic| **logic != config.primary_logic)
                .map(|logic| check(OptionChoice::Gate(*logic)))
                .collect(),
            modifiers: Modifier::ALL
                .iter()
                .map(|modifier| check(OptionChoice::Modifier(*modifier)))
                .collect(),
        }
    }
}

fn dedup_by_code(issues: Vec<Issue>) -> Vec<Issue> {
    let mut seen = BTreeSet::new();
    issues
        .into_iter()
        .filter(|issue| seen.insert(issue.code()))
        .collect()
}

/// Validate against the built-in rules
pub fn validate(config: &VaultConfiguration) -> ValidationResult {
    CompatibilityEngine::default().validate(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use Infrastructure::*;

    fn engine() -> CompatibilityEngine {
        CompatibilityEngine::default()
    }

    #[test]
    fn test_multisig_decay_requires_distribution() {
        let config = VaultConfiguration::new(Logic::MultisigDecay);
        let result = engine().validate(&config);

        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        let error = &result.errors[0];
        assert_eq!(error.kind, IssueKind::MissingInfrastructure);
        assert!(error.names(MultisigDistribution.into()));
        assert!(error.message.contains("multisig_distribution"));
    }

    #[test]
    fn test_dead_man_switch_with_offsite_backup() {
        let config = VaultConfiguration::new(Logic::DeadManSwitch)
            .with_infrastructure(Nostr)
            .with_gate(Logic::Challenge)
            .with_modifier(Modifier::Staggered);
        let result = engine().validate(&config);

        assert!(result.valid);
        assert!(result.errors.is_empty());
        assert!(!result.has_recommendation(RecommendationKind::SinglePointOfFailure));
        assert!(!result.has_recommendation(RecommendationKind::MissingHeartbeat));
        assert!(!result.has_recommendation(RecommendationKind::NoChallengeGate));
    }

    #[test]
    fn test_validation_is_deterministic() {
        let config = VaultConfiguration::new(Logic::Oracle)
            .with_infrastructure(Airgap)
            .with_infrastructure(Cloud)
            .with_gate(Logic::Timelock)
            .with_gate(Logic::DeadManSwitch)
            .with_modifier(Modifier::Duress)
            .with_modifier(Modifier::Decoy);
        let first = engine().validate(&config);
        let second = engine().validate(&config);
        assert_eq!(first, second);
        assert!(!first.valid);
    }

    #[test]
    fn test_conflicting_pair_reported_once_naming_both() {
        let rules = RuleSet::builtin();
        for rule in &rules.infrastructure_conflicts {
            let forward = VaultConfiguration::new(Logic::Timelock)
                .with_infrastructure(rule.a)
                .with_infrastructure(rule.b);
            let result = engine().validate(&forward);
            let conflicts: Vec<_> = result
                .errors
                .iter()
                .filter(|issue| issue.kind == IssueKind::InfrastructureConflict)
                .collect();
            assert_eq!(conflicts.len(), 1, "{} / {}", rule.a, rule.b);
            assert!(conflicts[0].names(rule.a.into()));
            assert!(conflicts[0].names(rule.b.into()));
        }
    }

    #[test]
    fn test_incompatible_logic_is_error_and_redundant_is_warning() {
        let unsafe_combo = VaultConfiguration::new(Logic::Oracle)
            .with_infrastructure(Nostr)
            .with_gate(Logic::Timelock);
        let result = engine().validate(&unsafe_combo);
        assert!(result
            .errors
            .iter()
            .any(|issue| issue.kind == IssueKind::LogicIncompatible));

        let wasteful = VaultConfiguration::new(Logic::Timelock)
            .with_infrastructure(Nostr)
            .with_gate(Logic::DeadManSwitch);
        let result = engine().validate(&wasteful);
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].kind, IssueKind::RedundantLogic);
    }

    #[test]
    fn test_requires_any_is_satisfied_by_one_member() {
        let missing = VaultConfiguration::new(Logic::SocialRecovery);
        let result = engine().validate(&missing);
        assert_eq!(result.errors[0].kind, IssueKind::MissingAnyInfrastructure);

        let satisfied = VaultConfiguration::new(Logic::SocialRecovery).with_infrastructure(Shamir);
        assert!(engine().validate(&satisfied).valid);
    }

    #[test]
    fn test_challenge_is_gate_only() {
        let result = engine().validate(&VaultConfiguration::new(Logic::Challenge));
        assert!(result
            .errors
            .iter()
            .any(|issue| issue.kind == IssueKind::GateOnlyLogic));
    }

    #[test]
    fn test_recommendations_never_block() {
        let config = VaultConfiguration::new(Logic::DeadManSwitch).with_modifier(Modifier::Decoy);
        let result = engine().validate(&config);

        assert!(result.valid);
        assert!(result.has_recommendation(RecommendationKind::SinglePointOfFailure));
        assert!(result.has_recommendation(RecommendationKind::MissingHeartbeat));
        assert!(result.has_recommendation(RecommendationKind::NoChallengeGate));
        assert!(result.has_recommendation(RecommendationKind::UnpairedModifier));
    }

    #[test]
    fn test_can_add_reports_conflict_reason() {
        let config = VaultConfiguration::new(Logic::DeadManSwitch).with_infrastructure(Nostr);

        let answer = engine().can_add(&config, OptionChoice::Infrastructure(Airgap));
        assert!(!answer.can_add);
        assert!(answer.reason.unwrap().contains("airgap"));

        let answer = engine().can_add(&config, OptionChoice::Infrastructure(Shamir));
        assert!(answer.can_add);
        assert!(answer.reason.is_none());
    }

    #[test]
    fn test_can_add_ignores_preexisting_errors() {
        // Already broken by the missing distribution requirement.
        let config = VaultConfiguration::new(Logic::MultisigDecay);
        assert!(engine().can_add(&config, OptionChoice::Gate(Logic::Challenge)).can_add);
        assert!(engine()
            .can_add(&config, OptionChoice::Infrastructure(MultisigDistribution))
            .can_add);
    }

    #[test]
    fn test_available_options() {
        let config = VaultConfiguration::new(Logic::Timelock).with_infrastructure(Cloud);
        let options = engine().available_options(&config);

        assert_eq!(options.infrastructure.len(), Infrastructure::ALL.len());
        assert_eq!(options.gates.len(), Logic::ALL.len() - 1);
        assert!(options
            .gates
            .iter()
            .all(|entry| entry.option != OptionRef::Logic(Logic::Timelock)));

        let lookup = |list: &[OptionAvailability], option: OptionRef| {
            list.iter().find(|entry| entry.option == option).unwrap().can_add
        };
        assert!(!lookup(&options.infrastructure, Airgap.into()));
        assert!(!lookup(&options.gates, Logic::Oracle.into()));
        assert!(!lookup(&options.modifiers, Modifier::Decoy.into()));
        assert!(!lookup(&options.modifiers, Modifier::Duress.into()));
        assert!(lookup(&options.modifiers, Modifier::Staggered.into()));
        assert!(!lookup(&options.primary_logic, Logic::Challenge.into()));
    }
}
