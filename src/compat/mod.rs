//! # Compatibility Module
//!
//! Validation of draft vault configurations before anything is persisted.
//!
//! ## Components
//!
//! - **Options**: infrastructure, logic, and modifier vocabulary
//! - **Rules**: declarative conflict / requirement / redundancy graph
//! - **Engine**: rule evaluation, incremental `can_add` queries
//! - **Presets**: named bundles used as shortcuts

pub mod engine;
pub mod options;
pub mod presets;
pub mod rules;

pub use engine::{
    validate, AvailableOptions, CanAdd, CompatibilityEngine, Issue, IssueKind, OptionAvailability,
    OptionChoice, Recommendation, RecommendationKind, ValidationResult,
};
pub use options::{Infrastructure, Logic, Modifier, OptionKind, OptionRef, VaultConfiguration};
pub use presets::Preset;
pub use rules::RuleSet;
