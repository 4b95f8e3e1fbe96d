//! # Heirvault: Bitcoin Inheritance Vault Engine
//!
//! Core library for defining Bitcoin inheritance vaults, keeping them
//! encrypted at rest, and reminding owners to check in before their vault is
//! released to heirs. The engine never moves funds: policies are compiled,
//! signed and broadcast by external tooling.
//!
//! - [`compat`]: configuration compatibility rules and presets
//! - [`vaults`]: vault record, encrypted envelope, export formats
//! - [`storage`]: paired envelope / metadata persistence
//! - [`lifecycle`]: check-in urgency, cooldowns, and the monitor
//! - [`services`]: notification collaborator and the vault manager

pub mod compat;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod services;
pub mod storage;
pub mod utils;
pub mod vaults;

// Re-export commonly used types
pub use compat::{CompatibilityEngine, ValidationResult, VaultConfiguration};
pub use error::{NotificationError, VaultError, VaultResult};
pub use lifecycle::{CheckInMonitor, MonitorConfig, MonitorHandle, VaultStatus};
pub use services::{Notifier, VaultManager};
pub use storage::VaultStore;
pub use vaults::{EncryptedVaultEnvelope, EnvelopeCipher, VaultData, VaultId, VaultMetadata};
