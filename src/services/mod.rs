//! # Services Module
//!
//! Application-facing services for the Heirvault engine.
//!
//! ## Components
//!
//! - **Notifier**: outbound email collaborator (HTTP provider or log-only)
//! - **Vault Manager**: create / load / update / delete / export / import operations

pub mod notifier;
pub mod vault_manager;

pub use notifier::{DeliveryReceipt, HttpEmailSender, LogNotifier, Notifier, OutboundEmail};
pub use vault_manager::VaultManager;
