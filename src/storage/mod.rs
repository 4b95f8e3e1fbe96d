//! # Storage Module
//!
//! Pluggable key-value backends and the paired envelope/metadata store built
//! on top of them.

pub mod backend;
pub mod store;

pub use backend::{FileBackend, KeyValueBackend, MemoryBackend};
pub use store::VaultStore;
