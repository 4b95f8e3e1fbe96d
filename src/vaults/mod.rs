//! # Vaults Module
//!
//! The vault record and its protected forms.
//!
//! ## Layers
//!
//! - **Record**: plaintext [`VaultData`] and its unencrypted [`VaultMetadata`] projection
//! - **Envelope**: passphrase-based authenticated encryption of a record
//! - **Transfer**: export documents and compact QR tokens

pub mod envelope;
pub mod record;
pub mod transfer;

pub use envelope::{derive_key, EncryptedVaultEnvelope, EnvelopeCipher, KdfParams};
pub use record::{
    Beneficiary, BeneficiaryContact, KeyDescriptor, KeyRole, Threshold, Timelock, VaultData,
    VaultId, VaultMetadata,
};
pub use transfer::{export_to_file, import_from_file, ExportDocument, QrPayload, QrToken};
