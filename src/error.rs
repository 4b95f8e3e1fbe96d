//! # Error Types for Heirvault
//!
//! This module provides error handling for configuration validation, envelope
//! cryptography, vault storage, and notification delivery.

use thiserror::Error;

/// Main error type for all vault-related operations
#[derive(Debug, Error)]
pub enum VaultError {
    /// Configuration rejected by the compatibility engine
    #[error("Vault configuration error: {message}")]
    Configuration { message: String },

    /// Vault record failed structural validation
    #[error("Invalid vault record: {message}")]
    InvalidRecord { message: String },

    /// Wrong passphrase or tampered envelope. Deliberately carries no detail.
    #[error("Decryption failed")]
    DecryptionFailed,

    /// Export checksum mismatch, detected before any passphrase is needed
    #[error("Integrity check failed: expected checksum {expected}, computed {actual}")]
    Integrity { expected: String, actual: String },

    /// Unknown format tag, algorithm, KDF, or malformed document
    #[error("Unsupported format: {message}")]
    UnsupportedFormat { message: String },

    /// No vault with this identity exists in the store
    #[error("Vault not found: {vault_id}")]
    NotFound { vault_id: String },

    /// Cryptographic operation failures other than decryption
    #[error("Cryptographic operation failed: {message}")]
    Cryptography { message: String },

    /// Storage backend failures
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// File I/O operations
    #[error("File operation failed: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON processing error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// Generic operation failures with context
    #[error("Operation failed: {operation} - {message}")]
    OperationFailed { operation: String, message: String },
}

/// Result type alias for vault operations
pub type VaultResult<T> = Result<T, VaultError>;

impl VaultError {
    /// Create a configuration error with a message
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an invalid record error
    pub fn record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    /// Create a cryptography error with a message
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Cryptography {
            message: message.into(),
        }
    }

    /// Create an unsupported format error
    pub fn format(message: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a not-found error for a vault identity
    pub fn not_found(vault_id: impl Into<String>) -> Self {
        Self::NotFound {
            vault_id: vault_id.into(),
        }
    }

    /// Create an operation failed error
    pub fn operation(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::OperationFailed {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Check if this error is the expected "vault absent" outcome
    pub fn is_not_found(&self) -> bool {
        matches!(self, VaultError::NotFound { .. })
    }

    /// Check if this error indicates a security issue
    pub fn is_security_critical(&self) -> bool {
        matches!(
            self,
            VaultError::DecryptionFailed
                | VaultError::Integrity { .. }
                | VaultError::Cryptography { .. }
        )
    }
}

/// Notification provider errors
#[derive(Debug, Error)]
pub enum NotificationError {
    /// Provider answered with a non-success status
    #[error("HTTP request failed: {status} - {message}")]
    Http { status: u16, message: String },

    /// Send did not complete within the bounded timeout
    #[error("Request timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// Connection or request construction failure
    #[error("Transport failed: {message}")]
    Transport { message: String },

    /// Provider response could not be understood
    #[error("Invalid provider response: {message}")]
    InvalidResponse { message: String },

    /// No provider configured for outbound mail
    #[error("Notification provider not configured")]
    NotConfigured,
}

/// Result type alias for notification operations
pub type NotificationResult<T> = Result<T, NotificationError>;

impl NotificationError {
    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Check if the next scheduled poll may succeed where this one failed
    pub fn is_retryable(&self) -> bool {
        match self {
            NotificationError::Http { status, .. } => *status == 429 || *status >= 500,
            NotificationError::Timeout { .. } | NotificationError::Transport { .. } => true,
            NotificationError::InvalidResponse { .. } | NotificationError::NotConfigured => false,
        }
    }
}

impl From<reqwest::Error> for NotificationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NotificationError::Timeout {
                seconds: crate::config::notify::SEND_TIMEOUT.as_secs(),
            }
        } else if let Some(status) = err.status() {
            NotificationError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            NotificationError::transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let config_err = VaultError::config("multisig_decay requires multisig_distribution");
        assert!(matches!(config_err, VaultError::Configuration { .. }));

        let crypto_err = VaultError::crypto("Key derivation failed");
        assert!(matches!(crypto_err, VaultError::Cryptography { .. }));
        assert!(crypto_err.is_security_critical());
    }

    #[test]
    fn test_decryption_failure_is_opaque() {
        let err = VaultError::DecryptionFailed;
        assert_eq!(err.to_string(), "Decryption failed");
        assert!(err.is_security_critical());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_error_classification() {
        assert!(VaultError::not_found("abc").is_not_found());

        let integrity = VaultError::Integrity {
            expected: "aa".into(),
            actual: "bb".into(),
        };
        assert!(integrity.is_security_critical());

        assert!(NotificationError::Timeout { seconds: 10 }.is_retryable());
        assert!(NotificationError::Http { status: 503, message: String::new() }.is_retryable());
        assert!(!NotificationError::Http { status: 400, message: String::new() }.is_retryable());
        assert!(!NotificationError::NotConfigured.is_retryable());
    }
}
