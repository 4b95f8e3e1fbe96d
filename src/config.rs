//! # Configuration Constants
//!
//! Compile-time defaults for the Heirvault engine, plus the runtime
//! [`Settings`] loaded from the environment.

use std::path::PathBuf;
use std::time::Duration;

/// Key derivation parameters
///
/// Argon2id is used instead of an iteration-count KDF. The defaults below cost
/// considerably more than 600,000 rounds of PBKDF2-SHA256 on commodity hardware,
/// which matters because vault keys come from user-chosen passphrases.
pub mod kdf {
    /// KDF identifier written into every envelope
    pub const ALGORITHM: &str = "argon2id";

    /// Memory cost in KiB (64 MiB)
    pub const MEMORY_KIB: u32 = 65_536;

    /// Number of passes over memory
    pub const ITERATIONS: u32 = 3;

    /// Degree of parallelism (lanes)
    pub const PARALLELISM: u32 = 4;

    /// Derived key length in bytes (AES-256)
    pub const KEY_LENGTH: usize = 32;

    /// Salt length in bytes, fresh per encryption
    pub const SALT_LENGTH: usize = 16;

    /// Lowest memory cost accepted for new envelopes (OWASP Argon2id floor)
    pub const MIN_MEMORY_KIB: u32 = 19_456;

    /// Lowest pass count accepted for new envelopes
    pub const MIN_ITERATIONS: u32 = 2;

    /// Highest memory cost accepted when reading an envelope (1 GiB)
    pub const MAX_MEMORY_KIB: u32 = 1_048_576;

    /// Highest pass count accepted when reading an envelope
    pub const MAX_ITERATIONS: u32 = 64;

    /// Highest parallelism accepted when reading an envelope
    pub const MAX_PARALLELISM: u32 = 16;
}

/// Envelope and transfer format constants
pub mod envelope {
    /// Authenticated encryption identifier written into every envelope
    pub const ALGORITHM: &str = "AES-256-GCM";

    /// Current envelope layout version
    pub const FORMAT_VERSION: u32 = 1;

    /// AES-GCM initialization vector length in bytes
    pub const IV_LENGTH: usize = 12;

    /// AES-GCM authentication tag length in bytes
    pub const TAG_LENGTH: usize = 16;

    /// Format tag carried by export documents
    pub const EXPORT_FORMAT: &str = "heirvault-export-v1";

    /// Number of hex characters kept from the SHA-256 export checksum
    pub const CHECKSUM_HEX_LENGTH: usize = 16;

    /// Prefix of compact transfer tokens
    pub const QR_PREFIX: &str = "HV1:";
}

/// Check-in lifecycle parameters
pub mod lifecycle {
    use std::time::Duration;

    /// Days remaining at or below which a vault enters the warning tier
    pub const WARNING_THRESHOLD_DAYS: i64 = 30;

    /// Days remaining at or below which a vault enters the critical tier
    pub const CRITICAL_THRESHOLD_DAYS: i64 = 7;

    /// Minimum spacing of repeated warning notifications
    pub const WARNING_COOLDOWN: Duration = Duration::from_secs(7 * 24 * 3600);

    /// Minimum spacing of repeated critical notifications
    pub const CRITICAL_COOLDOWN: Duration = Duration::from_secs(24 * 3600);

    /// Minimum spacing of repeated expiry notifications to the owner
    pub const EXPIRED_COOLDOWN: Duration = Duration::from_secs(7 * 24 * 3600);

    /// Minimum spacing of repeated expiry notifications to each beneficiary
    pub const BENEFICIARY_COOLDOWN: Duration = Duration::from_secs(7 * 24 * 3600);

    /// Longest check-in interval a vault may declare (about a century)
    pub const MAX_INACTIVITY_DAYS: u32 = 36_500;

    /// Default monitor polling interval
    pub const POLL_INTERVAL: Duration = Duration::from_secs(3600);
}

/// Outbound notification parameters
pub mod notify {
    use std::time::Duration;

    /// Upper bound on a single send, including connection setup
    pub const SEND_TIMEOUT: Duration = Duration::from_secs(10);

    /// Sender used when none is configured
    pub const DEFAULT_FROM: &str = "Heirvault <noreply@heirvault.local>";
}

/// File paths and names
pub mod files {
    /// Directory name under the platform data dir
    pub const DATA_DIR_NAME: &str = "heirvault";

    /// Fallback data directory when no platform data dir is known
    pub const FALLBACK_DATA_DIR: &str = "./.heirvault";
}

/// Environment variable names
pub mod env {
    /// Data directory override
    pub const DATA_DIR: &str = "HEIRVAULT_DATA_DIR";

    /// Email provider endpoint
    pub const MAIL_ENDPOINT: &str = "HEIRVAULT_MAIL_ENDPOINT";

    /// Email provider API key
    pub const MAIL_API_KEY: &str = "HEIRVAULT_MAIL_API_KEY";

    /// Sender address override
    pub const MAIL_FROM: &str = "HEIRVAULT_MAIL_FROM";

    /// Monitor polling interval override, in seconds
    pub const POLL_INTERVAL_SECS: &str = "HEIRVAULT_POLL_INTERVAL_SECS";

    /// Passphrase source for non-interactive CLI use
    pub const PASSPHRASE: &str = "HEIRVAULT_PASSPHRASE";
}

/// Outbound mail provider settings
#[derive(Debug, Clone)]
pub struct MailSettings {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub from: String,
}

/// Runtime settings resolved from the environment
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub mail: Option<MailSettings>,
    pub poll_interval: Duration,
}

impl Settings {
    /// Load settings from environment variables, honouring a `.env` file
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let data_dir = std::env::var(env::DATA_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir());

        let mail = std::env::var(env::MAIL_ENDPOINT).ok().map(|endpoint| MailSettings {
            endpoint,
            api_key: std::env::var(env::MAIL_API_KEY).ok(),
            from: std::env::var(env::MAIL_FROM)
                .unwrap_or_else(|_| notify::DEFAULT_FROM.to_string()),
        });

        let poll_interval = std::env::var(env::POLL_INTERVAL_SECS)
            .ok()
            .and_then(|secs| secs.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(lifecycle::POLL_INTERVAL);

        Self {
            data_dir,
            mail,
            poll_interval,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(files::DATA_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(files::FALLBACK_DATA_DIR))
}
