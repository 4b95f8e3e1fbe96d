//! # Utility Functions
//!
//! Common helpers used throughout the Heirvault engine.

/// Display formatting helpers
pub mod display {
    /// Shorten a long identifier or address with an ellipsis in the middle
    pub fn format_short(value: &str, prefix_len: usize, suffix_len: usize) -> String {
        let chars: Vec<char> = value.chars().collect();
        if chars.len() <= prefix_len + suffix_len + 3 {
            value.to_string()
        } else {
            let head: String = chars[..prefix_len].iter().collect();
            let tail: String = chars[chars.len() - suffix_len..].iter().collect();
            format!("{}...{}", head, tail)
        }
    }
}

/// Time and duration utilities
pub mod time {
    use chrono::{DateTime, Utc};
    use std::time::Duration;

    /// Format a timestamp for display
    pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
        timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
    }

    /// Format duration in human-readable form
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let days = total_seconds / 86_400;
        let hours = (total_seconds % 86_400) / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if days > 0 {
            format!("{}d {}h", days, hours)
        } else if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else if seconds > 0 || duration.subsec_millis() == 0 {
            format!("{}s", seconds)
        } else {
            format!("{}ms", duration.subsec_millis())
        }
    }
}

/// File system utilities
pub mod fs {
    use crate::error::{VaultError, VaultResult};
    use std::path::Path;

    /// Ensure directory exists, create if it doesn't
    pub async fn ensure_dir_exists(path: &Path) -> VaultResult<()> {
        tokio::fs::create_dir_all(path).await.map_err(|e| {
            VaultError::operation(
                "create_directory",
                format!("Failed to create {}: {}", path.display(), e),
            )
        })
    }

    /// Safe file write with atomic operation
    pub async fn write_file_atomic(path: &Path, content: &[u8]) -> VaultResult<()> {
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, content).await?;
        tokio::fs::rename(&temp_path, path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_short_formatting() {
        let id = "3f2b9c1e-8d4a-4b6f-9e21-7c5d0a1b2c3d";
        let formatted = display::format_short(id, 8, 4);
        assert_eq!(formatted, "3f2b9c1e...2c3d");
        assert_eq!(display::format_short("short", 8, 4), "short");
    }

    #[test]
    fn test_duration_formatting() {
        assert_eq!(time::format_duration(Duration::from_secs(3600)), "1h 0m 0s");
        assert_eq!(time::format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(time::format_duration(Duration::from_secs(7 * 86_400)), "7d 0h");
        assert_eq!(time::format_duration(Duration::from_millis(20)), "20ms");
        assert_eq!(time::format_duration(Duration::ZERO), "0s");
    }

    #[tokio::test]
    async fn test_atomic_write() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        fs::ensure_dir_exists(&nested).await.unwrap();

        let target = nested.join("value.json");
        fs::write_file_atomic(&target, b"{}").await.unwrap();
        fs::write_file_atomic(&target, b"[]").await.unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"[]");
        assert!(!nested.join("value.tmp").exists());
    }
}
