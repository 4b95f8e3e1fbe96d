//! # Check-In Urgency
//!
//! Urgency is derived on demand from [`VaultMetadata`] and never stored.
//! Inactivity-triggered vaults advance through
//! `healthy -> warning -> critical -> expired` as their deadline approaches;
//! a check-in moves the deadline and resets the tier.

use crate::compat::Logic;
use crate::config::lifecycle;
use crate::vaults::VaultMetadata;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const SECONDS_PER_DAY: i64 = 86_400;

/// Urgency tier of an inactivity-triggered vault
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyTier {
    Healthy,
    Warning,
    Critical,
    Expired,
}

impl UrgencyTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrgencyTier::Healthy => "healthy",
            UrgencyTier::Warning => "warning",
            UrgencyTier::Critical => "critical",
            UrgencyTier::Expired => "expired",
        }
    }
}

impl fmt::Display for UrgencyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tier boundaries in days remaining
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrgencyThresholds {
    pub warning_days: i64,
    pub critical_days: i64,
}

impl Default for UrgencyThresholds {
    fn default() -> Self {
        Self {
            warning_days: lifecycle::WARNING_THRESHOLD_DAYS,
            critical_days: lifecycle::CRITICAL_THRESHOLD_DAYS,
        }
    }
}

impl UrgencyThresholds {
    pub fn tier_for(&self, days_remaining: i64) -> UrgencyTier {
        if days_remaining <= 0 {
            UrgencyTier::Expired
        } else if days_remaining <= self.critical_days {
            UrgencyTier::Critical
        } else if days_remaining <= self.warning_days {
            UrgencyTier::Warning
        } else {
            UrgencyTier::Healthy
        }
    }
}

/// Whole days until `deadline`, rounded up; zero or negative once passed
pub fn days_until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (deadline - now).num_seconds();
    let whole = seconds.div_euclid(SECONDS_PER_DAY);
    if seconds.rem_euclid(SECONDS_PER_DAY) > 0 {
        whole + 1
    } else {
        whole
    }
}

/// Check-in deadline, or `None` when it falls outside the representable range
pub fn deadline_after(last_activity: DateTime<Utc>, interval_days: u32) -> Option<DateTime<Utc>> {
    last_activity.checked_add_signed(Duration::days(i64::from(interval_days)))
}

/// Days remaining in an inactivity interval, saturating for unrepresentable deadlines
pub fn days_remaining(last_check_in: DateTime<Utc>, interval_days: u32, now: DateTime<Utc>) -> i64 {
    deadline_after(last_check_in, interval_days).map_or(i64::MAX, |deadline| days_until(deadline, now))
}

/// Derived lifecycle status of a vault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VaultStatus {
    /// Inactivity-triggered vault with a check-in deadline
    Inactivity {
        #[serde(rename = "daysRemaining")]
        days_remaining: i64,
        tier: UrgencyTier,
        deadline: DateTime<Utc>,
    },
    /// Vault that unlocks at a fixed date
    TimeLocked {
        #[serde(rename = "daysUntilUnlock")]
        days_until_unlock: i64,
        #[serde(rename = "unlockAt")]
        unlock_at: DateTime<Utc>,
    },
    /// Nothing time-based to track
    Untracked,
}

impl VaultStatus {
    pub fn evaluate(metadata: &VaultMetadata, now: DateTime<Utc>, thresholds: &UrgencyThresholds) -> Self {
        let deadline = match (metadata.primary_logic, metadata.inactivity_days) {
            (Logic::DeadManSwitch, Some(interval)) if interval > 0 => {
                deadline_after(metadata.last_activity(), interval)
            }
            _ => None,
        };

        match (deadline, metadata.lock_date) {
            (Some(deadline), _) => {
                let days_remaining = days_until(deadline, now);
                VaultStatus::Inactivity {
                    days_remaining,
                    tier: thresholds.tier_for(days_remaining),
                    deadline,
                }
            }
            (None, Some(unlock_at)) => VaultStatus::TimeLocked {
                days_until_unlock: days_until(unlock_at, now).max(0),
                unlock_at,
            },
            _ => VaultStatus::Untracked,
        }
    }

    /// Urgency tier, for inactivity-triggered vaults only
    pub fn tier(&self) -> Option<UrgencyTier> {
        match self {
            VaultStatus::Inactivity { tier, .. } => Some(*tier),
            _ => None,
        }
    }
}

impl fmt::Display for VaultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VaultStatus::Inactivity {
                days_remaining,
                tier,
                ..
            } => write!(f, "{} ({} days to check in)", tier, days_remaining),
            VaultStatus::TimeLocked {
                days_until_unlock, ..
            } => write!(f, "time-locked ({} days until unlock)", days_until_unlock),
            VaultStatus::Untracked => f.write_str("untracked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vaults::record::tests::sample_record;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_days_remaining_rounds_up() {
        let now = start();
        assert_eq!(days_remaining(now, 90, now), 90);
        assert_eq!(days_remaining(now, 90, now + Duration::hours(1)), 90);
        assert_eq!(days_remaining(now, 90, now + Duration::days(1)), 89);
        assert_eq!(days_remaining(now, 90, now + Duration::days(90)), 0);
        assert_eq!(days_remaining(now, 90, now + Duration::days(95)), -5);
    }

    #[test]
    fn test_tier_boundaries() {
        let thresholds = UrgencyThresholds::default();
        assert_eq!(thresholds.tier_for(31), UrgencyTier::Healthy);
        assert_eq!(thresholds.tier_for(30), UrgencyTier::Warning);
        assert_eq!(thresholds.tier_for(8), UrgencyTier::Warning);
        assert_eq!(thresholds.tier_for(7), UrgencyTier::Critical);
        assert_eq!(thresholds.tier_for(1), UrgencyTier::Critical);
        assert_eq!(thresholds.tier_for(0), UrgencyTier::Expired);
        assert_eq!(thresholds.tier_for(-3), UrgencyTier::Expired);
    }

    #[test]
    fn test_urgency_increases_then_resets() {
        let thresholds = UrgencyThresholds::default();
        let mut metadata = sample_record().metadata(None);
        metadata.created_at = start();
        assert_eq!(metadata.inactivity_days, Some(90));

        let mut previous = UrgencyTier::Healthy;
        let mut seen = Vec::new();
        for day in 0..=100 {
            let now = start() + Duration::days(day);
            let tier = VaultStatus::evaluate(&metadata, now, &thresholds).tier().unwrap();
            assert!(tier >= previous, "tier went backwards on day {}", day);
            if seen.last() != Some(&tier) {
                seen.push(tier);
            }
            previous = tier;
        }
        assert_eq!(
            seen,
            vec![
                UrgencyTier::Healthy,
                UrgencyTier::Warning,
                UrgencyTier::Critical,
                UrgencyTier::Expired
            ]
        );

        let now = start() + Duration::days(100);
        metadata.last_check_in = Some(now);
        let status = VaultStatus::evaluate(&metadata, now, &thresholds);
        assert_eq!(status.tier(), Some(UrgencyTier::Healthy));
        assert!(matches!(status, VaultStatus::Inactivity { days_remaining: 90, .. }));
    }

    #[test]
    fn test_time_locked_and_untracked() {
        let thresholds = UrgencyThresholds::default();
        let mut metadata = sample_record().metadata(None);
        metadata.primary_logic = Logic::Timelock;
        assert_eq!(VaultStatus::evaluate(&metadata, start(), &thresholds), VaultStatus::Untracked);

        metadata.lock_date = Some(start() + Duration::days(365));
        let status = VaultStatus::evaluate(&metadata, start(), &thresholds);
        assert!(matches!(status, VaultStatus::TimeLocked { days_until_unlock: 365, .. }));
        assert_eq!(status.tier(), None);

        let later = VaultStatus::evaluate(&metadata, start() + Duration::days(400), &thresholds);
        assert!(matches!(later, VaultStatus::TimeLocked { days_until_unlock: 0, .. }));
    }

    #[test]
    fn test_unrepresentable_deadline_does_not_panic() {
        let thresholds = UrgencyThresholds::default();
        let mut metadata = sample_record().metadata(None);
        metadata.inactivity_days = Some(u32::MAX);

        assert_eq!(deadline_after(start(), u32::MAX), None);
        assert_eq!(days_remaining(start(), u32::MAX, start()), i64::MAX);
        assert_eq!(VaultStatus::evaluate(&metadata, start(), &thresholds), VaultStatus::Untracked);

        metadata.inactivity_days = Some(100_000_000);
        assert_eq!(VaultStatus::evaluate(&metadata, start(), &thresholds), VaultStatus::Untracked);
    }
}
