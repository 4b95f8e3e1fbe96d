//! # Lifecycle Module
//!
//! Derived check-in urgency, the persisted notification cooldown ledger, and
//! the cancellable monitor that ties them to a [`Notifier`](crate::services::Notifier).

pub mod clock;
pub mod cooldown;
pub mod monitor;
pub mod urgency;

pub use clock::{Clock, ManualClock, SystemClock};
pub use cooldown::{CooldownKey, CooldownLedger};
pub use monitor::{CheckInMonitor, MonitorConfig, MonitorHandle, SweepReport};
pub use urgency::{days_remaining, deadline_after, UrgencyThresholds, UrgencyTier, VaultStatus};
