//! # Check-In Monitor
//!
//! Periodically re-derives the urgency of every stored vault and notifies
//! owners (and, on expiry, beneficiaries) at most once per cooldown window
//! for each typed [`CooldownKey`].
//!
//! Sends run as independent tasks under a bounded timeout, so one slow
//! provider call never delays the others. A failed send leaves its cooldown
//! untouched and is retried by the next sweep.

use super::clock::Clock;
use super::cooldown::{CooldownKey, CooldownLedger};
use super::urgency::{UrgencyThresholds, UrgencyTier, VaultStatus};
use crate::config::{lifecycle, notify};
use crate::error::{NotificationError, NotificationResult, VaultError, VaultResult};
use crate::services::notifier::{DeliveryReceipt, Notifier, OutboundEmail};
use crate::storage::VaultStore;
use crate::vaults::{BeneficiaryContact, VaultId, VaultMetadata};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;

/// Monitor tuning
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    pub thresholds: UrgencyThresholds,
    pub warning_cooldown: Duration,
    pub critical_cooldown: Duration,
    pub expired_cooldown: Duration,
    pub beneficiary_cooldown: Duration,
    pub send_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: lifecycle::POLL_INTERVAL,
            thresholds: UrgencyThresholds::default(),
            warning_cooldown: lifecycle::WARNING_COOLDOWN,
            critical_cooldown: lifecycle::CRITICAL_COOLDOWN,
            expired_cooldown: lifecycle::EXPIRED_COOLDOWN,
            beneficiary_cooldown: lifecycle::BENEFICIARY_COOLDOWN,
            send_timeout: notify::SEND_TIMEOUT,
        }
    }
}

impl MonitorConfig {
    /// Cooldown of owner reminders at a tier; healthy vaults are never notified
    pub fn cooldown_for(&self, tier: UrgencyTier) -> Option<Duration> {
        match tier {
            UrgencyTier::Healthy => None,
            UrgencyTier::Warning => Some(self.warning_cooldown),
            UrgencyTier::Critical => Some(self.critical_cooldown),
            UrgencyTier::Expired => Some(self.expired_cooldown),
        }
    }
}

/// Outcome counters of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub evaluated: usize,
    pub dispatched: usize,
    pub failed: usize,
    pub suppressed: usize,
}

fn owner_reminder(metadata: &VaultMetadata, to: &str, tier: UrgencyTier, days_remaining: i64) -> OutboundEmail {
    let (subject, headline) = match tier {
        UrgencyTier::Expired => (
            format!("Vault \"{}\" inactivity period has expired", metadata.name),
            "The inactivity period has elapsed. Beneficiaries are being notified.".to_string(),
        ),
        _ => (
            format!("Check in on vault \"{}\": {} days left", metadata.name, days_remaining),
            format!(
                "Your vault will be released to its beneficiaries in {} days unless you check in.",
                days_remaining
            ),
        ),
    };
    OutboundEmail {
        to: to.to_string(),
        subject,
        html_body: format!(
            "<p>{}</p><p>Vault: <strong>{}</strong> ({})</p>",
            headline, metadata.name, metadata.vault_id
        ),
        text_body: format!("{}\n\nVault: {} ({})", headline, metadata.name, metadata.vault_id),
    }
}

fn beneficiary_notice(metadata: &VaultMetadata, beneficiary: &BeneficiaryContact) -> OutboundEmail {
    let text = format!(
        "Hello {},\n\nThe owner of vault \"{}\" has not checked in within the agreed period. \
         You are listed as a beneficiary. Follow the recovery instructions you were given.",
        beneficiary.label, metadata.name
    );
    OutboundEmail {
        to: beneficiary.contact.clone(),
        subject: format!("Inheritance vault \"{}\" is now claimable", metadata.name),
        html_body: format!("<p>{}</p>", text.replace("\n\n", "</p><p>")),
        text_body: text,
    }
}

/// Periodic urgency evaluator and notification dispatcher
#[derive(Debug)]
pub struct CheckInMonitor {
    store: VaultStore,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    config: MonitorConfig,
}

impl CheckInMonitor {
    pub fn new(
        store: VaultStore,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    fn dispatch(
        &self,
        sends: &mut JoinSet<(CooldownKey, NotificationResult<DeliveryReceipt>)>,
        key: CooldownKey,
        email: OutboundEmail,
    ) {
        let notifier = Arc::clone(&self.notifier);
        let limit = self.config.send_timeout;
        sends.spawn(async move {
            let result = match tokio::time::timeout(limit, notifier.send(&email)).await {
                Ok(result) => result,
                Err(_) => Err(NotificationError::Timeout {
                    seconds: limit.as_secs(),
                }),
            };
            (key, result)
        });
    }

    /// Evaluate every vault once and deliver due notifications
    pub async fn sweep(&self) -> VaultResult<SweepReport> {
        let now = self.clock.now();
        let vaults = self.store.list_vaults().await?;
        let mut ledger = CooldownLedger::load(&self.store).await?;

        let live: BTreeSet<VaultId> = vaults.iter().map(|m| m.vault_id.clone()).collect();
        let pruned = ledger.retain_vaults(&live);

        let mut report = SweepReport {
            evaluated: vaults.len(),
            ..SweepReport::default()
        };
        let mut sends = JoinSet::new();
        let mut queued = BTreeSet::new();

        for metadata in &vaults {
            let status = VaultStatus::evaluate(metadata, now, &self.config.thresholds);
            let VaultStatus::Inactivity {
                days_remaining,
                tier,
                ..
            } = status
            else {
                continue;
            };
            let Some(cooldown) = self.config.cooldown_for(tier) else {
                continue;
            };

            let key = CooldownKey::Tier {
                vault_id: metadata.vault_id.clone(),
                tier,
            };
            match &metadata.owner_contact {
                Some(owner) if ledger.is_due(&key, cooldown, now) => {
                    log::debug!("Vault {} is {}, notifying owner", metadata.vault_id, tier);
                    let email = owner_reminder(metadata, owner, tier, days_remaining);
                    self.dispatch(&mut sends, key, email);
                }
                Some(_) => report.suppressed += 1,
                None => log::debug!("Vault {} is {} but has no owner contact", metadata.vault_id, tier),
            }

            if tier != UrgencyTier::Expired {
                continue;
            }
            for beneficiary in &metadata.beneficiary_contacts {
                let key = CooldownKey::Beneficiary {
                    vault_id: metadata.vault_id.clone(),
                    contact: beneficiary.contact.clone(),
                };
                if !ledger.is_due(&key, self.config.beneficiary_cooldown, now) {
                    report.suppressed += 1;
                } else if queued.insert(key.clone()) {
                    self.dispatch(&mut sends, key, beneficiary_notice(metadata, beneficiary));
                } else {
                    log::debug!("Vault {} already notifies {} this sweep", metadata.vault_id, beneficiary.contact);
                }
            }
        }

        let mut delivered = Vec::new();

        while let Some(joined) = sends.join_next().await {
            match joined {
                Ok((key, Ok(receipt))) => {
                    log::info!(
                        "Notification for vault {} delivered ({})",
                        key.vault_id(),
                        receipt.message_id
                    );
                    delivered.push(key);
                    report.dispatched += 1;
                }
                Ok((key, Err(e))) => {
                    log::warn!("Notification for vault {} failed: {}", key.vault_id(), e);
                    report.failed += 1;
                }
                Err(e) => {
                    log::error!("Notification task panicked: {}", e);
                    report.failed += 1;
                }
            }
        }

        // Check-ins may have cleared entries while sends were in flight
        if !delivered.is_empty() || pruned > 0 {
            let mut latest = CooldownLedger::load(&self.store).await?;
            latest.retain_vaults(&live);
            for key in delivered {
                latest.record(key, now);
            }
            latest.save(&self.store).await?;
        }

        log::debug!(
            "Sweep evaluated {} vaults: {} sent, {} failed, {} suppressed",
            report.evaluated,
            report.dispatched,
            report.failed,
            report.suppressed
        );
        Ok(report)
    }

    /// Run sweeps on the poll interval until the handle is stopped
    pub fn start(self: Arc<Self>) -> MonitorHandle {
        let (shutdown, mut stopped) = watch::channel(false);
        let monitor = self;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(monitor.config.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            log::info!(
                "Check-in monitor started (every {})",
                crate::utils::time::format_duration(monitor.config.poll_interval)
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        tokio::select! {
                            result = monitor.sweep() => {
                                if let Err(e) = result {
                                    log::error!("Monitor sweep failed: {}", e);
                                }
                            }
                            _ = stopped.changed() => break,
                        }
                    }
                    _ = stopped.changed() => break,
                }
            }
            log::info!("Check-in monitor stopped");
        });

        MonitorHandle { shutdown, task }
    }
}

/// Handle to a running monitor
#[derive(Debug)]
pub struct MonitorHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Signal shutdown and wait for the loop to exit
    pub async fn stop(self) -> VaultResult<()> {
        let _ = self.shutdown.send(true);
        self.task
            .await
            .map_err(|e| VaultError::operation("stop_monitor", e.to_string()))
    }
}
