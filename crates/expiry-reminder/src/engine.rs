//! The reminder check cycle.
//!
//! One cycle reads the current items and settings, groups the items, and
//! delivers each non-empty group whose content changed since its last
//! delivery today. "Today" is handled before "soon". Expired items are
//! counted but never announced.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, MutexGuard};

use tracing::{debug, info};

use crate::classify::{group_for_alerts, list_preview, signature};
use crate::clock::Clock;
use crate::dedup::{self, AlertKind};
use crate::delivery::{Delivery, DeliveryGateway, Notification, PopupPresenter};
use crate::error::Result;
use crate::settings::Settings;
use crate::storage::{self, SharedStorage, Storage};

/// What a check cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    /// Whether reminders were switched off, so nothing was looked at.
    pub disabled: bool,
    /// Groups announced in this cycle, in order.
    pub delivered: Vec<AlertKind>,
    /// Non-empty groups skipped because they were already announced today.
    pub already_sent: Vec<AlertKind>,
    /// Number of expired items seen.
    pub expired: usize,
}

impl CheckReport {
    fn disabled() -> Self {
        Self {
            disabled: true,
            ..Self::default()
        }
    }
}

/// Counters since the engine was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Check cycles run.
    pub cycles: u64,
    /// Groups announced.
    pub deliveries: u64,
}

fn notification_title(kind: AlertKind) -> &'static str {
    match kind {
        AlertKind::Today => "Expiring today",
        AlertKind::Soon | AlertKind::Expired => "Upcoming expiries",
    }
}

/// Runs check cycles against a shared store.
#[derive(Debug)]
pub struct NotificationEngine {
    storage: SharedStorage,
    gateway: DeliveryGateway,
    popups: PopupPresenter,
    clock: Arc<dyn Clock>,
    preview_limit: usize,
    cycles: AtomicU64,
    deliveries: AtomicU64,
}

impl NotificationEngine {
    /// Create an engine.
    #[must_use]
    pub fn new(
        storage: SharedStorage,
        gateway: DeliveryGateway,
        popups: PopupPresenter,
        clock: Arc<dyn Clock>,
        preview_limit: usize,
    ) -> Self {
        Self {
            storage,
            gateway,
            popups,
            clock,
            preview_limit,
            cycles: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
        }
    }

    /// The delivery gateway.
    #[must_use]
    pub fn gateway(&self) -> &DeliveryGateway {
        &self.gateway
    }

    /// The popup presenter.
    #[must_use]
    pub fn popups(&self) -> &PopupPresenter {
        &self.popups
    }

    /// The engine's clock.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Counters since creation.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            cycles: self.cycles.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
        }
    }

    fn store(&self) -> MutexGuard<'_, Storage> {
        storage::lock(&self.storage)
    }

    /// Current settings, read fresh from the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn settings(&self) -> Result<Settings> {
        self.store().load_settings()
    }

    /// Start a fresh dedup log if the day has changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn reset_log_if_new_day(&self) -> Result<bool> {
        let today = self.clock.today();
        dedup::reset_if_new_day(&self.store(), today)
    }

    /// Run one check cycle.
    ///
    /// # Errors
    ///
    /// Returns an error if a database operation fails.
    pub async fn run_check(&self) -> Result<CheckReport> {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        let today = self.clock.today();

        let groups = {
            let store = self.store();
            let settings = store.load_settings()?;
            if !settings.notify {
                debug!("Reminders are off, skipping check");
                return Ok(CheckReport::disabled());
            }
            dedup::reset_if_new_day(&store, today)?;
            group_for_alerts(&store.load_items()?, settings.lead_days, today)
        };

        let mut report = CheckReport {
            expired: groups.expired.len(),
            ..CheckReport::default()
        };
        if report.expired > 0 {
            debug!(count = report.expired, "Expired items are not announced");
        }

        for (kind, group) in [(AlertKind::Today, groups.today), (AlertKind::Soon, groups.soon)] {
            if group.is_empty() {
                continue;
            }
            let sig = signature(&group);
            let sent = dedup::was_sent(&self.store(), kind, &sig)?;
            if sent {
                debug!(%kind, items = group.len(), "Group already announced today");
                report.already_sent.push(kind);
                continue;
            }

            let body = list_preview(&group, self.preview_limit);
            let count = group.len();
            self.popups.present(kind, group);
            let outcome = self
                .gateway
                .send(&Notification::new(notification_title(kind), body))
                .await;
            dedup::mark_sent(&self.store(), kind, &sig)?;

            self.deliveries.fetch_add(1, Ordering::Relaxed);
            match outcome {
                Delivery::Delivered(backend) => {
                    info!(%kind, items = count, backend, "Reminder delivered");
                }
                Delivery::Unavailable => {
                    info!(%kind, items = count, "Reminder shown as popup only");
                }
            }
            report.delivered.push(kind);
        }

        Ok(report)
    }

    /// Show today's items as a popup, ignoring the dedup log.
    ///
    /// Returns the number of items shown.
    ///
    /// # Errors
    ///
    /// Returns an error if a database operation fails.
    pub fn show_today(&self) -> Result<usize> {
        let today = self.clock.today();
        let items = {
            let store = self.store();
            let settings = store.load_settings()?;
            group_for_alerts(&store.load_items()?, settings.lead_days, today).today
        };
        let count = items.len();
        self.popups.present(AlertKind::Today, items);
        Ok(count)
    }

    /// Send a sample notification through the gateway.
    pub async fn send_test(&self) -> Delivery {
        self.gateway
            .send(&Notification::new(
                "Test notification",
                "This is how reminders will appear.",
            ))
            .await
    }
}
