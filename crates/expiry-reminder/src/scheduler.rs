//! Reminder scheduling.
//!
//! While reminders are on, two timers drive check cycles:
//!
//! - a recurring tick (every minute by default), so changes to the item list
//!   are picked up promptly;
//! - a daily anchor at the user's notify time, repeating every day after its
//!   first fire.
//!
//! The scheduler owns both timer tasks. Re-arming the anchor aborts the old
//! one first, so at most one anchor is ever pending. Dropping the scheduler
//! aborts everything.
//!
//! ```text
//!   Disabled --start (permission granted)--> Idle / PendingDailyFire
//!   PendingDailyFire --anchor fires--> Running --cycle done--> PendingDailyFire
//!   any --stop / reminders switched off--> Disabled
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{NaiveDateTime, NaiveTime};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::engine::NotificationEngine;
use crate::error::Result;
use crate::settings::NotifyTime;

/// Where the scheduler is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Reminders are off or permission was refused.
    Disabled,
    /// Running, with no daily anchor armed.
    Idle,
    /// Waiting for the next daily anchor.
    PendingDailyFire,
    /// A daily anchor cycle is in progress.
    Running,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::Idle => write!(f, "idle"),
            Self::PendingDailyFire => write!(f, "pending daily fire"),
            Self::Running => write!(f, "running"),
        }
    }
}

/// Snapshot of the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerStatus {
    /// Lifecycle state.
    pub state: SchedulerState,
    /// When the daily anchor fires next.
    pub next_fire: Option<NaiveDateTime>,
    /// Number of daily anchor fires so far.
    pub anchor_fires: u64,
    /// Check cycles run by the engine.
    pub cycles: u64,
    /// Groups the engine announced.
    pub deliveries: u64,
}

/// The next moment at or after `now` matching `at`, strictly in the future.
///
/// Today at `at` if that is still ahead, otherwise tomorrow at `at`.
#[must_use]
pub fn next_anchor(now: NaiveDateTime, at: NotifyTime) -> NaiveDateTime {
    let time = NaiveTime::from_hms_opt(at.hour.min(23), at.minute.min(59), 0)
        .unwrap_or(NaiveTime::MIN);
    let candidate = now.date().and_time(time);
    if candidate > now {
        candidate
    } else {
        candidate + chrono::Duration::days(1)
    }
}

#[derive(Debug, Default)]
struct Shared {
    running: AtomicBool,
    fires: AtomicU64,
    next_fire: Mutex<Option<NaiveDateTime>>,
}

impl Shared {
    fn set_next_fire(&self, at: Option<NaiveDateTime>) {
        *self.next_fire.lock().unwrap_or_else(PoisonError::into_inner) = at;
    }

    fn next_fire(&self) -> Option<NaiveDateTime> {
        *self.next_fire.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug)]
struct Anchor {
    notify_time: NotifyTime,
    handle: JoinHandle<()>,
}

/// Drives check cycles from the recurring tick and the daily anchor.
#[derive(Debug)]
pub struct Scheduler {
    engine: Arc<NotificationEngine>,
    tick_interval: Duration,
    daily_interval: Duration,
    enabled: bool,
    last_notify: Option<bool>,
    tick: Option<JoinHandle<()>>,
    anchor: Option<Anchor>,
    shared: Arc<Shared>,
}

impl Scheduler {
    /// Create a stopped scheduler.
    #[must_use]
    pub fn new(
        engine: Arc<NotificationEngine>,
        tick_interval: Duration,
        daily_interval: Duration,
    ) -> Self {
        Self {
            engine,
            tick_interval,
            daily_interval,
            enabled: false,
            last_notify: None,
            tick: None,
            anchor: None,
            shared: Arc::new(Shared::default()),
        }
    }

    /// The engine driven by this scheduler.
    #[must_use]
    pub fn engine(&self) -> &Arc<NotificationEngine> {
        &self.engine
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        if !self.enabled {
            SchedulerState::Disabled
        } else if self.shared.running.load(Ordering::SeqCst) {
            SchedulerState::Running
        } else if self
            .anchor
            .as_ref()
            .is_some_and(|anchor| !anchor.handle.is_finished())
        {
            SchedulerState::PendingDailyFire
        } else {
            SchedulerState::Idle
        }
    }

    /// Snapshot of the scheduler and engine counters.
    #[must_use]
    pub fn status(&self) -> SchedulerStatus {
        let stats = self.engine.stats();
        SchedulerStatus {
            state: self.state(),
            next_fire: self.shared.next_fire(),
            anchor_fires: self.shared.fires.load(Ordering::SeqCst),
            cycles: stats.cycles,
            deliveries: stats.deliveries,
        }
    }

    /// Start reminders.
    ///
    /// Asks for notification permission and stays disabled (returning
    /// `false`) if it is refused. Otherwise registers the delivery backends,
    /// runs one check cycle right away, starts the recurring tick and arms
    /// the daily anchor.
    ///
    /// # Errors
    ///
    /// Returns an error if a database operation fails.
    pub async fn start(&mut self) -> Result<bool> {
        if !self.engine.gateway().request_permission().await {
            info!("Notification permission not granted, reminders stay off");
            self.enabled = false;
            return Ok(false);
        }

        self.engine.gateway().register_backends().await;
        self.engine.reset_log_if_new_day()?;
        self.enabled = true;
        info!("Reminder scheduler started");

        match self.engine.run_check().await {
            Ok(report) => debug!(?report, "Startup check finished"),
            Err(e) => warn!(error = %e, "Startup check failed"),
        }

        self.start_tick();
        self.reschedule()?;
        Ok(true)
    }

    /// Start the recurring tick. Returns `false` if it was already running.
    pub fn start_tick(&mut self) -> bool {
        if self.tick.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }

        let engine = Arc::clone(&self.engine);
        let period = self.tick_interval;
        self.tick = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = engine.run_check().await {
                    warn!(error = %e, "Check cycle failed");
                }
            }
        }));
        debug!(period_secs = period.as_secs(), "Recurring check started");
        true
    }

    /// Re-arm the daily anchor from the current settings and time.
    ///
    /// Any armed anchor is cancelled first. Returns when the new anchor
    /// fires, or `None` if reminders are off. The recurring tick is left
    /// alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be read.
    pub fn reschedule(&mut self) -> Result<Option<NaiveDateTime>> {
        self.cancel_anchor();

        let settings = self.engine.settings()?;
        if !settings.notify {
            debug!("Reminders are off, no daily anchor");
            return Ok(None);
        }

        let notify_time = settings.notify_at();
        let now = self.engine.clock().now();
        let at = next_anchor(now, notify_time);
        let delay = (at - now).to_std().unwrap_or(Duration::ZERO);
        let step = chrono::Duration::from_std(self.daily_interval)
            .unwrap_or_else(|_| chrono::Duration::days(1));
        let daily = self.daily_interval;

        let engine = Arc::clone(&self.engine);
        let shared = Arc::clone(&self.shared);
        shared.set_next_fire(Some(at));

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut next = at;
            let mut repeat = interval_at(Instant::now() + daily, daily);
            loop {
                shared.running.store(true, Ordering::SeqCst);
                shared.fires.fetch_add(1, Ordering::SeqCst);
                match engine.run_check().await {
                    Ok(report) => debug!(?report, "Daily check finished"),
                    Err(e) => warn!(error = %e, "Daily check failed"),
                }
                shared.running.store(false, Ordering::SeqCst);

                next += step;
                shared.set_next_fire(Some(next));
                repeat.tick().await;
            }
        });

        info!(at = %at.format("%Y-%m-%d %H:%M"), "Daily reminder armed");
        self.anchor = Some(Anchor {
            notify_time,
            handle,
        });
        Ok(Some(at))
    }

    fn cancel_anchor(&mut self) {
        if let Some(anchor) = self.anchor.take() {
            anchor.handle.abort();
            self.shared.running.store(false, Ordering::SeqCst);
            self.shared.set_next_fire(None);
            debug!("Daily anchor cancelled");
        }
    }

    /// Stop every timer and drop pending popups.
    pub fn stop(&mut self) {
        if let Some(tick) = self.tick.take() {
            tick.abort();
        }
        self.cancel_anchor();
        self.engine.popups().cancel_all();
        if self.enabled {
            info!("Reminder scheduler stopped");
        }
        self.enabled = false;
    }

    /// Bring the scheduler in line with the stored settings.
    ///
    /// Switching reminders on starts the scheduler (asking for permission
    /// once per switch), switching them off stops it, and a changed notify
    /// time re-arms the daily anchor.
    ///
    /// A start that fails on the database is retried by the next call.
    ///
    /// # Errors
    ///
    /// Returns an error if a database operation fails.
    pub async fn reconcile(&mut self) -> Result<()> {
        let settings = self.engine.settings()?;
        let previous = self.last_notify.replace(settings.notify);

        match (settings.notify, self.enabled) {
            (true, false) if previous != Some(true) => {
                if let Err(e) = self.start().await {
                    self.last_notify = previous;
                    return Err(e);
                }
            }
            (false, true) => self.stop(),
            (true, true) => {
                let armed = self.anchor.as_ref().map(|anchor| anchor.notify_time);
                if armed != Some(settings.notify_at()) {
                    info!(notify_time = %settings.notify_at(), "Notify time changed");
                    self.reschedule()?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(tick) = self.tick.take() {
            tick.abort();
        }
        if let Some(anchor) = self.anchor.take() {
            anchor.handle.abort();
        }
    }
}
