//! `expiry-reminder` - A local-first tracker for things that expire
//!
//! This library provides the item store, expiry classification, and the
//! reminder engine: a scheduler that runs check cycles on a recurring tick
//! and at a daily notify time, and delivers each changed alert group at most
//! once per day.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod analytics;
pub mod classify;
pub mod cli;
pub mod clock;
pub mod config;
pub mod dedup;
pub mod delivery;
pub mod engine;
pub mod error;
pub mod item;
pub mod logging;
pub mod scheduler;
pub mod settings;
pub mod storage;

pub use analytics::Analytics;
pub use classify::{Bucket, Dashboard};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use dedup::AlertKind;
pub use delivery::{Delivery, DeliveryGateway, Notification, NotificationBackend, Permission};
pub use engine::{CheckReport, NotificationEngine};
pub use error::{Error, Result};
pub use item::{Item, NewItem};
pub use logging::init_logging;
pub use scheduler::{Scheduler, SchedulerState, SchedulerStatus};
pub use settings::{NotifyTime, Settings, Theme};
pub use storage::{SharedStorage, Storage, StorageStats};
