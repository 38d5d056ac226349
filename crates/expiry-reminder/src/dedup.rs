//! Per-day notification dedup log.
//!
//! The log remembers, for the current calendar day, the signature of the
//! last group delivered for each alert kind. A check cycle delivers a group
//! only when its signature differs from the remembered one, so an unchanged
//! group is announced at most once a day while a changed group (an item
//! added or removed) is announced again.
//!
//! The log is valid only for the day it records: [`reset_if_new_day`] must
//! run before reads and writes in a cycle. Every write replaces the whole
//! record.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::storage::{Storage, NOTIFY_LOG_KEY};

/// The alert groups the log tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    /// Items expiring today.
    Today,
    /// Items expiring within the lead-day horizon.
    Soon,
    /// Items already expired.
    Expired,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Today => write!(f, "today"),
            Self::Soon => write!(f, "soon"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// Delivered signature per alert kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentSignatures {
    /// Signature of the last delivered "today" group.
    pub today: String,
    /// Signature of the last delivered "soon" group.
    pub soon: String,
    /// Signature of the last delivered "expired" group.
    pub expired: String,
}

impl SentSignatures {
    /// Signature remembered for `kind`.
    #[must_use]
    pub fn get(&self, kind: AlertKind) -> &str {
        match kind {
            AlertKind::Today => &self.today,
            AlertKind::Soon => &self.soon,
            AlertKind::Expired => &self.expired,
        }
    }

    /// Remember `signature` for `kind`.
    pub fn set(&mut self, kind: AlertKind, signature: impl Into<String>) {
        let slot = match kind {
            AlertKind::Today => &mut self.today,
            AlertKind::Soon => &mut self.soon,
            AlertKind::Expired => &mut self.expired,
        };
        *slot = signature.into();
    }
}

/// The persisted dedup record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupLog {
    /// Day the record is valid for, as `YYYY-MM-DD`.
    #[serde(alias = "_day")]
    pub day: String,
    /// Delivered signatures for that day.
    pub sent: SentSignatures,
}

impl DedupLog {
    /// An empty log for `day`.
    #[must_use]
    pub fn for_day(day: NaiveDate) -> Self {
        Self {
            day: day_key(day),
            sent: SentSignatures::default(),
        }
    }

    /// Whether the log belongs to `day`.
    #[must_use]
    pub fn is_for(&self, day: NaiveDate) -> bool {
        self.day == day_key(day)
    }
}

fn day_key(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

/// Load the log; missing or malformed records load as empty.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn load(storage: &Storage) -> Result<DedupLog> {
    Ok(storage
        .get_record::<DedupLog>(NOTIFY_LOG_KEY)?
        .unwrap_or_default())
}

/// Start a fresh log if the stored one is for a different day.
///
/// Returns `true` if the log was reset. Repeated calls on the same day are
/// no-ops.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn reset_if_new_day(storage: &Storage, today: NaiveDate) -> Result<bool> {
    let log = load(storage)?;
    if log.is_for(today) {
        return Ok(false);
    }
    debug!(previous = %log.day, today = %today, "Resetting notification log for new day");
    storage.put_record(NOTIFY_LOG_KEY, &DedupLog::for_day(today))?;
    Ok(true)
}

/// Whether `signature` is the one already delivered for `kind` today.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn was_sent(storage: &Storage, kind: AlertKind, signature: &str) -> Result<bool> {
    Ok(load(storage)?.sent.get(kind) == signature)
}

/// Record `signature` as delivered for `kind`, leaving other kinds untouched.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn mark_sent(storage: &Storage, kind: AlertKind, signature: &str) -> Result<()> {
    let mut log = load(storage)?;
    log.sent.set(kind, signature);
    storage.put_record(NOTIFY_LOG_KEY, &log)
}
