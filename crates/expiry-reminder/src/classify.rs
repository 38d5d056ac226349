//! Expiry classification and grouping.
//!
//! Pure functions from `(item, lead days, today)` to an urgency [`Bucket`],
//! plus the groupings and content signatures the notification engine and
//! the dashboard are built on.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::item::{format_expiry, parse_expiry, Item};

/// Days-until value for a missing or unparseable expiry ("never").
pub const NEVER_DAYS: i64 = 99_999;

/// Separator between `name__expiry` entries in a signature.
const SIGNATURE_SEPARATOR: &str = "|";

/// Urgency bucket for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    /// Expiry date has passed.
    Expired,
    /// Expires today.
    Today,
    /// Expires within the lead-day horizon.
    Soon,
    /// Expires later than the horizon, or never.
    Safe,
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expired => write!(f, "expired"),
            Self::Today => write!(f, "today"),
            Self::Soon => write!(f, "soon"),
            Self::Safe => write!(f, "safe"),
        }
    }
}

/// Whole days from `today` to the expiry date.
///
/// Negative once expired; [`NEVER_DAYS`] when the expiry is missing or not a
/// valid `YYYY-MM-DD` date.
#[must_use]
pub fn days_until(expiry: &str, today: NaiveDate) -> i64 {
    parse_expiry(expiry).map_or(NEVER_DAYS, |date| (date - today).num_days())
}

/// Bucket for a days-until value.
///
/// The order of the checks matters: `0` is today, and the lead-day boundary
/// is inclusive in [`Bucket::Soon`].
#[must_use]
pub fn bucket_for_days(days: i64, lead_days: u32) -> Bucket {
    if days < 0 {
        Bucket::Expired
    } else if days == 0 {
        Bucket::Today
    } else if days <= i64::from(lead_days) {
        Bucket::Soon
    } else {
        Bucket::Safe
    }
}

/// Classify an item relative to `today`.
#[must_use]
pub fn classify(item: &Item, lead_days: u32, today: NaiveDate) -> Bucket {
    bucket_for_days(days_until(&item.expiry, today), lead_days)
}

/// Short status tag shown next to an item: `Expired`, `Today`, `3d` or `Safe`.
#[must_use]
pub fn status_tag(item: &Item, lead_days: u32, today: NaiveDate) -> String {
    let days = days_until(&item.expiry, today);
    match bucket_for_days(days, lead_days) {
        Bucket::Expired => "Expired".to_string(),
        Bucket::Today => "Today".to_string(),
        Bucket::Soon => format!("{days}d"),
        Bucket::Safe => "Safe".to_string(),
    }
}

/// Items grouped by the buckets reminders care about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertGroups {
    /// Items expiring today.
    pub today: Vec<Item>,
    /// Items expiring within the lead-day horizon.
    pub soon: Vec<Item>,
    /// Items already expired. Computed but not delivered.
    pub expired: Vec<Item>,
}

/// Group items for a reminder check cycle.
#[must_use]
pub fn group_for_alerts(items: &[Item], lead_days: u32, today: NaiveDate) -> AlertGroups {
    let mut groups = AlertGroups::default();
    for item in items {
        match classify(item, lead_days, today) {
            Bucket::Today => groups.today.push(item.clone()),
            Bucket::Soon => groups.soon.push(item.clone()),
            Bucket::Expired => groups.expired.push(item.clone()),
            Bucket::Safe => {}
        }
    }
    groups
}

/// Content fingerprint of a set of items.
///
/// Built from sorted `name__expiry` pairs, so the same membership always
/// yields the same string whatever the iteration order. An empty set yields
/// an empty signature.
#[must_use]
pub fn signature(items: &[Item]) -> String {
    let mut keys: Vec<String> = items
        .iter()
        .map(|item| format!("{}__{}", item.name, item.expiry))
        .collect();
    keys.sort();
    keys.join(SIGNATURE_SEPARATOR)
}

/// One-line preview of a group for a notification body.
///
/// Lists up to `limit` items by soonest expiry as `Name (Jan 10, 2024)` and
/// appends ` +N more` when the group is larger.
#[must_use]
pub fn list_preview(items: &[Item], limit: usize) -> String {
    let sorted = sorted_by_expiry(items);
    let top = sorted
        .iter()
        .take(limit)
        .map(|item| format!("{} ({})", item.name, format_expiry(&item.expiry)))
        .collect::<Vec<_>>()
        .join(", ");

    if sorted.len() > limit {
        format!("{top} +{} more", sorted.len() - limit)
    } else {
        top
    }
}

/// Copy of `items` ordered by expiry string.
#[must_use]
pub fn sorted_by_expiry(items: &[Item]) -> Vec<Item> {
    let mut sorted = items.to_vec();
    sorted.sort_by(|a, b| a.expiry.cmp(&b.expiry));
    sorted
}

/// The three dashboard lists.
///
/// Expired items are not part of the dashboard; they show up in the full
/// listing and in analytics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dashboard {
    /// Items expiring today.
    pub today: Vec<Item>,
    /// Items expiring within the lead-day horizon.
    pub upcoming: Vec<Item>,
    /// Items expiring later.
    pub safe: Vec<Item>,
}

impl Dashboard {
    /// Build the dashboard lists, each sorted by expiry.
    #[must_use]
    pub fn build(items: &[Item], lead_days: u32, today: NaiveDate) -> Self {
        let mut dashboard = Self::default();
        for item in items {
            match classify(item, lead_days, today) {
                Bucket::Today => dashboard.today.push(item.clone()),
                Bucket::Soon => dashboard.upcoming.push(item.clone()),
                Bucket::Safe => dashboard.safe.push(item.clone()),
                Bucket::Expired => {}
            }
        }
        dashboard.today = sorted_by_expiry(&dashboard.today);
        dashboard.upcoming = sorted_by_expiry(&dashboard.upcoming);
        dashboard.safe = sorted_by_expiry(&dashboard.safe);
        dashboard
    }
}
