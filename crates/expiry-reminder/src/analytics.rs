//! Simple statistics over the item store.

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::classify::{bucket_for_days, days_until, Bucket};
use crate::item::Item;

/// Number of days covered by the expiry timeline.
pub const TIMELINE_DAYS: usize = 14;

/// Counts per urgency bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BucketCounts {
    /// All items.
    pub total: usize,
    /// Expiring today.
    pub today: usize,
    /// Expiring within the lead-day horizon.
    pub soon: usize,
    /// Expiring later (or never).
    pub safe: usize,
    /// Already expired.
    pub expired: usize,
}

/// One bar of a chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bar {
    /// Bar label.
    pub label: String,
    /// Bar value.
    pub count: usize,
}

/// Analytics snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Analytics {
    /// Counts per bucket.
    pub counts: BucketCounts,
    /// Items per category, in first-seen order.
    pub categories: Vec<Bar>,
    /// Items expiring on each of the next [`TIMELINE_DAYS`] days, starting today.
    pub timeline: Vec<Bar>,
}

impl Analytics {
    /// Compute analytics for `items` as of `today`.
    #[must_use]
    pub fn compute(items: &[Item], lead_days: u32, today: NaiveDate) -> Self {
        let mut counts = BucketCounts {
            total: items.len(),
            ..BucketCounts::default()
        };
        let mut categories: Vec<Bar> = Vec::new();
        let mut per_day = [0usize; TIMELINE_DAYS];

        for item in items {
            let days = days_until(&item.expiry, today);
            match bucket_for_days(days, lead_days) {
                Bucket::Expired => counts.expired += 1,
                Bucket::Today => counts.today += 1,
                Bucket::Soon => counts.soon += 1,
                Bucket::Safe => counts.safe += 1,
            }

            let label = item.category_label();
            match categories.iter_mut().find(|bar| bar.label == label) {
                Some(bar) => bar.count += 1,
                None => categories.push(Bar {
                    label: label.to_string(),
                    count: 1,
                }),
            }

            if let Ok(offset) = usize::try_from(days) {
                if offset < TIMELINE_DAYS {
                    per_day[offset] += 1;
                }
            }
        }

        let timeline = per_day
            .iter()
            .zip(0i64..)
            .map(|(&count, offset)| Bar {
                label: (today + Duration::days(offset)).format("%b %-d").to_string(),
                count,
            })
            .collect();

        Self {
            counts,
            categories,
            timeline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(name: &str, category: &str, expiry: &str) -> Item {
        Item {
            id: name.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            expiry: expiry.to_string(),
            quantity: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let analytics = Analytics::compute(&[], 7, today);
        assert_eq!(analytics.counts, BucketCounts::default());
        assert!(analytics.categories.is_empty());
        assert_eq!(analytics.timeline.len(), TIMELINE_DAYS);
        assert_eq!(analytics.timeline[0].label, "Jan 10");
    }

    #[test]
    fn test_counts_categories_and_timeline() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let items = vec![
            item("Milk", "Dairy", "2024-01-10"),
            item("Cheese", " Dairy ", "2024-01-13"),
            item("Bread", "Bakery", "2024-01-05"),
            item("Rice", "", "2024-06-01"),
            item("Beans", "Pantry", "2024-01-23"),
        ];
        let analytics = Analytics::compute(&items, 7, today);

        assert_eq!(analytics.counts.total, 5);
        assert_eq!(analytics.counts.today, 1);
        assert_eq!(analytics.counts.soon, 1);
        assert_eq!(analytics.counts.expired, 1);
        assert_eq!(analytics.counts.safe, 2);

        let labels: Vec<_> = analytics.categories.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["Dairy", "Bakery", "Uncategorized", "Pantry"]);
        assert_eq!(analytics.categories[0].count, 2);

        assert_eq!(analytics.timeline[0].count, 1);
        assert_eq!(analytics.timeline[3].count, 1);
        // day 13 is the last slot; Beans at +13 lands there
        assert_eq!(analytics.timeline[13].count, 1);
        assert_eq!(analytics.timeline.iter().map(|b| b.count).sum::<usize>(), 3);
    }
}
