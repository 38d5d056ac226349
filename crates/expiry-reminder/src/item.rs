//! Core item types for expiry-reminder.
//!
//! An [`Item`] is something with an expiry date the user wants to be
//! reminded about. Items are created from a [`NewItem`], stored as JSON, and
//! never mutated afterwards; the only other lifecycle event is deletion.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Number of characters kept from a generated identifier.
const ID_LEN: usize = 8;

/// A tracked item with an expiry date.
///
/// Field names follow the persisted JSON shape (`createdAt`), so records
/// written by older versions load unchanged. Text fields accept `null` and
/// numbers; only a missing `id` makes a record unreadable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Opaque unique identifier.
    #[serde(deserialize_with = "lenient_text")]
    pub id: String,

    /// Display name.
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: String,

    /// Free-form category (for example "Dairy").
    #[serde(default, deserialize_with = "lenient_text")]
    pub category: String,

    /// Expiry date as `YYYY-MM-DD`.
    ///
    /// Kept as text: it feeds alert signatures verbatim, and a malformed
    /// value must still load (it classifies as never-expiring).
    #[serde(default, deserialize_with = "lenient_text")]
    pub expiry: String,

    /// Optional quantity as typed by the user.
    #[serde(
        default,
        deserialize_with = "lenient_optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub quantity: Option<String>,

    /// When the item was recorded; unreadable timestamps load as the epoch.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: DateTime<Utc>,
}

fn text_of(value: Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(text_of(Value::deserialize(deserializer)?).unwrap_or_default())
}

fn lenient_optional_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(text_of(Value::deserialize(deserializer)?))
}

fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(DateTime::<Utc>::deserialize(Value::deserialize(deserializer)?).unwrap_or_default())
}

impl Item {
    /// Category for grouping, with blanks shown as "Uncategorized".
    #[must_use]
    pub fn category_label(&self) -> &str {
        let trimmed = self.category.trim();
        if trimmed.is_empty() {
            "Uncategorized"
        } else {
            trimmed
        }
    }
}

/// Parse a `YYYY-MM-DD` expiry string.
#[must_use]
pub fn parse_expiry(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

/// Format an expiry string for display, e.g. `Jan 10, 2024`.
///
/// Unparseable values are returned unchanged; an empty value stays empty.
#[must_use]
pub fn format_expiry(value: &str) -> String {
    match parse_expiry(value) {
        Some(date) => date.format("%b %-d, %Y").to_string(),
        None => value.to_string(),
    }
}

/// Input for creating an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    /// Display name (required).
    pub name: String,
    /// Category (required).
    pub category: String,
    /// Expiry date (required).
    pub expiry: Option<NaiveDate>,
    /// Optional quantity; blank is treated as absent.
    pub quantity: Option<String>,
}

impl NewItem {
    /// Validate the input and build an [`Item`] with the given id and timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidItem`] if the name, category or expiry is missing.
    pub fn into_item(self, id: String, created_at: DateTime<Utc>) -> Result<Item> {
        let name = self.name.trim().to_string();
        let category = self.category.trim().to_string();

        let Some(expiry) = self.expiry else {
            return Err(Error::invalid_item("expiry date is required"));
        };
        if name.is_empty() {
            return Err(Error::invalid_item("name is required"));
        }
        if category.is_empty() {
            return Err(Error::invalid_item("category is required"));
        }

        let quantity = self
            .quantity
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty());

        Ok(Item {
            id,
            name,
            category,
            expiry: expiry.format("%Y-%m-%d").to_string(),
            quantity,
            created_at,
        })
    }
}

/// Generate a short opaque identifier.
#[must_use]
pub fn generate_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(ID_LEN);
    id
}
