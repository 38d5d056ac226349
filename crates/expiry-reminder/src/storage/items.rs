//! Item list persistence.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{Storage, ITEMS_KEY};
use crate::classify::sorted_by_expiry;
use crate::error::{Error, Result};
use crate::item::{generate_id, Item, NewItem};

/// Attempts at finding an unused identifier before giving up.
const ID_ATTEMPTS: usize = 16;

impl Storage {
    /// Load all items in stored order.
    ///
    /// A missing or corrupt list loads as empty. Entries that cannot be read
    /// as items are skipped but stay in the stored list.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn load_items(&self) -> Result<Vec<Item>> {
        Ok(self
            .load_raw_items()?
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| match serde_json::from_value(entry) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!(index, error = %e, "Skipping unreadable item");
                    None
                }
            })
            .collect())
    }

    fn load_raw_items(&self) -> Result<Vec<Value>> {
        Ok(self.get_record::<Vec<Value>>(ITEMS_KEY)?.unwrap_or_default())
    }

    /// Replace the whole item list.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn save_items(&self, items: &[Item]) -> Result<()> {
        self.put_record(ITEMS_KEY, &items)
    }

    /// Validate and append a new item, returning it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidItem`] for incomplete input, or an error if the
    /// database operation fails.
    pub fn add_item(&self, input: NewItem, now: DateTime<Utc>) -> Result<Item> {
        let mut entries = self.load_raw_items()?;

        let id = (0..ID_ATTEMPTS)
            .map(|_| generate_id())
            .find(|candidate| entries.iter().all(|entry| !has_id(entry, candidate)))
            .ok_or_else(|| Error::internal("could not generate a unique item id"))?;

        let item = input.into_item(id, now)?;
        entries.push(serde_json::to_value(&item)?);
        self.put_record(ITEMS_KEY, &entries)?;

        info!(id = %item.id, name = %item.name, expiry = %item.expiry, "Item saved");
        Ok(item)
    }

    /// Find an item by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_item(&self, id: &str) -> Result<Option<Item>> {
        Ok(self.load_items()?.into_iter().find(|item| item.id == id))
    }

    /// Delete an item by id. Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_item(&self, id: &str) -> Result<bool> {
        let mut entries = self.load_raw_items()?;
        let before = entries.len();
        entries.retain(|entry| !has_id(entry, id));
        if entries.len() == before {
            debug!(id, "No item to delete");
            return Ok(false);
        }
        self.put_record(ITEMS_KEY, &entries)?;
        info!(id, "Item deleted");
        Ok(true)
    }

    /// Remove every item.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn clear_items(&self) -> Result<()> {
        self.remove(ITEMS_KEY)?;
        info!("All items cleared");
        Ok(())
    }

    /// All items ordered by expiry.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn items_by_expiry(&self) -> Result<Vec<Item>> {
        Ok(sorted_by_expiry(&self.load_items()?))
    }
}

/// Whether a stored entry carries `id`, written as text or a number.
fn has_id(entry: &Value, id: &str) -> bool {
    match entry.get("id") {
        Some(Value::String(text)) => text == id,
        Some(Value::Number(number)) => number.to_string() == id,
        _ => false,
    }
}
