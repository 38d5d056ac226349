//! Storage layer for expiry-reminder.
//!
//! A `SQLite` file holding whole JSON records under fixed keys. Every write
//! replaces the full record in one statement, so concurrent writers can only
//! ever produce last-write-wins, never a half-merged record. Reads that find
//! malformed JSON log a warning and behave as if the record were absent.

pub mod migrations;
pub mod schema;

mod items;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::settings::Settings;

/// Key of the item list record.
pub const ITEMS_KEY: &str = "edr_items";

/// Key of the settings record.
pub const SETTINGS_KEY: &str = "edr_settings";

/// Key of the notification dedup log record.
pub const NOTIFY_LOG_KEY: &str = "edr_notify_log";

/// Key of the remembered notification permission.
pub const PERMISSION_KEY: &str = "edr_notify_permission";

/// A store shared between the engine, the scheduler tasks and the CLI.
///
/// Lock it only around synchronous storage calls, never across an await.
pub type SharedStorage = Arc<Mutex<Storage>>;

/// Lock a shared store, recovering the guard if a holder panicked.
pub fn lock(storage: &SharedStorage) -> MutexGuard<'_, Storage> {
    storage.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Record store backed by `SQLite`.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a store at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening store at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        // The daemon and CLI invocations share the file
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        migrations::initialize_schema(&conn)?;

        info!("Store opened at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wrap the store for sharing.
    #[must_use]
    pub fn into_shared(self) -> SharedStorage {
        Arc::new(Mutex::new(self))
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Read the raw text stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM store WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Replace the raw text stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn put_raw(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            r"
            INSERT OR REPLACE INTO store (key, value, updated_at)
            VALUES (?1, ?2, datetime('now'))
            ",
            params![key, value],
        )?;
        Ok(())
    }

    /// Remove the record under `key`. Returns `true` if one existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let affected = self.conn.execute("DELETE FROM store WHERE key = ?1", [key])?;
        Ok(affected > 0)
    }

    /// Read and decode the JSON record under `key`.
    ///
    /// A record that fails to decode is reported as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_record<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.get_raw(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key, error = %e, "Malformed record, treating as absent");
                Ok(None)
            }
        }
    }

    /// Encode `value` as JSON and replace the record under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the database operation fails.
    pub fn put_record<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.put_raw(key, &raw)
    }

    /// Load the user settings, merged with defaults and normalized.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn load_settings(&self) -> Result<Settings> {
        Ok(self
            .get_record::<Settings>(SETTINGS_KEY)?
            .unwrap_or_default()
            .normalized())
    }

    /// Persist the user settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.put_record(SETTINGS_KEY, settings)
    }

    /// Load, modify and save the settings; returns the saved record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn update_settings(&self, update: impl FnOnce(&mut Settings)) -> Result<Settings> {
        let mut settings = self.load_settings()?;
        update(&mut settings);
        let settings = settings.normalized();
        self.save_settings(&settings)?;
        Ok(settings)
    }

    /// Get store statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let total_items = self.load_items()?.len();
        let records: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM store", [], |row| row.get(0))?;

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            total_items,
            records,
            db_size_bytes,
        })
    }
}

/// Statistics about the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of tracked items.
    pub total_items: usize,
    /// Number of records in the store.
    pub records: i64,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Theme;

    fn create_test_storage() -> Storage {
        Storage::open_in_memory().expect("failed to create test storage")
    }

    #[test]
    fn test_open_in_memory() {
        let storage = create_test_storage();
        assert_eq!(storage.path().to_string_lossy(), ":memory:");
    }

    #[test]
    fn test_raw_round_trip_and_replace() {
        let storage = create_test_storage();
        assert!(storage.get_raw("k").unwrap().is_none());

        storage.put_raw("k", "one").unwrap();
        storage.put_raw("k", "two").unwrap();
        assert_eq!(storage.get_raw("k").unwrap().as_deref(), Some("two"));
    }

    #[test]
    fn test_remove() {
        let storage = create_test_storage();
        storage.put_raw("k", "v").unwrap();
        assert!(storage.remove("k").unwrap());
        assert!(!storage.remove("k").unwrap());
    }

    #[test]
    fn test_malformed_record_is_absent() {
        let storage = create_test_storage();
        storage.put_raw(SETTINGS_KEY, "{not json").unwrap();
        let record: Option<Settings> = storage.get_record(SETTINGS_KEY).unwrap();
        assert!(record.is_none());
    }

    #[test]
    fn test_load_settings_defaults_when_missing_or_corrupt() {
        let storage = create_test_storage();
        assert_eq!(storage.load_settings().unwrap(), Settings::default());

        storage.put_raw(SETTINGS_KEY, "[1, 2, 3]").unwrap();
        assert_eq!(storage.load_settings().unwrap(), Settings::default());
    }

    #[test]
    fn test_load_settings_merges_partial_record() {
        let storage = create_test_storage();
        storage
            .put_raw(SETTINGS_KEY, r#"{"theme":"dark","leadDays":30}"#)
            .unwrap();

        let settings = storage.load_settings().unwrap();
        assert_eq!(settings.theme, Theme::Dark);
        assert_eq!(settings.lead_days, 14);
        assert!(!settings.notify);
        assert_eq!(settings.notify_time, "09:00");
    }

    #[test]
    fn test_update_settings() {
        let storage = create_test_storage();
        let saved = storage
            .update_settings(|s| {
                s.notify = true;
                s.notify_time = "18:00".to_string();
            })
            .unwrap();
        assert!(saved.notify);
        assert_eq!(storage.load_settings().unwrap(), saved);
    }

    #[test]
    fn test_stats() {
        let storage = create_test_storage();
        let stats = storage.stats().unwrap();
        assert_eq!(stats.total_items, 0);
        assert_eq!(stats.records, 0);
        assert_eq!(stats.db_size_bytes, 0);
    }

    #[test]
    fn test_open_file_based() {
        let temp_dir = std::env::temp_dir();
        let db_path = temp_dir.join(format!("expiry_reminder_test_{}.db", std::process::id()));

        let storage = Storage::open(&db_path).unwrap();
        storage.put_raw("k", "v").unwrap();
        assert_eq!(storage.path(), db_path);
        drop(storage);

        // Data survives reopening
        let storage = Storage::open(&db_path).unwrap();
        assert_eq!(storage.get_raw("k").unwrap().as_deref(), Some("v"));

        drop(storage);
        let _ = std::fs::remove_file(&db_path);
        let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
        let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let root = std::env::temp_dir().join(format!("expiry_reminder_test_{}", std::process::id()));
        let nested_path = root.join("nested/store.db");
        let _ = std::fs::remove_dir_all(&root);

        let storage = Storage::open(&nested_path).unwrap();
        assert!(nested_path.exists());

        drop(storage);
        let _ = std::fs::remove_dir_all(&root);
    }
}
