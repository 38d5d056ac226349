//! `SQLite` schema definitions for expiry-reminder.

/// SQL statement to create the key-value record table.
///
/// Each row holds one whole JSON record; writes replace the row.
pub const CREATE_STORE_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[CREATE_STORE_TABLE, CREATE_METADATA_TABLE];
