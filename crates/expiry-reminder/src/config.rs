//! Configuration management for expiry-reminder.
//!
//! Application configuration (where the store lives, how often the daemon
//! ticks, which delivery backends to use) is loaded with figment from TOML,
//! environment variables and defaults. The user-facing [`Settings`] record
//! (lead days, notify time, ...) is separate and lives in the store.
//!
//! [`Settings`]: crate::settings::Settings

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "expiry-reminder";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "store.db";

/// Longest accepted tick interval, one day.
const MAX_TICK_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Longest accepted daily re-arm interval, one year.
const MAX_DAILY_INTERVAL_HOURS: u64 = 366 * 24;

/// Longest accepted snooze, one day.
const MAX_SNOOZE_MINUTES: u64 = 24 * 60;

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `EXPIRY_REMINDER_`, sections split by `__`)
/// 2. TOML config file at `~/.config/expiry-reminder/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Scheduler configuration.
    pub scheduler: SchedulerConfig,
    /// Delivery configuration.
    pub delivery: DeliveryConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/expiry-reminder/store.db`
    pub database_path: Option<PathBuf>,
}

/// Scheduler timing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between recurring check cycles while the daemon runs.
    pub tick_interval_secs: u64,
    /// Hours between daily anchor fires once the first one has run.
    pub daily_interval_hours: u64,
    /// Minutes before a snoozed popup is shown again.
    pub snooze_minutes: u64,
}

/// Delivery-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Use the desktop notification service when it is available.
    pub system_notifications: bool,
    /// Maximum number of items named in a notification body.
    pub preview_limit: usize,
    /// Application name shown by the desktop notification service.
    pub app_name: String,
    /// Ask for Got it / Snooze on popup cards instead of just printing them.
    pub interactive_popups: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 60,
            daily_interval_hours: 24,
            snooze_minutes: 10,
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            system_notifications: true,
            preview_limit: 5,
            app_name: "Expiry Reminder".to_string(),
            interactive_popups: false,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file).nested())
            .merge(Env::prefixed("EXPIRY_REMINDER_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        check_range(
            "tick_interval_secs",
            self.scheduler.tick_interval_secs,
            MAX_TICK_INTERVAL_SECS,
        )?;
        check_range(
            "daily_interval_hours",
            self.scheduler.daily_interval_hours,
            MAX_DAILY_INTERVAL_HOURS,
        )?;
        check_range(
            "snooze_minutes",
            self.scheduler.snooze_minutes,
            MAX_SNOOZE_MINUTES,
        )?;

        if self.delivery.preview_limit == 0 {
            return Err(Error::ConfigValidation {
                message: "preview_limit must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the recurring tick interval as a Duration.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.tick_interval_secs)
    }

    /// Get the daily re-arm interval as a Duration.
    #[must_use]
    pub fn daily_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.daily_interval_hours.saturating_mul(60 * 60))
    }

    /// Get the snooze delay as a Duration.
    #[must_use]
    pub fn snooze_delay(&self) -> Duration {
        Duration::from_secs(self.scheduler.snooze_minutes.saturating_mul(60))
    }
}

fn check_range(name: &str, value: u64, max: u64) -> Result<()> {
    if value == 0 {
        return Err(Error::ConfigValidation {
            message: format!("{name} must be greater than 0"),
        });
    }
    if value > max {
        return Err(Error::ConfigValidation {
            message: format!("{name} must be at most {max}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.storage.database_path.is_none());
        assert_eq!(config.scheduler.tick_interval_secs, 60);
        assert_eq!(config.scheduler.daily_interval_hours, 24);
        assert_eq!(config.scheduler.snooze_minutes, 10);
        assert!(config.delivery.system_notifications);
        assert_eq!(config.delivery.preview_limit, 5);
        assert!(!config.delivery.interactive_popups);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_tick_interval() {
        let mut config = Config::default();
        config.scheduler.tick_interval_secs = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("tick_interval_secs"));
    }

    #[test]
    fn test_validate_zero_daily_interval() {
        let mut config = Config::default();
        config.scheduler.daily_interval_hours = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("daily_interval_hours"));
    }

    #[test]
    fn test_validate_zero_snooze() {
        let mut config = Config::default();
        config.scheduler.snooze_minutes = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("snooze_minutes"));
    }

    #[test]
    fn test_validate_rejects_huge_intervals() {
        let mut config = Config::default();
        config.scheduler.daily_interval_hours = u64::MAX;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("daily_interval_hours must be at most"));
        assert_eq!(config.daily_interval(), Duration::from_secs(u64::MAX));

        let mut config = Config::default();
        config.scheduler.snooze_minutes = MAX_SNOOZE_MINUTES + 1;
        assert!(config.validate().unwrap_err().to_string().contains("snooze_minutes"));

        let mut config = Config::default();
        config.scheduler.tick_interval_secs = MAX_TICK_INTERVAL_SECS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_preview_limit() {
        let mut config = Config::default();
        config.delivery.preview_limit = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("preview_limit"));
    }

    #[test]
    fn test_database_path_default() {
        let path = Config::default().database_path();
        assert!(path.to_string_lossy().contains("store.db"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/db.sqlite")
        );
    }

    #[test]
    fn test_durations() {
        let config = Config::default();
        assert_eq!(config.tick_interval(), Duration::from_secs(60));
        assert_eq!(config.daily_interval(), Duration::from_secs(24 * 60 * 60));
        assert_eq!(config.snooze_delay(), Duration::from_secs(10 * 60));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("expiry-reminder"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_scheduler_config_deserialize_partial() {
        let json = r#"{"snooze_minutes": 5}"#;
        let scheduler: SchedulerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(scheduler.snooze_minutes, 5);
        assert_eq!(scheduler.tick_interval_secs, 60);
    }

    #[test]
    fn test_delivery_config_serialize() {
        let json = serde_json::to_string(&DeliveryConfig::default()).unwrap();
        assert!(json.contains("system_notifications"));
        assert!(json.contains("preview_limit"));
    }
}
