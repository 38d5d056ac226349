//! User settings.
//!
//! The [`Settings`] record is a process-wide singleton persisted in the
//! store. Every load merges the stored JSON over the defaults, so records
//! written by older versions (or partially written) heal themselves.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Smallest accepted lead-day horizon.
pub const MIN_LEAD_DAYS: u32 = 1;

/// Largest accepted lead-day horizon.
pub const MAX_LEAD_DAYS: u32 = 14;

/// Default notify time.
pub const DEFAULT_NOTIFY_TIME: &str = "09:00";

/// Color theme preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Light theme.
    #[default]
    Light,
    /// Dark theme.
    Dark,
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Light => write!(f, "light"),
            Self::Dark => write!(f, "dark"),
        }
    }
}

/// User configuration.
///
/// Decoding merges field by field: a missing or mistyped field keeps its
/// default while the others load as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Days ahead within which an item counts as "soon".
    pub lead_days: u32,
    /// Color theme.
    pub theme: Theme,
    /// Whether reminders are enabled.
    pub notify: bool,
    /// Time of the daily reminder, as typed by the user (`HH:MM`, `9pm`, ...).
    pub notify_time: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            lead_days: 7,
            theme: Theme::Light,
            notify: false,
            notify_time: DEFAULT_NOTIFY_TIME.to_string(),
        }
    }
}

impl<'de> Deserialize<'de> for Settings {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Object(fields) => Ok(Self::merged(&fields)),
            other => {
                warn!(record = %other, "Settings record is not an object, using defaults");
                Ok(Self::default())
            }
        }
    }
}

impl Settings {
    fn merged(fields: &Map<String, Value>) -> Self {
        let defaults = Self::default();
        let settings = Self {
            lead_days: merge_field(fields, "leadDays", lead_days_of, defaults.lead_days),
            theme: merge_field(
                fields,
                "theme",
                |value| Theme::deserialize(value).ok(),
                defaults.theme,
            ),
            notify: merge_field(fields, "notify", Value::as_bool, defaults.notify),
            notify_time: merge_field(fields, "notifyTime", notify_time_of, defaults.notify_time),
        };
        settings.normalized()
    }

    /// Clamp fields into their valid ranges.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.lead_days = clamp_lead_days(self.lead_days);
        if self.notify_time.trim().is_empty() {
            self.notify_time = DEFAULT_NOTIFY_TIME.to_string();
        }
        self
    }

    /// Parsed daily notify time.
    #[must_use]
    pub fn notify_at(&self) -> NotifyTime {
        NotifyTime::parse(&self.notify_time)
    }
}

fn merge_field<T>(
    fields: &Map<String, Value>,
    name: &str,
    read: impl FnOnce(&Value) -> Option<T>,
    default: T,
) -> T {
    match fields.get(name) {
        None | Some(Value::Null) => default,
        Some(value) => read(value).unwrap_or_else(|| {
            warn!(field = name, %value, "Ignoring unreadable setting");
            default
        }),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lead_days_of(value: &Value) -> Option<u32> {
    let days = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    days.is_finite().then(|| {
        days.trunc()
            .clamp(f64::from(MIN_LEAD_DAYS), f64::from(MAX_LEAD_DAYS)) as u32
    })
}

fn notify_time_of(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Clamp a lead-day value into `[MIN_LEAD_DAYS, MAX_LEAD_DAYS]`.
#[must_use]
pub fn clamp_lead_days(days: u32) -> u32 {
    days.clamp(MIN_LEAD_DAYS, MAX_LEAD_DAYS)
}

/// A wall-clock time of day for the daily reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifyTime {
    /// Hour in `0..=23`.
    pub hour: u32,
    /// Minute in `0..=59`.
    pub minute: u32,
}

impl Default for NotifyTime {
    fn default() -> Self {
        Self { hour: 9, minute: 0 }
    }
}

fn notify_time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d+)(?::(\d*))?(am|pm)?$").expect("notify time pattern is valid")
    })
}

impl NotifyTime {
    /// Parse a user-entered time leniently.
    ///
    /// Accepts `HH:MM`, `H`, `H:MMam`, `h pm` and similar. Hours and minutes
    /// are clamped into range; anything unparseable falls back to 09:00.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let cleaned: String = input
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if cleaned.is_empty() {
            return Self::default();
        }

        let Some(caps) = notify_time_pattern().captures(&cleaned) else {
            warn!(input, "Unparseable notify time, using 09:00");
            return Self::default();
        };

        let number = |idx: usize| {
            caps.get(idx)
                .map(|m| m.as_str())
                .filter(|s| !s.is_empty())
                .map_or(0, |s| s.parse::<u32>().unwrap_or(u32::MAX))
        };
        let mut hour = number(1);
        let minute = number(2);

        match caps.get(3).map(|m| m.as_str()) {
            Some("pm") if hour < 12 => hour += 12,
            Some("am") if hour == 12 => hour = 0,
            _ => {}
        }

        Self {
            hour: hour.min(23),
            minute: minute.min(59),
        }
    }
}

impl fmt::Display for NotifyTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.lead_days, 7);
        assert_eq!(s.theme, Theme::Light);
        assert!(!s.notify);
        assert_eq!(s.notify_time, "09:00");
    }

    #[test]
    fn test_partial_record_merges_with_defaults() {
        let s: Settings = serde_json::from_str(r#"{"notify": true}"#).unwrap();
        assert!(s.notify);
        assert_eq!(s.lead_days, 7);
        assert_eq!(s.notify_time, "09:00");
    }

    #[test]
    fn test_camel_case_shape() {
        let s: Settings =
            serde_json::from_str(r#"{"leadDays": 3, "theme": "dark", "notifyTime": "18:30"}"#)
                .unwrap();
        assert_eq!(s.lead_days, 3);
        assert_eq!(s.theme, Theme::Dark);
        assert_eq!(s.notify_time, "18:30");
    }

    #[test]
    fn test_mistyped_field_keeps_the_rest() {
        let s: Settings = serde_json::from_str(
            r#"{"leadDays":7.5,"notify":true,"theme":"dark","notifyTime":"18:00"}"#,
        )
        .unwrap();
        assert_eq!(s.lead_days, 7);
        assert!(s.notify);
        assert_eq!(s.theme, Theme::Dark);
        assert_eq!(s.notify_time, "18:00");
    }

    #[test]
    fn test_unreadable_fields_fall_back_individually() {
        let s: Settings = serde_json::from_str(
            r#"{"leadDays":"3","notify":"yes","theme":"sepia","notifyTime":null}"#,
        )
        .unwrap();
        assert_eq!(s.lead_days, 3);
        assert!(!s.notify);
        assert_eq!(s.theme, Theme::Light);
        assert_eq!(s.notify_time, "09:00");
    }

    #[test]
    fn test_non_object_record_is_default() {
        let s: Settings = serde_json::from_str("[1, 2, 3]").unwrap();
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn test_normalized_clamps_lead_days() {
        let mut s = Settings {
            lead_days: 0,
            ..Settings::default()
        };
        assert_eq!(s.clone().normalized().lead_days, 1);
        s.lead_days = 40;
        assert_eq!(s.normalized().lead_days, 14);
    }

    #[test]
    fn test_normalized_fills_blank_notify_time() {
        let s = Settings {
            notify_time: " ".to_string(),
            ..Settings::default()
        };
        assert_eq!(s.normalized().notify_time, "09:00");
    }

    #[test]
    fn test_parse_24h() {
        assert_eq!(NotifyTime::parse("18:30"), NotifyTime { hour: 18, minute: 30 });
        assert_eq!(NotifyTime::parse("7"), NotifyTime { hour: 7, minute: 0 });
        assert_eq!(NotifyTime::parse("7:"), NotifyTime { hour: 7, minute: 0 });
    }

    #[test]
    fn test_parse_am_pm() {
        assert_eq!(NotifyTime::parse("9 pm"), NotifyTime { hour: 21, minute: 0 });
        assert_eq!(NotifyTime::parse("12:15AM"), NotifyTime { hour: 0, minute: 15 });
        assert_eq!(NotifyTime::parse("12pm"), NotifyTime { hour: 12, minute: 0 });
    }

    #[test]
    fn test_parse_clamps() {
        assert_eq!(NotifyTime::parse("27:75"), NotifyTime { hour: 23, minute: 59 });
    }

    #[test]
    fn test_parse_garbage_falls_back() {
        assert_eq!(NotifyTime::parse(""), NotifyTime::default());
        assert_eq!(NotifyTime::parse("noon"), NotifyTime::default());
    }

    #[test]
    fn test_notify_time_display() {
        assert_eq!(NotifyTime { hour: 9, minute: 5 }.to_string(), "09:05");
    }
}
