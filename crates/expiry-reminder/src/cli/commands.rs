//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Subcommand, ValueEnum};

use crate::settings::Theme;

/// Add command arguments.
#[derive(Debug, Args)]
pub struct AddCommand {
    /// Item name
    #[arg(short, long)]
    pub name: String,

    /// Category (for example "Dairy")
    #[arg(short = 'k', long)]
    pub category: String,

    /// Expiry date as YYYY-MM-DD
    #[arg(short, long, value_parser = parse_date)]
    pub expiry: NaiveDate,

    /// Optional quantity
    #[arg(long)]
    pub quantity: Option<String>,
}

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Delete command arguments.
#[derive(Debug, Args)]
pub struct DeleteCommand {
    /// Identifier of the item to delete
    pub id: String,
}

/// Clear command arguments.
#[derive(Debug, Args)]
pub struct ClearCommand {
    /// Confirm removing every item
    #[arg(short, long)]
    pub yes: bool,
}

/// Settings commands.
#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    /// Show the current settings
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Set how many days ahead counts as "soon" (1-14)
    LeadDays {
        /// Number of days
        days: u32,
    },

    /// Set the display theme
    Theme {
        /// Theme name
        #[arg(value_enum)]
        theme: ThemeArg,
    },

    /// Switch daily reminders on or off
    Notify {
        /// New state
        #[arg(value_enum)]
        state: Toggle,
    },

    /// Set the daily reminder time (for example "09:00" or "6pm")
    NotifyTime {
        /// Time of day
        time: String,
    },
}

/// Notification commands.
#[derive(Debug, Subcommand)]
pub enum NotifyCommand {
    /// Run one check cycle now
    Check {
        /// Output the report as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Send a test notification
    Test,

    /// Show or change the notification permission
    Permission {
        /// Forget the recorded decision and ask again
        #[arg(long, conflicts_with_all = ["grant", "deny"])]
        reset: bool,

        /// Allow notifications without asking
        #[arg(long, conflicts_with = "deny")]
        grant: bool,

        /// Refuse notifications
        #[arg(long)]
        deny: bool,
    },
}

/// Daemon commands.
#[derive(Debug, Subcommand)]
pub enum DaemonCommand {
    /// Run the reminder daemon in the foreground until interrupted
    Start {
        /// Wait for Got it / Snooze answers on popup cards
        #[arg(short, long)]
        interactive: bool,
    },
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Theme argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ThemeArg {
    /// Light theme
    Light,
    /// Dark theme
    Dark,
}

impl From<ThemeArg> for Theme {
    fn from(arg: ThemeArg) -> Self {
        match arg {
            ThemeArg::Light => Self::Light,
            ThemeArg::Dark => Self::Dark,
        }
    }
}

/// On/off argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    /// Switch on
    On,
    /// Switch off
    Off,
}

impl Toggle {
    /// Whether this is [`Toggle::On`].
    #[must_use]
    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    crate::item::parse_expiry(value)
        .ok_or_else(|| format!("invalid date '{value}', expected YYYY-MM-DD"))
}
