//! Command-line interface for expiry-reminder.
//!
//! This module provides the CLI structure for the `exprem` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AddCommand, ClearCommand, ConfigCommand, DaemonCommand, DeleteCommand, ListCommand,
    NotifyCommand, SettingsCommand, StatusCommand, ThemeArg, Toggle,
};

/// exprem - Keep track of things before they expire
///
/// Stores items with expiry dates and reminds you, once a day per change,
/// about what expires today and what expires soon.
#[derive(Debug, Parser)]
#[command(name = "exprem")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add an item
    Add(AddCommand),

    /// List all items by expiry
    List(ListCommand),

    /// Show today, upcoming and safe items
    Dashboard(ListCommand),

    /// Delete an item
    Delete(DeleteCommand),

    /// Delete every item
    Clear(ClearCommand),

    /// Show counts, categories and the two-week timeline
    Analytics(ListCommand),

    /// View or change settings
    #[command(subcommand)]
    Settings(SettingsCommand),

    /// Reminder checks and notification permission
    #[command(subcommand)]
    Notify(NotifyCommand),

    /// Run the reminder daemon
    #[command(subcommand)]
    Daemon(DaemonCommand),

    /// Show store and reminder status
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn status_cli(verbose: u8, quiet: bool) -> Cli {
        Cli {
            config: None,
            verbose,
            quiet,
            command: Command::Status(StatusCommand { json: false }),
        }
    }

    #[test]
    fn test_cli_name() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "exprem");
    }

    #[test]
    fn test_verbosity() {
        use crate::logging::Verbosity;
        assert_eq!(status_cli(0, true).verbosity(), Verbosity::Quiet);
        assert_eq!(status_cli(0, false).verbosity(), Verbosity::Normal);
        assert_eq!(status_cli(1, false).verbosity(), Verbosity::Verbose);
        assert_eq!(status_cli(2, false).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_add() {
        let args = vec![
            "exprem", "add", "--name", "Milk", "--category", "Dairy", "--expiry", "2024-01-10",
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        let Command::Add(add) = cli.command else {
            panic!("expected add");
        };
        assert_eq!(add.name, "Milk");
        assert_eq!(add.expiry.to_string(), "2024-01-10");
        assert!(add.quantity.is_none());
    }

    #[test]
    fn test_parse_add_rejects_bad_date() {
        let args = vec![
            "exprem", "add", "--name", "Milk", "--category", "Dairy", "--expiry", "soon",
        ];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_parse_settings_notify() {
        let cli = Cli::try_parse_from(["exprem", "settings", "notify", "on"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Settings(SettingsCommand::Notify { state: Toggle::On })
        ));
    }

    #[test]
    fn test_parse_notify_time() {
        let cli = Cli::try_parse_from(["exprem", "settings", "notify-time", "6pm"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Settings(SettingsCommand::NotifyTime { ref time }) if time == "6pm"
        ));
    }

    #[test]
    fn test_parse_permission_flags_conflict() {
        assert!(
            Cli::try_parse_from(["exprem", "notify", "permission", "--grant", "--deny"]).is_err()
        );
        assert!(Cli::try_parse_from(["exprem", "notify", "permission", "--reset"]).is_ok());
    }

    #[test]
    fn test_parse_daemon_start() {
        let cli = Cli::try_parse_from(["exprem", "daemon", "start", "--interactive"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Daemon(DaemonCommand::Start { interactive: true })
        ));
    }

    #[test]
    fn test_parse_clear_requires_nothing_but_yes_flag() {
        let cli = Cli::try_parse_from(["exprem", "clear"]).unwrap();
        assert!(matches!(cli.command, Command::Clear(ClearCommand { yes: false })));
    }

    #[test]
    fn test_parse_with_config() {
        let args = vec!["exprem", "-c", "/custom/config.toml", "status"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_parse_with_verbose() {
        let cli = Cli::try_parse_from(["exprem", "-v", "list"]).unwrap();
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn test_parse_with_quiet() {
        let cli = Cli::try_parse_from(["exprem", "-q", "dashboard"]).unwrap();
        assert!(cli.quiet);
    }
}
