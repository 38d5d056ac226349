//! Terminal notification backends.

use std::io::{IsTerminal, Write};

use chrono::NaiveDateTime;

use super::{Notification, NotificationBackend};
use crate::error::{Error, Result};

/// Prints notifications on stdout while a terminal is attached.
#[derive(Debug, Default)]
pub struct ForegroundNotifier;

#[async_trait::async_trait]
impl NotificationBackend for ForegroundNotifier {
    fn name(&self) -> &'static str {
        "foreground"
    }

    async fn register(&self) -> bool {
        std::io::stdout().is_terminal()
    }

    async fn show(&self, notification: &Notification) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        writeln!(
            stdout,
            "[{}] {}\n        {}",
            clock_label(chrono::Local::now().naive_local()),
            notification.title,
            notification.body
        )
        .map_err(|e| Error::delivery("foreground", e.to_string()))
    }
}

/// Blocking alert on stderr with a terminal bell. Needs no permission.
#[derive(Debug, Default)]
pub struct AlertNotifier;

impl AlertNotifier {
    fn render(notification: &Notification) -> String {
        format!("\x07!! {}\n   {}", notification.title, notification.body)
    }
}

#[async_trait::async_trait]
impl NotificationBackend for AlertNotifier {
    fn name(&self) -> &'static str {
        "alert"
    }

    fn requires_permission(&self) -> bool {
        false
    }

    async fn register(&self) -> bool {
        true
    }

    async fn show(&self, notification: &Notification) -> Result<()> {
        let mut stderr = std::io::stderr().lock();
        writeln!(stderr, "{}", Self::render(notification))
            .map_err(|e| Error::delivery("alert", e.to_string()))
    }
}

/// Format a wall-clock time the way cards and notifications show it.
#[must_use]
pub fn clock_label(at: NaiveDateTime) -> String {
    at.format("%H:%M").to_string()
}
