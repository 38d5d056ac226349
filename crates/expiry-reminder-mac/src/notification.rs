//! Desktop notifications through Notification Center.
//!
//! Notifications are posted with `osascript` running a one-line
//! `display notification` script, which needs no bundle or entitlement.

use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::debug;

/// Errors from showing a notification.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// `osascript` could not be started.
    #[error("failed to run osascript: {0}")]
    Spawn(#[from] std::io::Error),

    /// The script ran but reported failure.
    #[error("osascript exited with {status}: {stderr}")]
    Failed {
        /// Exit status as text.
        status: String,
        /// Captured standard error.
        stderr: String,
    },
}

/// Result type for notification operations.
pub type Result<T> = std::result::Result<T, NotificationError>;

/// Quote `text` as an AppleScript string literal.
fn quote(text: &str) -> String {
    let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

fn notification_script(app_name: &str, title: &str, body: &str) -> String {
    format!(
        "display notification {} with title {} subtitle {}",
        quote(body),
        quote(app_name),
        quote(title)
    )
}

/// Whether `osascript` can be run.
#[must_use]
pub fn notifications_available() -> bool {
    let available = Command::new("osascript")
        .args(["-e", "return 1"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success());
    debug!(available, "Probed osascript");
    available
}

/// Post a notification to Notification Center.
///
/// # Errors
///
/// Returns an error if `osascript` cannot be run or the script fails.
pub fn show_notification(app_name: &str, title: &str, body: &str) -> Result<()> {
    let output = Command::new("osascript")
        .arg("-e")
        .arg(notification_script(app_name, title, body))
        .stdin(Stdio::null())
        .output()?;

    if output.status.success() {
        debug!(title, "Notification posted");
        Ok(())
    } else {
        Err(NotificationError::Failed {
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}
