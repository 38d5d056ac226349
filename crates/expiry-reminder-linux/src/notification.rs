//! Desktop notifications through `notify-send`.

use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::debug;

/// The notification helper binary.
const NOTIFY_SEND: &str = "notify-send";

/// Errors from showing a desktop notification.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The helper could not be started.
    #[error("failed to run notify-send: {0}")]
    Spawn(#[from] std::io::Error),

    /// The helper ran but reported failure.
    #[error("notify-send exited with {status}: {stderr}")]
    Failed {
        /// Exit status as text.
        status: String,
        /// Captured standard error.
        stderr: String,
    },
}

/// Result type for notification operations.
pub type Result<T> = std::result::Result<T, NotificationError>;

/// Whether `notify-send` is installed and runs.
#[must_use]
pub fn notifications_available() -> bool {
    let available = Command::new(NOTIFY_SEND)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success());
    debug!(available, "Probed {NOTIFY_SEND}");
    available
}

fn notify_args(app_name: &str, title: &str, body: &str) -> Vec<String> {
    vec![
        format!("--app-name={app_name}"),
        "--urgency=normal".to_string(),
        "--".to_string(),
        title.to_string(),
        body.to_string(),
    ]
}

/// Show a desktop notification.
///
/// # Errors
///
/// Returns an error if `notify-send` cannot be run or fails.
pub fn show_notification(app_name: &str, title: &str, body: &str) -> Result<()> {
    let output = Command::new(NOTIFY_SEND)
        .args(notify_args(app_name, title, body))
        .stdin(Stdio::null())
        .output()?;

    if output.status.success() {
        debug!(title, "Desktop notification shown");
        Ok(())
    } else {
        Err(NotificationError::Failed {
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}
