//! Remembered notification permission.

use std::io::Write;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::input::TerminalInput;
use super::{Permission, PermissionPrompt};
use crate::error::Result;
use crate::storage::{self, SharedStorage, PERMISSION_KEY};

/// Permission stored in the record store, asked for on the terminal.
///
/// Without terminal input the state stays [`Permission::Default`] until
/// set with [`StoredPermission::set`].
#[derive(Debug)]
pub struct StoredPermission {
    storage: SharedStorage,
    input: Option<Arc<TerminalInput>>,
}

impl StoredPermission {
    /// Create a permission source over `storage`, asking on `input` if any.
    #[must_use]
    pub fn new(storage: SharedStorage, input: Option<Arc<TerminalInput>>) -> Self {
        Self { storage, input }
    }

    /// Record a decision.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn set(&self, permission: Permission) -> Result<()> {
        storage::lock(&self.storage).put_record(PERMISSION_KEY, &permission)?;
        info!(%permission, "Notification permission recorded");
        Ok(())
    }

    async fn ask(input: &TerminalInput) -> Permission {
        {
            let mut stderr = std::io::stderr().lock();
            let _ = write!(
                stderr,
                "Allow Expiry Reminder to show desktop notifications? [y/N] "
            );
            let _ = stderr.flush();
        }

        match input.next_line().await {
            Some(answer) => parse_answer(&answer),
            None => Permission::Default,
        }
    }
}

fn parse_answer(answer: &str) -> Permission {
    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => Permission::Granted,
        _ => Permission::Denied,
    }
}

#[async_trait::async_trait]
impl PermissionPrompt for StoredPermission {
    fn current(&self) -> Permission {
        match storage::lock(&self.storage).get_record::<Permission>(PERMISSION_KEY) {
            Ok(permission) => permission.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Failed to read notification permission");
                Permission::Default
            }
        }
    }

    async fn request(&self) -> Permission {
        let Some(input) = &self.input else {
            debug!("No terminal to ask for notification permission");
            return self.current();
        };

        let answer = Self::ask(input).await;
        if answer != Permission::Default {
            if let Err(e) = self.set(answer) {
                warn!(error = %e, "Failed to remember notification permission");
            }
        }
        answer
    }
}
