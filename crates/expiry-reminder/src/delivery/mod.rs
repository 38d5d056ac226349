//! Delivery gateway: showing reminders to the user.
//!
//! Reminders reach the user through a chain of [`NotificationBackend`]s
//! tried in order (the desktop notification service, then a foreground
//! console notification, then a blocking alert). Each backend is probed
//! once; a failing or unavailable backend hands over to the next one and no
//! error escapes the chain.
//!
//! System delivery needs the user's permission. Without it the gateway
//! reports [`Delivery::Unavailable`] and only the popup cards from
//! [`popup`] (which need no permission) reach the user.

pub mod console;
pub mod input;
pub mod permission;
pub mod popup;

use std::fmt::{self, Debug};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

pub use console::{AlertNotifier, ForegroundNotifier};
pub use input::TerminalInput;
pub use permission::StoredPermission;
pub use popup::{Popup, PopupCard, PopupPresenter, PopupResponse, TerminalPopup};

/// A notification to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Short title line.
    pub title: String,
    /// Body text.
    pub body: String,
}

impl Notification {
    /// Create a notification.
    #[must_use]
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Notification permission state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// The user has not been asked yet.
    #[default]
    Default,
    /// The user allowed notifications.
    Granted,
    /// The user refused notifications.
    Denied,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Granted => write!(f, "granted"),
            Self::Denied => write!(f, "denied"),
        }
    }
}

/// Where notification permission comes from.
#[async_trait::async_trait]
pub trait PermissionPrompt: Send + Sync + Debug {
    /// The current permission, without asking.
    fn current(&self) -> Permission;

    /// Ask the user. Only called while [`current`](Self::current) is
    /// [`Permission::Default`].
    async fn request(&self) -> Permission;
}

/// A way of showing a notification.
#[async_trait::async_trait]
pub trait NotificationBackend: Send + Sync + Debug {
    /// The name of this backend (for logging).
    fn name(&self) -> &'static str;

    /// Whether delivering through this backend needs notification permission.
    fn requires_permission(&self) -> bool {
        true
    }

    /// Probe or register the backend. `false` marks it unavailable.
    ///
    /// Called at most once per gateway.
    async fn register(&self) -> bool;

    /// Show a notification.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend could not show it.
    async fn show(&self, notification: &Notification) -> Result<()>;
}

/// Result of a delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Shown by the named backend.
    Delivered(&'static str),
    /// No backend could show it, or permission is missing.
    Unavailable,
}

#[derive(Debug)]
struct Registered {
    backend: Box<dyn NotificationBackend>,
    available: OnceCell<bool>,
}

impl Registered {
    async fn is_available(&self) -> bool {
        *self
            .available
            .get_or_init(|| async {
                let ok = self.backend.register().await;
                if ok {
                    info!(backend = self.backend.name(), "Notification backend ready");
                } else {
                    warn!(
                        backend = self.backend.name(),
                        "Notification backend unavailable, falling back"
                    );
                }
                ok
            })
            .await
    }
}

/// Permission-gated delivery over an ordered backend chain.
#[derive(Debug)]
pub struct DeliveryGateway {
    backends: Vec<Registered>,
    permission: Arc<dyn PermissionPrompt>,
}

impl DeliveryGateway {
    /// Create a gateway trying `backends` in order.
    #[must_use]
    pub fn new(
        backends: Vec<Box<dyn NotificationBackend>>,
        permission: Arc<dyn PermissionPrompt>,
    ) -> Self {
        Self {
            backends: backends
                .into_iter()
                .map(|backend| Registered {
                    backend,
                    available: OnceCell::new(),
                })
                .collect(),
            permission,
        }
    }

    /// Current permission state.
    #[must_use]
    pub fn permission(&self) -> Permission {
        self.permission.current()
    }

    /// Fail unless notification permission is granted. Never asks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PermissionDenied`] if permission is not granted.
    pub fn ensure_permitted(&self) -> Result<()> {
        if self.permission.current() == Permission::Granted {
            Ok(())
        } else {
            Err(Error::PermissionDenied)
        }
    }

    /// Make sure notification permission is granted, asking if undecided.
    ///
    /// A refusal is reported to the user with a blocking alert and `false`
    /// is returned.
    pub async fn request_permission(&self) -> bool {
        let mut permission = self.permission.current();
        if permission == Permission::Default {
            permission = self.permission.request().await;
        }
        info!(%permission, "Notification permission");

        if permission == Permission::Granted {
            return true;
        }
        self.alert(&Notification::new(
            "Notifications are blocked",
            "Allow notifications with `exprem notify permission` to receive reminders.",
        ))
        .await;
        false
    }

    /// Probe every backend once so the first reminder does not pay for it.
    pub async fn register_backends(&self) {
        for registered in &self.backends {
            registered.is_available().await;
        }
    }

    /// Names of the backends that registered successfully.
    pub async fn available_backends(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        for registered in &self.backends {
            if registered.is_available().await {
                names.push(registered.backend.name());
            }
        }
        names
    }

    /// Deliver a notification through the first backend that succeeds.
    pub async fn send(&self, notification: &Notification) -> Delivery {
        if self.permission.current() != Permission::Granted {
            debug!(title = %notification.title, "No notification permission, not delivering");
            return Delivery::Unavailable;
        }
        self.try_chain(notification, |_| true).await
    }

    /// Show a message through the backends that need no permission.
    pub async fn alert(&self, notification: &Notification) -> Delivery {
        self.try_chain(notification, |backend| !backend.requires_permission())
            .await
    }

    async fn try_chain(
        &self,
        notification: &Notification,
        eligible: impl Fn(&dyn NotificationBackend) -> bool,
    ) -> Delivery {
        for registered in &self.backends {
            let backend = registered.backend.as_ref();
            if !eligible(backend) || !registered.is_available().await {
                continue;
            }
            match backend.show(notification).await {
                Ok(()) => {
                    debug!(backend = backend.name(), title = %notification.title, "Notification delivered");
                    return Delivery::Delivered(backend.name());
                }
                Err(e) => {
                    warn!(backend = backend.name(), error = %e, "Notification failed, trying next backend");
                }
            }
        }
        warn!(title = %notification.title, "No notification backend could deliver");
        Delivery::Unavailable
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording fakes shared by the delivery, engine and scheduler tests.

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::error::Error;

    #[derive(Debug)]
    pub struct FakeBackend {
        pub name: &'static str,
        pub available: bool,
        pub fails: bool,
        pub needs_permission: bool,
        pub registrations: AtomicUsize,
        pub shown: Arc<Mutex<Vec<Notification>>>,
    }

    impl FakeBackend {
        pub fn new(name: &'static str) -> Self {
            Self {
                name,
                available: true,
                fails: false,
                needs_permission: true,
                registrations: AtomicUsize::new(0),
                shown: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn log(&self) -> Arc<Mutex<Vec<Notification>>> {
            Arc::clone(&self.shown)
        }
    }

    #[async_trait::async_trait]
    impl NotificationBackend for FakeBackend {
        fn name(&self) -> &'static str {
            self.name
        }

        fn requires_permission(&self) -> bool {
            self.needs_permission
        }

        async fn register(&self) -> bool {
            self.registrations.fetch_add(1, Ordering::SeqCst);
            self.available
        }

        async fn show(&self, notification: &Notification) -> Result<()> {
            if self.fails {
                return Err(Error::delivery(self.name, "simulated failure"));
            }
            self.shown.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    #[derive(Debug)]
    pub struct FakePermission {
        pub state: Mutex<Permission>,
        pub answer: Permission,
        pub asked: AtomicUsize,
    }

    impl FakePermission {
        pub fn new(state: Permission, answer: Permission) -> Self {
            Self {
                state: Mutex::new(state),
                answer,
                asked: AtomicUsize::new(0),
            }
        }

        pub fn granted() -> Self {
            Self::new(Permission::Granted, Permission::Granted)
        }
    }

    #[async_trait::async_trait]
    impl PermissionPrompt for FakePermission {
        fn current(&self) -> Permission {
            *self.state.lock().unwrap()
        }

        async fn request(&self) -> Permission {
            self.asked.fetch_add(1, Ordering::SeqCst);
            *self.state.lock().unwrap() = self.answer;
            self.answer
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::testing::{FakeBackend, FakePermission};
    use super::*;

    fn note() -> Notification {
        Notification::new("Expiring today", "Milk (Jan 10, 2024)")
    }

    #[tokio::test]
    async fn test_first_backend_wins() {
        let system = FakeBackend::new("system");
        let foreground = FakeBackend::new("foreground");
        let (system_log, foreground_log) = (system.log(), foreground.log());
        let gateway = DeliveryGateway::new(
            vec![Box::new(system), Box::new(foreground)],
            Arc::new(FakePermission::granted()),
        );

        assert_eq!(gateway.send(&note()).await, Delivery::Delivered("system"));
        assert_eq!(system_log.lock().unwrap().len(), 1);
        assert!(foreground_log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_falls_back_when_unavailable_or_failing() {
        let mut system = FakeBackend::new("system");
        system.available = false;
        let mut foreground = FakeBackend::new("foreground");
        foreground.fails = true;
        let mut alert = FakeBackend::new("alert");
        alert.needs_permission = false;
        let alert_log = alert.log();

        let gateway = DeliveryGateway::new(
            vec![Box::new(system), Box::new(foreground), Box::new(alert)],
            Arc::new(FakePermission::granted()),
        );

        assert_eq!(gateway.send(&note()).await, Delivery::Delivered("alert"));
        assert_eq!(alert_log.lock().unwrap()[0], note());
    }

    #[tokio::test]
    async fn test_nothing_available() {
        let mut system = FakeBackend::new("system");
        system.available = false;
        let gateway =
            DeliveryGateway::new(vec![Box::new(system)], Arc::new(FakePermission::granted()));
        assert_eq!(gateway.send(&note()).await, Delivery::Unavailable);
    }

    #[tokio::test]
    async fn test_registers_once() {
        let backend = Arc::new(FakeBackend::new("system"));

        #[derive(Debug)]
        struct Shared(Arc<FakeBackend>);

        #[async_trait::async_trait]
        impl NotificationBackend for Shared {
            fn name(&self) -> &'static str {
                self.0.name()
            }
            async fn register(&self) -> bool {
                self.0.register().await
            }
            async fn show(&self, notification: &Notification) -> Result<()> {
                self.0.show(notification).await
            }
        }

        let gateway = DeliveryGateway::new(
            vec![Box::new(Shared(Arc::clone(&backend)))],
            Arc::new(FakePermission::granted()),
        );
        gateway.register_backends().await;
        gateway.send(&note()).await;
        gateway.send(&note()).await;

        assert_eq!(backend.registrations.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.available_backends().await, vec!["system"]);
    }

    #[tokio::test]
    async fn test_denied_permission_blocks_delivery() {
        let system = FakeBackend::new("system");
        let mut alert = FakeBackend::new("alert");
        alert.needs_permission = false;
        let (system_log, alert_log) = (system.log(), alert.log());

        let gateway = DeliveryGateway::new(
            vec![Box::new(system), Box::new(alert)],
            Arc::new(FakePermission::new(Permission::Denied, Permission::Denied)),
        );

        assert_eq!(gateway.send(&note()).await, Delivery::Unavailable);
        assert!(system_log.lock().unwrap().is_empty());
        assert!(alert_log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_request_permission_asks_only_when_undecided() {
        let prompt = Arc::new(FakePermission::new(Permission::Default, Permission::Granted));
        let gateway = DeliveryGateway::new(vec![], prompt.clone());

        assert!(gateway.request_permission().await);
        assert!(gateway.request_permission().await);
        assert_eq!(prompt.asked.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.permission(), Permission::Granted);
    }

    #[tokio::test]
    async fn test_refusal_shows_blocking_message() {
        let system = FakeBackend::new("system");
        let mut alert = FakeBackend::new("alert");
        alert.needs_permission = false;
        let (system_log, alert_log) = (system.log(), alert.log());

        let gateway = DeliveryGateway::new(
            vec![Box::new(system), Box::new(alert)],
            Arc::new(FakePermission::new(Permission::Default, Permission::Denied)),
        );

        assert!(!gateway.request_permission().await);
        assert!(system_log.lock().unwrap().is_empty());
        let alerts = alert_log.lock().unwrap();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].title.contains("blocked"));
    }

    #[test]
    fn test_ensure_permitted() {
        let granted = DeliveryGateway::new(vec![], Arc::new(FakePermission::granted()));
        assert!(granted.ensure_permitted().is_ok());

        let undecided = DeliveryGateway::new(
            vec![],
            Arc::new(FakePermission::new(Permission::Default, Permission::Granted)),
        );
        assert!(undecided.ensure_permitted().unwrap_err().is_permission_error());
    }

    #[test]
    fn test_permission_serde() {
        assert_eq!(
            serde_json::to_string(&Permission::Granted).unwrap(),
            "\"granted\""
        );
        assert_eq!(Permission::default(), Permission::Default);
    }
}
