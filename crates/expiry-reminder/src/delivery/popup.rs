//! In-app popup cards.
//!
//! A popup lists the items of an alert group and offers two actions: dismiss,
//! or snooze for a while, after which a "snoozed" card with the same items
//! comes back. Popups need no notification permission.
//!
//! Presenting is fire-and-forget: [`PopupPresenter::present`] returns at
//! once and the card (and any snooze follow-up) runs as a task the presenter
//! owns. Cards are shown one at a time, in the order they were presented.

use std::fmt::Debug;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, info};

use super::console::clock_label;
use super::input::TerminalInput;
use crate::clock::Clock;
use crate::dedup::AlertKind;
use crate::item::{format_expiry, Item};

/// How the user answered a popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupResponse {
    /// Closed the card.
    Dismissed,
    /// Asked to see it again later.
    Snoozed,
}

/// Content of a popup card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupCard {
    /// Heading.
    pub title: String,
    /// Line under the heading.
    pub subtitle: String,
    /// Tag shown next to each item.
    pub chip: &'static str,
    /// Items listed on the card.
    pub items: Vec<Item>,
    /// Whether the card offers a snooze action.
    pub snoozable: bool,
}

impl PopupCard {
    /// Card for an alert group shown at `at`.
    #[must_use]
    pub fn for_alert(kind: AlertKind, items: Vec<Item>, at: chrono::NaiveDateTime) -> Self {
        let (title, chip) = match kind {
            AlertKind::Today => ("Items expiring today", "Today"),
            AlertKind::Soon | AlertKind::Expired => ("Upcoming expiries", "Soon"),
        };
        Self {
            title: title.to_string(),
            subtitle: format!("at {}", clock_label(at)),
            chip,
            items,
            snoozable: true,
        }
    }

    /// Card shown when a snooze runs out.
    #[must_use]
    pub fn snoozed(items: Vec<Item>) -> Self {
        Self {
            title: "Reminder (Snoozed)".to_string(),
            subtitle: "Here are the items you snoozed:".to_string(),
            chip: "Soon",
            items,
            snoozable: false,
        }
    }

    /// Labels of the card's action buttons, primary last.
    #[must_use]
    pub fn actions(&self, snooze_minutes: u64) -> Vec<String> {
        if self.snoozable {
            vec![format!("Snooze {snooze_minutes} min"), "Got it".to_string()]
        } else {
            vec!["Close".to_string()]
        }
    }

    /// Plain-text rendering of the card.
    #[must_use]
    pub fn render(&self, snooze_minutes: u64) -> String {
        let mut out = format!("== {} ==\n   {}\n", self.title, self.subtitle);
        for item in &self.items {
            out.push_str(&format!(
                "   * {}  Expiry: {}  [{}]\n",
                item.name,
                format_expiry(&item.expiry),
                self.chip
            ));
        }
        let actions = self
            .actions(snooze_minutes)
            .iter()
            .map(|a| format!("[{a}]"))
            .collect::<Vec<_>>()
            .join(" ");
        out.push_str("   ");
        out.push_str(&actions);
        out
    }
}

/// Something that can show a popup card and wait for the answer.
#[async_trait::async_trait]
pub trait Popup: Send + Sync + Debug {
    /// Show `card` and wait until the user answers.
    async fn show(&self, card: &PopupCard) -> PopupResponse;
}

/// Popup printed on the terminal.
///
/// With terminal input, a snoozable card waits for a line: `s` snoozes,
/// anything else dismisses. Otherwise cards are printed and count as
/// dismissed.
#[derive(Debug, Clone)]
pub struct TerminalPopup {
    input: Option<Arc<TerminalInput>>,
    snooze_minutes: u64,
}

impl TerminalPopup {
    /// Create a terminal popup that reads answers from `input`, if any.
    #[must_use]
    pub fn new(input: Option<Arc<TerminalInput>>, snooze_minutes: u64) -> Self {
        Self {
            input,
            snooze_minutes,
        }
    }
}

#[async_trait::async_trait]
impl Popup for TerminalPopup {
    async fn show(&self, card: &PopupCard) -> PopupResponse {
        let text = card.render(self.snooze_minutes);
        {
            let mut stdout = std::io::stdout().lock();
            let _ = writeln!(stdout, "{text}");
            let _ = stdout.flush();
        }

        let Some(input) = self.input.as_ref().filter(|_| card.snoozable) else {
            return PopupResponse::Dismissed;
        };

        match input.next_line().await {
            Some(line) if line.trim().eq_ignore_ascii_case("s") => PopupResponse::Snoozed,
            Some(_) => PopupResponse::Dismissed,
            None => {
                debug!("Input closed, popup dismissed");
                PopupResponse::Dismissed
            }
        }
    }
}

/// Runs popup cards as owned background tasks.
#[derive(Debug)]
pub struct PopupPresenter {
    popup: Arc<dyn Popup>,
    clock: Arc<dyn Clock>,
    snooze_delay: Duration,
    display: Arc<tokio::sync::Mutex<()>>,
    tasks: Mutex<JoinSet<()>>,
}

impl PopupPresenter {
    /// Create a presenter.
    #[must_use]
    pub fn new(popup: Arc<dyn Popup>, clock: Arc<dyn Clock>, snooze_delay: Duration) -> Self {
        Self {
            popup,
            clock,
            snooze_delay,
            display: Arc::new(tokio::sync::Mutex::new(())),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Show a card for an alert group without waiting for the answer.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn present(&self, kind: AlertKind, items: Vec<Item>) {
        if items.is_empty() {
            return;
        }
        let card = PopupCard::for_alert(kind, items, self.clock.now());
        let popup = Arc::clone(&self.popup);
        let display = Arc::clone(&self.display);
        let snooze_delay = self.snooze_delay;

        debug!(%kind, items = card.items.len(), "Presenting popup");
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            let response = {
                let _shown = display.lock().await;
                popup.show(&card).await
            };
            if response != PopupResponse::Snoozed {
                return;
            }

            info!(%kind, delay_secs = snooze_delay.as_secs(), "Popup snoozed");
            tokio::time::sleep(snooze_delay).await;
            let _shown = display.lock().await;
            popup.show(&PopupCard::snoozed(card.items)).await;
        });
    }

    /// Number of popups still showing or snoozed.
    #[must_use]
    pub fn pending(&self) -> usize {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}
        tasks.len()
    }

    /// Drop every open or snoozed popup.
    pub fn cancel_all(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if !tasks.is_empty() {
            debug!(count = tasks.len(), "Cancelling popups");
        }
        tasks.abort_all();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Records every card and answers from a fixed script.
    #[derive(Debug, Default)]
    pub struct RecordingPopup {
        pub cards: Mutex<Vec<PopupCard>>,
        pub snooze_first: bool,
    }

    impl RecordingPopup {
        pub fn titles(&self) -> Vec<String> {
            self.cards
                .lock()
                .unwrap()
                .iter()
                .map(|c| c.title.clone())
                .collect()
        }
    }

    #[async_trait::async_trait]
    impl Popup for RecordingPopup {
        async fn show(&self, card: &PopupCard) -> PopupResponse {
            let mut cards = self.cards.lock().unwrap();
            let first = cards.is_empty();
            cards.push(card.clone());
            if self.snooze_first && first {
                PopupResponse::Snoozed
            } else {
                PopupResponse::Dismissed
            }
        }
    }
}
