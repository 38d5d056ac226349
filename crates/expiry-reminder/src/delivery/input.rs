//! Line input shared by the terminal prompts.
//!
//! One detached thread reads stdin and hands lines over a channel. Prompts
//! take turns on the receiver, so two prompts never split one line between
//! them. A prompt that is cancelled while waiting consumes nothing, and a
//! read still pending at shutdown does not keep the process alive.

use std::io::BufRead;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// Lines typed on the terminal.
#[derive(Debug)]
pub struct TerminalInput {
    lines: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl TerminalInput {
    /// Start reading stdin on a background thread.
    #[must_use]
    pub fn stdin() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let spawned = std::thread::Builder::new()
            .name("stdin-reader".to_string())
            .spawn(move || {
                for line in std::io::stdin().lock().lines() {
                    match line {
                        Ok(line) => {
                            if sender.send(line).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "Failed to read from stdin");
                            break;
                        }
                    }
                }
                debug!("Stdin reader finished");
            });
        if let Err(e) = spawned {
            warn!(error = %e, "Failed to start the stdin reader");
        }
        Self::from_receiver(receiver)
    }

    pub(crate) fn from_receiver(receiver: mpsc::UnboundedReceiver<String>) -> Self {
        Self {
            lines: Mutex::new(receiver),
        }
    }

    /// Wait for the next line typed after this call.
    ///
    /// Lines typed while no prompt was waiting are discarded. Returns `None`
    /// once stdin is closed.
    pub async fn next_line(&self) -> Option<String> {
        let mut lines = self.lines.lock().await;
        while lines.try_recv().is_ok() {}
        lines.recv().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_stale_lines_are_dropped() {
        let (sender, receiver) = mpsc::unbounded_channel();
        let input = TerminalInput::from_receiver(receiver);
        sender.send("typed too early".to_string()).unwrap();

        let waiting = tokio::spawn(async move { input.next_line().await });
        tokio::task::yield_now().await;
        sender.send("s".to_string()).unwrap();

        assert_eq!(waiting.await.unwrap().as_deref(), Some("s"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_prompt_leaves_the_line() {
        let (sender, receiver) = mpsc::unbounded_channel();
        let input = Arc::new(TerminalInput::from_receiver(receiver));

        let first = tokio::time::timeout(Duration::from_secs(1), input.next_line()).await;
        assert!(first.is_err());

        let second = tokio::spawn({
            let input = Arc::clone(&input);
            async move { input.next_line().await }
        });
        tokio::task::yield_now().await;
        sender.send("y".to_string()).unwrap();
        assert_eq!(second.await.unwrap().as_deref(), Some("y"));
    }

    #[tokio::test]
    async fn test_closed_input_ends() {
        let (sender, receiver) = mpsc::unbounded_channel::<String>();
        drop(sender);
        let input = TerminalInput::from_receiver(receiver);
        assert_eq!(input.next_line().await, None);
    }
}
