//! Test harness for relay delivery.
//!
//! [`MemoryChannel`] stands in for a messaging platform. It records every
//! successful send and can be told to fail or stall particular recipients,
//! or to behave as if the platform were down.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::channel::{ChannelError, NotificationChannel};

/// A message accepted by [`MemoryChannel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub recipient: String,
    pub text: String,
}

#[derive(Default)]
struct State {
    sent: Vec<SentMessage>,
    failures: HashMap<String, ChannelError>,
    delays: HashMap<String, Duration>,
    unavailable: bool,
}

/// In-memory [`NotificationChannel`].
#[derive(Default)]
pub struct MemoryChannel {
    state: Mutex<State>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Messages accepted so far, in send order.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.state().sent.clone()
    }

    /// Make every send to `recipient` fail with `error`.
    pub fn fail_recipient(&self, recipient: impl Into<String>, error: ChannelError) {
        self.state().failures.insert(recipient.into(), error);
    }

    /// Stall every send to `recipient` for `delay` before it completes.
    pub fn delay_recipient(&self, recipient: impl Into<String>, delay: Duration) {
        self.state().delays.insert(recipient.into(), delay);
    }

    /// Fail every send with a transport error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }
}

#[async_trait]
impl NotificationChannel for MemoryChannel {
    async fn send_message(&self, recipient: &str, text: &str) -> Result<(), ChannelError> {
        let delay = self.state().delays.get(recipient).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        if state.unavailable {
            return Err(ChannelError::Transport("connection refused".into()));
        }
        if let Some(error) = state.failures.get(recipient) {
            return Err(error.clone());
        }
        state.sent.push(SentMessage {
            recipient: recipient.to_owned(),
            text: text.to_owned(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_sends_in_order() {
        let channel = MemoryChannel::new();
        channel.send_message("1", "a").await.unwrap();
        channel.send_message("2", "b").await.unwrap();

        let sent = channel.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], SentMessage { recipient: "1".into(), text: "a".into() });
        assert_eq!(sent[1].recipient, "2");
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let channel = MemoryChannel::new();
        channel.fail_recipient("x", ChannelError::Rejected("Forbidden".into()));

        assert_eq!(
            channel.send_message("x", "a").await,
            Err(ChannelError::Rejected("Forbidden".into()))
        );
        assert!(channel.send_message("y", "a").await.is_ok());

        channel.set_unavailable(true);
        assert!(matches!(
            channel.send_message("y", "a").await,
            Err(ChannelError::Transport(_))
        ));
        assert_eq!(channel.sent().len(), 1);
    }
}
