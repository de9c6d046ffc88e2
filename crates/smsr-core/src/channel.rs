//! The outbound send primitive.

use std::time::Duration;

use async_trait::async_trait;

/// Why a single send failed. The `Display` text is reported back to the
/// device as the per-recipient failure reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// The request never got a usable answer (connect, TLS, decode).
    #[error("transport error: {0}")]
    Transport(String),

    /// The messaging platform answered and refused the message.
    #[error("{0}")]
    Rejected(String),

    #[error("send timed out after {0:?}")]
    Timeout(Duration),
}

/// A messaging platform client able to deliver one text to one recipient.
///
/// Implementations must be cheap to share behind an `Arc` and safe to call
/// concurrently from independent batches.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Deliver `text` to `recipient`, an opaque platform identifier.
    async fn send_message(&self, recipient: &str, text: &str) -> Result<(), ChannelError>;
}
