//! Batch dispatch.
//!
//! A batch is one inbound JSON array of notification entries. Each entry is
//! validated, rendered once and sent to every one of its recipients through
//! the injected [`NotificationChannel`]. Failures are recorded per entry or
//! per recipient and never abort the batch. The resulting [`BatchReport`]
//! lists results in input order (entry, then recipient) and classifies the
//! batch as a whole.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::channel::{ChannelError, NotificationChannel};
use crate::errors::FormatError;
use crate::format::render_content;
use crate::notification::NotificationEntry;

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    Failed(String),
}

/// Outcome for one (entry, recipient) pair.
///
/// `recipient` is `None` when the entry failed validation and no send was
/// attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResult {
    pub index: usize,
    pub recipient: Option<String>,
    pub status: DeliveryStatus,
}

impl DeliveryResult {
    pub fn is_delivered(&self) -> bool {
        matches!(self.status, DeliveryStatus::Delivered)
    }

    /// Failure reason, if any.
    pub fn error(&self) -> Option<&str> {
        match &self.status {
            DeliveryStatus::Delivered => None,
            DeliveryStatus::Failed(reason) => Some(reason),
        }
    }
}

/// Aggregate classification of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Nothing was delivered and something failed. The channel may be down.
    AllFailed,
    /// Some deliveries succeeded, some entries or recipients failed.
    PartialSuccess,
    /// No failures. An empty batch lands here with `delivered == 0`.
    AllSuccess { delivered: usize },
}

/// Ordered results of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    results: Vec<DeliveryResult>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> &[DeliveryResult] {
        &self.results
    }

    pub fn successful(&self) -> impl Iterator<Item = &DeliveryResult> {
        self.results.iter().filter(|r| r.is_delivered())
    }

    pub fn failed(&self) -> impl Iterator<Item = &DeliveryResult> {
        self.results.iter().filter(|r| !r.is_delivered())
    }

    pub fn delivered_count(&self) -> usize {
        self.successful().count()
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }

    /// Entries rejected before any send was attempted.
    pub fn rejected_entries(&self) -> usize {
        self.results.iter().filter(|r| r.recipient.is_none()).count()
    }

    /// Classify the batch.
    ///
    /// A batch in which every entry failed validation (for example, every
    /// entry is missing `ids`) is `AllFailed`, not a request-format error.
    /// Devices rely on that 503 mapping to retry later, so it is kept even
    /// though it looks like a client error.
    pub fn outcome(&self) -> BatchOutcome {
        let delivered = self.delivered_count();
        let failed = self.results.len() - delivered;
        match (delivered, failed) {
            (0, f) if f > 0 => BatchOutcome::AllFailed,
            (_, f) if f > 0 => BatchOutcome::PartialSuccess,
            (d, _) => BatchOutcome::AllSuccess { delivered: d },
        }
    }

    fn record(&mut self, index: usize, recipient: Option<String>, status: DeliveryStatus) {
        self.results.push(DeliveryResult {
            index,
            recipient,
            status,
        });
    }
}

/// Decode a request body into the raw entries of a batch.
pub fn parse_batch(body: &[u8]) -> Result<Vec<Value>, FormatError> {
    let value: Value = serde_json::from_slice(body).map_err(|_| FormatError::InvalidJson)?;
    match value {
        Value::Array(entries) => Ok(entries),
        _ => Err(FormatError::NotAnArray),
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Fans batches out to recipients through one channel.
///
/// Processing is sequential: entries in input order, recipients in list
/// order. Dispatchers hold no per-batch state and can serve concurrent
/// batches.
pub struct BatchDispatcher {
    channel: Arc<dyn NotificationChannel>,
    send_timeout: Option<Duration>,
}

impl BatchDispatcher {
    pub fn new(channel: Arc<dyn NotificationChannel>) -> Self {
        Self {
            channel,
            send_timeout: None,
        }
    }

    /// Bound every individual send. A send that exceeds it is recorded as
    /// failed for that recipient only.
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = Some(timeout);
        self
    }

    /// Parse a request body and dispatch it.
    pub async fn dispatch_body(&self, body: &[u8]) -> Result<BatchReport, FormatError> {
        let entries = parse_batch(body)?;
        Ok(self.dispatch(entries).await)
    }

    /// Validate, render and send every entry of a parsed batch.
    pub async fn dispatch(&self, entries: Vec<Value>) -> BatchReport {
        let mut report = BatchReport::new();
        let total = entries.len();

        for (index, raw) in entries.into_iter().enumerate() {
            let notification =
                match NotificationEntry::from_value(raw).and_then(|entry| entry.validate()) {
                    Ok(n) => n,
                    Err(e) => {
                        warn!("entry {} rejected: {}", index, e);
                        report.record(index, None, DeliveryStatus::Failed(e.to_string()));
                        continue;
                    }
                };

            let text = render_content(&notification.content);
            self.deliver_into(&mut report, index, &text, &notification.recipients)
                .await;
        }

        info!(
            "batch of {} entries: {} delivered, {} failed",
            total,
            report.delivered_count(),
            report.failed_count()
        );
        report
    }

    /// Send pre-rendered text to a recipient list as a single-entry batch
    /// whose results all carry `index`.
    pub async fn deliver(&self, index: usize, text: &str, recipients: &[String]) -> BatchReport {
        let mut report = BatchReport::new();
        self.deliver_into(&mut report, index, text, recipients).await;
        info!(
            "delivered entry {} to {} of {} recipients",
            index,
            report.delivered_count(),
            recipients.len()
        );
        report
    }

    async fn deliver_into(
        &self,
        report: &mut BatchReport,
        index: usize,
        text: &str,
        recipients: &[String],
    ) {
        for recipient in recipients {
            let status = match self.send_one(recipient, text).await {
                Ok(()) => {
                    debug!("entry {} delivered to {}", index, recipient);
                    DeliveryStatus::Delivered
                }
                Err(e) => {
                    warn!("failed to send entry {} to {}: {}", index, recipient, e);
                    DeliveryStatus::Failed(e.to_string())
                }
            };
            report.record(index, Some(recipient.clone()), status);
        }
    }

    async fn send_one(&self, recipient: &str, text: &str) -> Result<(), ChannelError> {
        let send = self.channel.send_message(recipient, text);
        match self.send_timeout {
            Some(limit) => tokio::time::timeout(limit, send)
                .await
                .map_err(|_| ChannelError::Timeout(limit))?,
            None => send.await,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::MemoryChannel;
    use serde_json::json;

    fn entries(value: Value) -> Vec<Value> {
        match value {
            Value::Array(v) => v,
            _ => panic!("test batch must be an array"),
        }
    }

    #[test]
    fn test_parse_batch() {
        assert_eq!(parse_batch(b"not json"), Err(FormatError::InvalidJson));
        assert_eq!(parse_batch(br#"{"ids": "1"}"#), Err(FormatError::NotAnArray));
        assert_eq!(parse_batch(b"[]").unwrap().len(), 0);
        assert_eq!(parse_batch(br#"[{}, 1]"#).unwrap().len(), 2);
    }

    #[test]
    fn test_outcome_classification() {
        let mut report = BatchReport::new();
        assert_eq!(report.outcome(), BatchOutcome::AllSuccess { delivered: 0 });

        report.record(0, Some("a".into()), DeliveryStatus::Delivered);
        assert_eq!(report.outcome(), BatchOutcome::AllSuccess { delivered: 1 });

        report.record(1, None, DeliveryStatus::Failed("bad".into()));
        assert_eq!(report.outcome(), BatchOutcome::PartialSuccess);

        let mut report = BatchReport::new();
        report.record(0, None, DeliveryStatus::Failed("bad".into()));
        assert_eq!(report.outcome(), BatchOutcome::AllFailed);
    }

    #[tokio::test]
    async fn test_dispatch_sms_to_all_recipients() {
        let channel = Arc::new(MemoryChannel::new());
        let dispatcher = BatchDispatcher::new(channel.clone());

        let report = dispatcher
            .dispatch(entries(json!([{"ids": "1, 2", "sms": "Code 9999"}])))
            .await;

        assert_eq!(report.outcome(), BatchOutcome::AllSuccess { delivered: 2 });
        let sent = channel.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].recipient, "1");
        assert_eq!(sent[1].recipient, "2");
        assert!(sent.iter().all(|m| m.text == "Code `9999`"));
    }

    #[tokio::test]
    async fn test_invalid_entry_does_not_abort_batch() {
        let channel = Arc::new(MemoryChannel::new());
        let dispatcher = BatchDispatcher::new(channel.clone());

        let report = dispatcher
            .dispatch(entries(json!([
                {"ids": "1"},
                "garbage",
                {"ids": "2", "call": true, "from": "+15550001234", "to": "SIM 1"}
            ])))
            .await;

        assert_eq!(report.outcome(), BatchOutcome::PartialSuccess);
        assert_eq!(report.rejected_entries(), 2);
        let failed: Vec<_> = report.failed().collect();
        assert_eq!(failed[0].index, 0);
        assert_eq!(failed[0].error(), Some("Either 'sms' or 'call' field is required"));
        assert_eq!(failed[1].index, 1);
        assert_eq!(failed[1].error(), Some("Invalid message format: expected object"));
        assert_eq!(channel.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_recipient_failure_is_isolated() {
        let channel = Arc::new(MemoryChannel::new());
        channel.fail_recipient("bad", ChannelError::Rejected("Bad Request: chat not found".into()));
        let dispatcher = BatchDispatcher::new(channel.clone());

        let report = dispatcher
            .dispatch(entries(json!([{"ids": "good,bad,also-good", "sms": "hi"}])))
            .await;

        assert_eq!(report.outcome(), BatchOutcome::PartialSuccess);
        let recipients: Vec<_> = report
            .results()
            .iter()
            .map(|r| r.recipient.as_deref().unwrap())
            .collect();
        assert_eq!(recipients, vec!["good", "bad", "also-good"]);
        assert_eq!(
            report.results()[1].status,
            DeliveryStatus::Failed("Bad Request: chat not found".into())
        );
    }

    #[tokio::test]
    async fn test_channel_down_is_all_failed() {
        let channel = Arc::new(MemoryChannel::new());
        channel.set_unavailable(true);
        let dispatcher = BatchDispatcher::new(channel);

        let report = dispatcher
            .dispatch(entries(json!([{"ids": "1,2", "sms": "hi"}])))
            .await;

        assert_eq!(report.outcome(), BatchOutcome::AllFailed);
        assert_eq!(report.failed_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_timeout_fails_only_slow_recipient() {
        let channel = Arc::new(MemoryChannel::new());
        channel.delay_recipient("slow", Duration::from_secs(60));
        let dispatcher =
            BatchDispatcher::new(channel.clone()).with_send_timeout(Duration::from_secs(5));

        let report = dispatcher
            .dispatch(entries(json!([{"ids": "slow,fast", "sms": "hi"}])))
            .await;

        assert_eq!(report.outcome(), BatchOutcome::PartialSuccess);
        assert_eq!(
            report.results()[0].status,
            DeliveryStatus::Failed(ChannelError::Timeout(Duration::from_secs(5)).to_string())
        );
        assert!(report.results()[1].is_delivered());
    }

    #[tokio::test]
    async fn test_deliver_tags_results_with_index() {
        let channel = Arc::new(MemoryChannel::new());
        let dispatcher = BatchDispatcher::new(channel.clone());

        let report = dispatcher
            .deliver(0, "*SMS*\nhello", &["10".to_string(), "20".to_string()])
            .await;

        assert_eq!(report.outcome(), BatchOutcome::AllSuccess { delivered: 2 });
        assert!(report.results().iter().all(|r| r.index == 0));
    }
}
