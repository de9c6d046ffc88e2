//! SMS Relay Core - notification model and delivery logic.
//!
//! This crate implements:
//! - The inbound notification model and per-entry validation
//! - Message formatting (one-time-code highlighting, call summaries)
//! - Batch dispatch with per-recipient failure isolation
//! - The legacy encrypted ingestion path
//! - The Telegram Bot API channel (feature `telegram`)

#![forbid(unsafe_code)]

// Model and rendering
pub mod notification;
pub mod format;

// Delivery
pub mod channel;
pub mod dispatch;
pub mod legacy;

// Supporting modules
pub mod errors;
pub mod harness;

// Optional channel implementations
#[cfg(feature = "telegram")]
pub mod telegram;

pub use channel::{ChannelError, NotificationChannel};
pub use dispatch::{BatchDispatcher, BatchOutcome, BatchReport, DeliveryResult, DeliveryStatus};
