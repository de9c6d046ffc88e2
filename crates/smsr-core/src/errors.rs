//! Error types for the relay core.
//!
//! Batch-level errors ([`FormatError`]) reject a whole request. Entry-level
//! errors ([`ValidationError`]) are captured into the batch report and never
//! abort the batch. Their `Display` text is what callers see in responses.

use smsr_crypto::CipherError;
use thiserror::Error;

/// The request body is not a batch at all.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
    #[error("Invalid JSON format")]
    InvalidJson,

    #[error("Expected array of message objects")]
    NotAnArray,
}

/// One entry in a batch is unusable. Isolated to that entry.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid message format: expected object")]
    NotAnObject,

    #[error("Missing 'ids' field")]
    MissingIds,

    #[error("Invalid 'ids' field: expected string")]
    InvalidIds,

    #[error("No valid user IDs found")]
    NoRecipients,

    #[error("Either 'sms' or 'call' field is required")]
    MissingContent,
}

/// Failure on the legacy encrypted ingestion path.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum IngestError {
    #[error("Decryption failed: {0}")]
    Decryption(#[from] CipherError),

    #[error("Request body is not valid UTF-8")]
    BodyNotUtf8,

    #[error("Decrypted payload is not valid UTF-8")]
    PayloadNotUtf8,

    #[error("Invalid message format")]
    InvalidFormat,
}
