//! Envelope codec.
//!
//! Wire layout, base64-encoded (standard alphabet, padded, no line breaks):
//!
//! ```text
//! salt (16) || nonce (12) || ciphertext (n >= 0) || tag (16)
//! ```
//!
//! The format carries no version or length prefix. Any layout change is a
//! new format.

use base64::{engine::general_purpose::STANDARD, Engine as _};

pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// Smallest valid envelope: all fixed fields, empty ciphertext.
pub const MIN_ENVELOPE_LEN: usize = SALT_LEN + NONCE_LEN + TAG_LEN;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("invalid transport encoding")]
    InvalidEncoding,
    #[error("envelope too short: {actual} bytes, need at least 44")]
    TooShort { actual: usize },
}

/// One encrypted message, split into its fixed-offset fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub salt: [u8; SALT_LEN],
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_LEN],
}

impl Envelope {
    /// Concatenate the fields in wire order.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(MIN_ENVELOPE_LEN + self.ciphertext.len());
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.tag);
        out
    }

    /// Slice raw envelope bytes by fixed offsets.
    pub fn from_bytes(raw: &[u8]) -> Result<Self, EnvelopeError> {
        if raw.len() < MIN_ENVELOPE_LEN {
            return Err(EnvelopeError::TooShort { actual: raw.len() });
        }

        let (salt, rest) = raw.split_at(SALT_LEN);
        let (nonce, rest) = rest.split_at(NONCE_LEN);
        let (ciphertext, tag) = rest.split_at(rest.len() - TAG_LEN);

        let mut envelope = Envelope {
            salt: [0u8; SALT_LEN],
            nonce: [0u8; NONCE_LEN],
            ciphertext: ciphertext.to_vec(),
            tag: [0u8; TAG_LEN],
        };
        envelope.salt.copy_from_slice(salt);
        envelope.nonce.copy_from_slice(nonce);
        envelope.tag.copy_from_slice(tag);
        Ok(envelope)
    }

    /// Transport-encode the envelope.
    pub fn serialize(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    /// Decode transport text. Surrounding ASCII whitespace is ignored.
    pub fn deserialize(text: &str) -> Result<Self, EnvelopeError> {
        let raw = STANDARD
            .decode(text.trim())
            .map_err(|_| EnvelopeError::InvalidEncoding)?;
        Self::from_bytes(&raw)
    }
}
