#![forbid(unsafe_code)]

pub mod kdf;
pub mod envelope;
pub mod cipher;
pub mod utils;

#[cfg(test)]
mod proptests;

pub use cipher::{CipherEngine, CipherError};
pub use envelope::{Envelope, EnvelopeError};
pub use kdf::{derive_key, CipherKey};
