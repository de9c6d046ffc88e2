//! Passphrase key derivation.
//!
//! Every envelope carries its own random salt, so the AES key is re-derived
//! per message with PBKDF2-HMAC-SHA256. The parameters are fixed by the
//! device-side encoder and cannot change without a new envelope format.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::ZeroizeOnDrop;

/// Derived key length (AES-256).
pub const KEY_LEN: usize = 32;

/// PBKDF2 work factor shared with the device encoder.
pub const KDF_ITERATIONS: u32 = 65_536;

/// A 32-byte AES key derived from a passphrase and a salt.
///
/// Never serialized; wiped from memory on drop.
#[derive(ZeroizeOnDrop)]
pub struct CipherKey([u8; KEY_LEN]);

impl CipherKey {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CipherKey(..)")
    }
}

/// Derive the per-message key for `salt`.
///
/// Deterministic and infallible for any passphrase and salt bytes.
pub fn derive_key(passphrase: &[u8], salt: &[u8]) -> CipherKey {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(passphrase, salt, KDF_ITERATIONS, &mut key);
    CipherKey(key)
}
