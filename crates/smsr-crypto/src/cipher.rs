//! AES-256-GCM over passphrase-derived keys.
//!
//! Each call to [`CipherEngine::encrypt`] draws a fresh salt and nonce from the
//! OS CSPRNG, so the derived key is unique per envelope and nonce reuse under
//! one key cannot happen across calls. No associated data is bound.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use zeroize::Zeroizing;

use crate::envelope::{Envelope, NONCE_LEN, SALT_LEN, TAG_LEN};
use crate::kdf::derive_key;

#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum CipherError {
    /// Tag mismatch, wrong passphrase, truncated or garbled envelope.
    /// Deliberately carries no detail.
    #[error("authentication failed")]
    AuthenticationFailure,
    #[error("encryption failed")]
    EncryptFailed,
}

/// Encrypts and decrypts envelopes under one deployment passphrase.
#[derive(Clone)]
pub struct CipherEngine {
    passphrase: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for CipherEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherEngine").finish_non_exhaustive()
    }
}

impl CipherEngine {
    pub fn new(passphrase: impl AsRef<[u8]>) -> Self {
        Self {
            passphrase: Zeroizing::new(passphrase.as_ref().to_vec()),
        }
    }

    /// Encrypt `plaintext` into a fresh envelope.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Envelope, CipherError> {
        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        getrandom::getrandom(&mut salt).map_err(|_| CipherError::EncryptFailed)?;
        getrandom::getrandom(&mut nonce).map_err(|_| CipherError::EncryptFailed)?;
        self.seal(salt, nonce, plaintext)
    }

    /// Verify and decrypt an envelope.
    pub fn decrypt(&self, envelope: &Envelope) -> Result<Vec<u8>, CipherError> {
        let key = derive_key(&self.passphrase, &envelope.salt);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

        let mut sealed = Vec::with_capacity(envelope.ciphertext.len() + TAG_LEN);
        sealed.extend_from_slice(&envelope.ciphertext);
        sealed.extend_from_slice(&envelope.tag);

        // Tag verification happens inside the AEAD in constant time.
        cipher
            .decrypt(Nonce::from_slice(&envelope.nonce), sealed.as_slice())
            .map_err(|_| CipherError::AuthenticationFailure)
    }

    /// Encrypt and transport-encode in one step.
    pub fn encrypt_to_text(&self, plaintext: &[u8]) -> Result<String, CipherError> {
        Ok(self.encrypt(plaintext)?.serialize())
    }

    /// Decode transport text and decrypt.
    ///
    /// Malformed text is reported as [`CipherError::AuthenticationFailure`] so
    /// callers cannot distinguish corruption from a wrong key.
    pub fn decrypt_text(&self, text: &str) -> Result<Vec<u8>, CipherError> {
        let envelope =
            Envelope::deserialize(text).map_err(|_| CipherError::AuthenticationFailure)?;
        self.decrypt(&envelope)
    }

    fn seal(
        &self,
        salt: [u8; SALT_LEN],
        nonce: [u8; NONCE_LEN],
        plaintext: &[u8],
    ) -> Result<Envelope, CipherError> {
        let key = derive_key(&self.passphrase, &salt);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

        let mut ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CipherError::EncryptFailed)?;

        // aes-gcm appends the tag to the ciphertext.
        let tag_bytes = ciphertext.split_off(ciphertext.len() - TAG_LEN);
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&tag_bytes);

        Ok(Envelope {
            salt,
            nonce,
            ciphertext,
            tag,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASSPHRASE: &str = "correct horse battery staple";

    // Produced by an independent PBKDF2-SHA256 / AES-256-GCM implementation
    // with salt = 00..0f and nonce = 10..1b.
    const SMS_VECTOR: &str = "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaG0CjcTKL5r5OhCQ6C+QtwHchFpVXSkndKj7TRvFoEWNXtTRJWbq14A==";
    const EMPTY_VECTOR: &str = "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaG7i1KK8lNU50B1N17i9lsUc=";

    fn fixed_salt() -> [u8; SALT_LEN] {
        let mut salt = [0u8; SALT_LEN];
        for (i, b) in salt.iter_mut().enumerate() {
            *b = i as u8;
        }
        salt
    }

    fn fixed_nonce() -> [u8; NONCE_LEN] {
        let mut nonce = [0u8; NONCE_LEN];
        for (i, b) in nonce.iter_mut().enumerate() {
            *b = 16 + i as u8;
        }
        nonce
    }

    #[test]
    fn test_decrypt_known_vector() {
        let engine = CipherEngine::new(PASSPHRASE);
        let plaintext = engine.decrypt_text(SMS_VECTOR).unwrap();
        assert_eq!(plaintext, b"SMS\nYour code is 482913");
    }

    #[test]
    fn test_decrypt_known_empty_vector() {
        let engine = CipherEngine::new(PASSPHRASE);
        assert_eq!(engine.decrypt_text(EMPTY_VECTOR).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_seal_matches_known_vector() {
        let engine = CipherEngine::new(PASSPHRASE);
        let env = engine
            .seal(fixed_salt(), fixed_nonce(), b"SMS\nYour code is 482913")
            .unwrap();
        assert_eq!(env.serialize(), SMS_VECTOR);
    }

    #[test]
    fn test_round_trip_unicode() {
        let engine = CipherEngine::new(PASSPHRASE);
        let msg = "SMS\nMessage: 63385 - ваш код для входа. 验证码是828627".as_bytes();
        let text = engine.encrypt_to_text(msg).unwrap();
        assert_eq!(engine.decrypt_text(&text).unwrap(), msg);
    }

    #[test]
    fn test_empty_plaintext_is_44_bytes() {
        let engine = CipherEngine::new(PASSPHRASE);
        let env = engine.encrypt(b"").unwrap();
        assert!(env.ciphertext.is_empty());
        assert_eq!(env.to_bytes().len(), 44);
        assert_eq!(engine.decrypt(&env).unwrap(), b"");
    }

    #[test]
    fn test_fresh_salt_and_nonce_per_call() {
        let engine = CipherEngine::new(PASSPHRASE);
        let a = engine.encrypt(b"same").unwrap();
        let b = engine.encrypt(b"same").unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.serialize(), b.serialize());
    }

    #[test]
    fn test_wrong_passphrase() {
        let text = CipherEngine::new("key1").encrypt_to_text(b"Secret message").unwrap();
        assert_eq!(
            CipherEngine::new("key2").decrypt_text(&text),
            Err(CipherError::AuthenticationFailure)
        );
    }

    #[test]
    fn test_truncated_envelope_is_opaque_failure() {
        let engine = CipherEngine::new(PASSPHRASE);
        assert_eq!(
            engine.decrypt_text("AAECAwQF"),
            Err(CipherError::AuthenticationFailure)
        );
        assert_eq!(
            engine.decrypt_text("%%%"),
            Err(CipherError::AuthenticationFailure)
        );
    }

    #[test]
    fn test_debug_hides_passphrase() {
        let engine = CipherEngine::new("hunter2");
        assert!(!format!("{:?}", engine).contains("hunter2"));
    }
}
