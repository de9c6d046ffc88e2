//! Legacy encrypted ingestion.
//!
//! Older device builds post a single encrypted envelope instead of a JSON
//! batch. The decrypted payload is `<kind>\n<content>`, where `kind` is a
//! short label such as `SMS` and `content` may span several lines.

use smsr_crypto::CipherEngine;
use tracing::debug;

use crate::errors::IngestError;
use crate::format::format_legacy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyMessage {
    pub kind: String,
    pub content: String,
}

impl LegacyMessage {
    /// Split a decrypted payload. Requires at least two lines.
    pub fn parse(payload: &str) -> Result<Self, IngestError> {
        let (kind, content) = payload.split_once('\n').ok_or(IngestError::InvalidFormat)?;
        Ok(Self {
            kind: kind.to_owned(),
            content: content.to_owned(),
        })
    }

    pub fn render(&self) -> String {
        format_legacy(&self.kind, &self.content)
    }
}

/// Opens legacy request bodies with the deployment passphrase.
///
/// Key derivation is deliberately slow; async callers should run
/// [`LegacyIngest::open`] on a blocking thread.
#[derive(Debug, Clone)]
pub struct LegacyIngest {
    engine: CipherEngine,
}

impl LegacyIngest {
    pub fn new(engine: CipherEngine) -> Self {
        Self { engine }
    }

    pub fn open(&self, body: &[u8]) -> Result<LegacyMessage, IngestError> {
        let text = std::str::from_utf8(body).map_err(|_| IngestError::BodyNotUtf8)?;
        let plaintext = self.engine.decrypt_text(text)?;
        let payload = String::from_utf8(plaintext).map_err(|_| IngestError::PayloadNotUtf8)?;

        let message = LegacyMessage::parse(&payload)?;
        debug!("opened legacy {} message", message.kind);
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smsr_crypto::CipherError;

    const PASSPHRASE: &str = "correct horse battery staple";
    const SMS_VECTOR: &str = "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaG0CjcTKL5r5OhCQ6C+QtwHchFpVXSkndKj7TRvFoEWNXtTRJWbq14A==";

    fn ingest() -> LegacyIngest {
        LegacyIngest::new(CipherEngine::new(PASSPHRASE))
    }

    #[test]
    fn test_parse_keeps_content_lines() {
        let msg = LegacyMessage::parse("SMS\nline 1\nline 2").unwrap();
        assert_eq!(msg.kind, "SMS");
        assert_eq!(msg.content, "line 1\nline 2");
        assert_eq!(msg.render(), "*SMS*\nline 1\nline 2");
    }

    #[test]
    fn test_parse_single_line_rejected() {
        assert_eq!(LegacyMessage::parse("SMS"), Err(IngestError::InvalidFormat));
        assert_eq!(LegacyMessage::parse(""), Err(IngestError::InvalidFormat));
    }

    #[test]
    fn test_parse_empty_content_accepted() {
        let msg = LegacyMessage::parse("CALL\n").unwrap();
        assert_eq!(msg.kind, "CALL");
        assert_eq!(msg.content, "");
    }

    #[test]
    fn test_open_known_vector() {
        let msg = ingest().open(SMS_VECTOR.as_bytes()).unwrap();
        assert_eq!(msg.kind, "SMS");
        assert_eq!(msg.content, "Your code is 482913");
    }

    #[test]
    fn test_open_round_trip() {
        let engine = CipherEngine::new(PASSPHRASE);
        let body = engine.encrypt_to_text("CALL\n+15550001234\nSIM 2".as_bytes()).unwrap();
        let msg = LegacyIngest::new(engine).open(body.as_bytes()).unwrap();
        assert_eq!(msg.render(), "*CALL*\n+15550001234\nSIM 2");
    }

    #[test]
    fn test_open_wrong_passphrase() {
        let err = LegacyIngest::new(CipherEngine::new("other"))
            .open(SMS_VECTOR.as_bytes())
            .unwrap_err();
        assert_eq!(err, IngestError::Decryption(CipherError::AuthenticationFailure));
    }

    #[test]
    fn test_open_single_line_payload() {
        let engine = CipherEngine::new(PASSPHRASE);
        let body = engine.encrypt_to_text(b"just one line").unwrap();
        assert_eq!(
            LegacyIngest::new(engine).open(body.as_bytes()),
            Err(IngestError::InvalidFormat)
        );
    }

    #[test]
    fn test_open_non_utf8_body() {
        assert_eq!(ingest().open(&[0xff, 0xfe]), Err(IngestError::BodyNotUtf8));
    }

    #[test]
    fn test_open_non_utf8_payload() {
        let engine = CipherEngine::new(PASSPHRASE);
        let body = engine.encrypt_to_text(&[b'S', b'\n', 0xff]).unwrap();
        assert_eq!(
            LegacyIngest::new(engine).open(body.as_bytes()),
            Err(IngestError::PayloadNotUtf8)
        );
    }
}
