#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use crate::cipher::{CipherEngine, CipherError};
    use crate::envelope::{Envelope, MIN_ENVELOPE_LEN, NONCE_LEN, SALT_LEN, TAG_LEN};

    // Every case runs PBKDF2 at the production work factor, so keep the case
    // count low.
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(12))]

        #[test]
        fn test_encrypt_decrypt_round_trip(
            passphrase in ".{0,32}",
            message in prop::collection::vec(any::<u8>(), 0..512),
        ) {
            let engine = CipherEngine::new(&passphrase);
            let text = engine.encrypt_to_text(&message).unwrap();
            prop_assert_eq!(engine.decrypt_text(&text).unwrap(), message);
        }

        #[test]
        fn test_single_bit_flip_is_detected(
            message in prop::collection::vec(any::<u8>(), 0..128),
            bit_seed in any::<usize>(),
        ) {
            let engine = CipherEngine::new("tamper-test");
            let env = engine.encrypt(&message).unwrap();
            let mut raw = env.to_bytes();

            // Flip one bit somewhere in ciphertext || tag.
            let region_start = SALT_LEN + NONCE_LEN;
            let region_bits = (raw.len() - region_start) * 8;
            let bit = bit_seed % region_bits;
            raw[region_start + bit / 8] ^= 1 << (bit % 8);

            let tampered = Envelope::from_bytes(&raw).unwrap();
            prop_assert_eq!(engine.decrypt(&tampered), Err(CipherError::AuthenticationFailure));
        }

        #[test]
        fn test_wrong_passphrase_fails(
            p1 in "[a-z]{1,16}",
            p2 in "[a-z]{1,16}",
            message in prop::collection::vec(any::<u8>(), 0..64),
        ) {
            prop_assume!(p1 != p2);
            let text = CipherEngine::new(&p1).encrypt_to_text(&message).unwrap();
            prop_assert_eq!(
                CipherEngine::new(&p2).decrypt_text(&text),
                Err(CipherError::AuthenticationFailure)
            );
        }
    }

    // Codec-only properties are cheap; use the default case count.
    proptest! {
        #[test]
        fn test_envelope_bytes_round_trip(raw in prop::collection::vec(any::<u8>(), MIN_ENVELOPE_LEN..256)) {
            let env = Envelope::from_bytes(&raw).unwrap();
            prop_assert_eq!(env.ciphertext.len(), raw.len() - MIN_ENVELOPE_LEN);
            prop_assert_eq!(&env.tag[..], &raw[raw.len() - TAG_LEN..]);
            prop_assert_eq!(env.to_bytes(), raw);
        }

        #[test]
        fn test_short_envelopes_rejected(raw in prop::collection::vec(any::<u8>(), 0..MIN_ENVELOPE_LEN)) {
            prop_assert!(Envelope::from_bytes(&raw).is_err());
        }
    }
}
