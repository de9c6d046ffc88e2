//! Constant-time comparison for shared secrets.
//!
//! Used wherever a caller-supplied secret (for example an inbound auth
//! header) is checked against the configured one, so the comparison does not
//! leak how many leading bytes matched.

use constant_time_eq::constant_time_eq;

/// Compare two byte slices in constant time.
///
/// Slices of different length compare unequal.
///
/// ```rust
/// use smsr_crypto::utils::constant_time_compare;
///
/// assert!(constant_time_compare(b"s3cret", b"s3cret"));
/// assert!(!constant_time_compare(b"s3cret", b"s3creT"));
/// ```
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    constant_time_eq(a, b)
}
