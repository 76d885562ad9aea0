//! HMAC-SHA256 request signing for the verifier auth layer (C6, §4.6).
//!
//! The signed message is always `"<timestamp>:<content_hash-or-empty>"`;
//! the expected signature is compared to the client-supplied one in
//! constant time.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Computes the lowercase-hex HMAC-SHA256 signature of
/// `"<timestamp>:<content_hash>"` under `secret`, matching §4.6's expected
/// signature construction. `content_hash` is the empty string when the
/// request carries no payload content hash.
pub fn sign(secret: &str, timestamp: i64, content_hash: &str) -> String {
    let message = format!("{timestamp}:{content_hash}");
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies `candidate` (lowercase hex) against the expected signature for
/// `timestamp`/`content_hash` under `secret`, using a constant-time
/// comparison so timing does not leak how many prefix bytes matched.
pub fn verify(secret: &str, timestamp: i64, content_hash: &str, candidate: &str) -> bool {
    let expected = sign(secret, timestamp, content_hash);
    constant_time_eq(expected.as_bytes(), candidate.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_is_deterministic_and_verifies() {
        let sig = sign("secret", 1_700_000_000, "abc123");
        assert!(verify("secret", 1_700_000_000, "abc123", &sig));
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let sig = sign("secret", 1_700_000_000, "abc123");
        assert!(!verify("other-secret", 1_700_000_000, "abc123", &sig));
    }

    #[test]
    fn verify_rejects_wrong_content_hash() {
        let sig = sign("secret", 1_700_000_000, "abc123");
        assert!(!verify("secret", 1_700_000_000, "different", &sig));
    }

    #[test]
    fn empty_content_hash_is_supported() {
        let sig = sign("secret", 1_700_000_000, "");
        assert!(verify("secret", 1_700_000_000, "", &sig));
    }

    #[test]
    fn constant_time_eq_handles_length_mismatch() {
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"abc", b"abc"));
    }
}
