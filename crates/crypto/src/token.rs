//! Bearer token generation for the token service (C7).
//!
//! Tokens are opaque, URL-safe, globally unique strings carrying at least
//! 64 bytes of entropy (§3 `DeviceToken.token`).

use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL;
use base64::Engine;
use rand::RngCore;

const TOKEN_ENTROPY_BYTES: usize = 64;

/// Generates a fresh bearer token: 64 random bytes, URL-safe base64 encoded
/// without padding.
pub fn generate_bearer_token() -> String {
    let mut bytes = [0u8; TOKEN_ENTROPY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    BASE64_URL.encode(bytes)
}
