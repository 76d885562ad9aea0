//! Replay guard (§4.10 step 3): bounded-TTL cache of recently seen
//! `(nonce, content_hash)` keys, rejecting duplicate verify calls.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Guards against replayed verification requests. `key` is
/// `client_nonce + ":" + content_hash` when a nonce is present, else just
/// `content_hash` (§4.10).
pub struct ReplayGuard {
    seen: Mutex<HashMap<String, Instant>>,
    ttl: Duration,
}

impl ReplayGuard {
    pub fn new(ttl: Duration) -> Self {
        ReplayGuard {
            seen: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn key(client_nonce: Option<&str>, content_hash: &str) -> String {
        match client_nonce {
            Some(nonce) => format!("{nonce}:{content_hash}"),
            None => content_hash.to_string(),
        }
    }

    /// Returns `true` if `key` was already seen within the TTL (replay
    /// detected, the caller should reject with 429); otherwise records it
    /// and returns `false`.
    pub fn check_and_record(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut seen = self.seen.lock().expect("replay guard mutex poisoned");
        seen.retain(|_, at| now.duration_since(*at) < self.ttl);

        if seen.contains_key(key) {
            return true;
        }
        seen.insert(key.to_string(), now);
        false
    }
}
