//! Fixed-window rate limiter (C5): one counter per key, guarded by a single
//! mutex with short critical sections, evicted by TTL/LRU once the map
//! exceeds its configured capacity. Cross-process coordination is explicitly
//! out of scope; this is a best-effort, single-process limiter.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(60);

struct Entry {
    hits: u32,
    window_start: Instant,
}

/// Per-key fixed-window rate limiter.
pub struct RateLimiter {
    entries: Mutex<HashMap<String, Entry>>,
    max_entries: usize,
}

impl RateLimiter {
    pub fn new(max_entries: usize) -> Self {
        RateLimiter {
            entries: Mutex::new(HashMap::new()),
            max_entries,
        }
    }

    /// Records one hit for `key` against `limit`. Returns `true` if the hit
    /// is allowed (the key is now at or under `limit` within the current
    /// 60s window), `false` if it is denied.
    pub fn hit(&self, key: &str, limit: u32) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("rate limiter mutex poisoned");

        self.evict_expired_and_over_capacity(&mut entries, now);

        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            hits: 0,
            window_start: now,
        });

        if now.duration_since(entry.window_start) >= WINDOW {
            entry.hits = 0;
            entry.window_start = now;
        }

        if entry.hits >= limit {
            return false;
        }

        entry.hits += 1;
        true
    }

    fn evict_expired_and_over_capacity(&self, entries: &mut HashMap<String, Entry>, now: Instant) {
        entries.retain(|_, e| now.duration_since(e.window_start) < WINDOW);

        if entries.len() >= self.max_entries {
            // Best-effort LRU: evict the entries with the oldest window_start
            // until we are back under capacity.
            let mut by_age: Vec<(String, Instant)> =
                entries.iter().map(|(k, v)| (k.clone(), v.window_start)).collect();
            by_age.sort_by_key(|(_, start)| *start);
            let overflow = entries.len() + 1 - self.max_entries;
            for (key, _) in by_age.into_iter().take(overflow) {
                entries.remove(&key);
            }
        }
    }
}
