//! Trusted time (C2, §4.2): system clock plus a cached NTP offset.
//!
//! `TrustedClock::now()` never blocks on network I/O; a background-driven
//! `refresh()` (called at most once per `refresh_interval`, gated by a
//! mutex so at most one NTP round-trip is in flight) updates the cached
//! offset used by every subsequent `now()` call.

use std::io;
use std::net::UdpSocket;
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

const NTP_EPOCH_OFFSET_SECS: i64 = 2_208_988_800; // 1900-01-01 -> 1970-01-01
const NTP_PORT: u16 = 123;

struct RefreshState {
    offset_seconds: f64,
    last_refresh: Option<Instant>,
}

/// System time plus a cached NTP offset, refreshed at most once per
/// `refresh_interval`.
pub struct TrustedClock {
    servers: Vec<String>,
    refresh_interval: Duration,
    timeout: Duration,
    state: Mutex<RefreshState>,
}

impl TrustedClock {
    pub fn new(servers: Vec<String>, refresh_interval: Duration, timeout: Duration) -> Self {
        TrustedClock {
            servers,
            refresh_interval,
            timeout,
            state: Mutex::new(RefreshState {
                offset_seconds: 0.0,
                last_refresh: None,
            }),
        }
    }

    /// Current UTC instant, honoring the cached NTP offset.
    pub fn now(&self) -> DateTime<Utc> {
        let offset = self.state.lock().expect("trusted clock mutex poisoned").offset_seconds;
        let now = Utc::now();
        now + chrono::Duration::milliseconds((offset * 1000.0) as i64)
    }

    /// Refreshes the cached offset if `refresh_interval` has elapsed since
    /// the last attempt. Contacts each configured host in order with
    /// `timeout`; the first success wins and remaining hosts are skipped.
    /// If all hosts fail, the offset reverts to 0 (bare system clock).
    pub fn refresh_if_due(&self) {
        let mut state = self.state.lock().expect("trusted clock mutex poisoned");
        if let Some(last) = state.last_refresh {
            if last.elapsed() < self.refresh_interval {
                return;
            }
        }
        state.last_refresh = Some(Instant::now());

        let mut new_offset = None;
        for host in &self.servers {
            match query_ntp_offset(host, self.timeout) {
                Ok(offset) => {
                    new_offset = Some(offset);
                    break;
                }
                Err(e) => {
                    tracing::warn!(host = %host, error = %e, "NTP query failed");
                }
            }
        }
        state.offset_seconds = new_offset.unwrap_or(0.0);
    }
}

/// Performs a single SNTP (RFC 4330) round-trip against `host:123` and
/// returns `server_tx_time - system_time` in seconds.
fn query_ntp_offset(host: &str, timeout: Duration) -> io::Result<f64> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.set_read_timeout(Some(timeout))?;
    socket.set_write_timeout(Some(timeout))?;

    let addr = if host.contains(':') {
        host.to_string()
    } else {
        format!("{host}:{NTP_PORT}")
    };
    socket.connect(&addr)?;

    let mut packet = [0u8; 48];
    packet[0] = 0b00_011_011; // LI=0, VN=3, Mode=3 (client)

    let sent_at = SystemTime::now();
    socket.send(&packet)?;

    let mut buf = [0u8; 48];
    socket.recv(&mut buf)?;
    let received_at = SystemTime::now();

    // Transmit timestamp: bytes 40..48, seconds since 1900-01-01.
    let tx_seconds = u32::from_be_bytes([buf[40], buf[41], buf[42], buf[43]]) as i64;
    let tx_fraction = u32::from_be_bytes([buf[44], buf[45], buf[46], buf[47]]) as f64;
    let server_unix_secs = (tx_seconds - NTP_EPOCH_OFFSET_SECS) as f64 + tx_fraction / u32::MAX as f64;

    let system_unix_secs = sent_at
        .duration_since(UNIX_EPOCH)
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "system clock before epoch"))?
        .as_secs_f64();
    let round_trip = received_at
        .duration_since(sent_at)
        .unwrap_or_default()
        .as_secs_f64();

    Ok(server_unix_secs - (system_unix_secs + round_trip / 2.0))
}
