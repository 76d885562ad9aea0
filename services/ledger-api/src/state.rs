//! Shared application state, constructed once at startup and handed to every
//! handler behind an `Arc`.

use std::sync::Mutex;

use originseal_core::config::Config;
use originseal_core::rate_limit::RateLimiter;
use originseal_core::store::Store;
use originseal_identity::devicecheck::{DeviceCheckClient, DeviceCheckConfig};
use originseal_verify::{ReplayGuard, TrustedClock};

/// Everything a handler needs, wired once in `main` and shared via `Arc`.
///
/// `store` is guarded by a mutex rather than split per-request: `rusqlite`'s
/// `Connection` is not `Sync`, and with the `bundled` feature a fresh
/// connection per request is unnecessary overhead against a local WAL-mode
/// file, so one connection is shared and borrowed for the duration of each
/// request's database work (§5's "Connection model").
pub struct AppState {
    pub config: Config,
    pub store: Mutex<Store>,
    pub rate_limiter: RateLimiter,
    pub trusted_clock: TrustedClock,
    pub replay_guard: ReplayGuard,
    pub devicecheck: Option<DeviceCheckClient>,
    pub http_client: reqwest::Client,
}

impl AppState {
    pub fn new(config: Config) -> originseal_core::Result<Self> {
        let store = Store::open(&config.database_url)?;
        let rate_limiter = RateLimiter::new(config.rate_limit_max_entries);
        let trusted_clock = TrustedClock::new(
            config.ntp_servers.clone(),
            std::time::Duration::from_secs(60),
            std::time::Duration::from_millis(config.ntp_timeout_ms),
        );
        let replay_guard = ReplayGuard::new(std::time::Duration::from_secs(
            config.replay_cache_ttl_seconds,
        ));

        let devicecheck = if config.devicecheck_enabled {
            Some(DeviceCheckClient::new(DeviceCheckConfig {
                enabled: config.devicecheck_enabled,
                team_id: config.devicecheck_team_id.clone(),
                key_id: config.devicecheck_key_id.clone(),
                private_key_pem: config.devicecheck_private_key_pem.clone(),
                environment: config.devicecheck_environment.clone(),
                allowed_bundle_ids: config.devicecheck_allowed_bundle_ids.clone(),
                timeout: std::time::Duration::from_millis(config.devicecheck_timeout_ms),
            }))
        } else {
            None
        };

        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.crl_fetch_timeout_ms))
            .build()
            .expect("reqwest client builds with a finite timeout");

        Ok(AppState {
            config,
            store: Mutex::new(store),
            rate_limiter,
            trusted_clock,
            replay_guard,
            devicecheck,
            http_client,
        })
    }
}
