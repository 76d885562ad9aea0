//! Environment-driven configuration for the ledger API service, the sealer
//! CLI, and the CRL refresh job.
//!
//! Every field has a documented default drawn from the reference service's
//! settings surface; [`Config::from_env`] reads `std::env::var` for each,
//! falling back to the default when unset or unparsable.

use std::env;

use crate::error::{CoreError, Result};

/// One verifier API key record, as carried in the `VERIFIER_API_KEYS`
/// environment variable (a JSON array).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ApiKeyRecord {
    pub key: String,
    pub hmac_secret: String,
    pub name: String,
    #[serde(default)]
    pub rate_limit_per_minute: Option<u32>,
    #[serde(default)]
    pub allow_manifest_summary: Option<bool>,
}

/// Full service configuration, loaded once at startup and passed into
/// `AppState` and the sealer/CLI entry points. No field is re-read after
/// boot.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub verify_base_url: String,

    pub device_token_ttl_seconds: i64,
    pub device_token_renewal_buffer: i64,
    pub verify_signatures: bool,

    pub ledger_repo_root: String,
    pub ledger_batches_subdir: String,
    pub ledger_roots_subdir: String,
    pub ledger_proofs_subdir: String,
    pub ledger_root_index_filename: String,
    pub ledger_daily_roots_filename: String,
    pub ledger_proof_manifest_filename: String,
    pub ledger_git_auto_commit: bool,
    pub ledger_git_auto_push: bool,
    pub ledger_git_remote: String,
    pub ledger_git_branch: String,

    pub cors_allow_origins: Vec<String>,
    pub allow_manifest_summary: bool,
    pub manifest_summary_max_bytes: usize,
    pub allowed_manifest_summary_fields: Vec<String>,

    pub verifier_api_keys: Vec<ApiKeyRecord>,
    pub anonymous_rate_limit_per_minute: u32,
    pub authenticated_rate_limit_per_minute: u32,
    pub rate_limit_max_entries: usize,

    pub ntp_servers: Vec<String>,
    pub ntp_timeout_ms: u64,
    pub replay_cache_ttl_seconds: u64,

    pub tls_required: bool,
    pub port: u16,

    pub devicecheck_enabled: bool,
    pub devicecheck_team_id: String,
    pub devicecheck_key_id: String,
    pub devicecheck_private_key_pem: String,
    pub devicecheck_environment: String,
    pub devicecheck_allowed_bundle_ids: Vec<String>,
    pub devicecheck_timeout_ms: u64,

    pub crl_fetch_timeout_ms: u64,
}

fn env_str(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

/// Parses a comma-separated list, or a JSON array if the value starts with
/// `[`, mirroring the reference settings' tolerant `CORS_ALLOW_ORIGINS`
/// parsing.
fn env_list(key: &str, default: &[&str]) -> Vec<String> {
    match env::var(key) {
        Ok(raw) if raw.trim().starts_with('[') => {
            serde_json::from_str(&raw).unwrap_or_else(|_| default.iter().map(|s| s.to_string()).collect())
        }
        Ok(raw) => raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Err(_) => default.iter().map(|s| s.to_string()).collect(),
    }
}

impl Config {
    /// Loads configuration from process environment variables, applying the
    /// defaults documented in the external interface reference for every
    /// field left unset.
    pub fn from_env() -> Result<Self> {
        let verifier_api_keys = match env::var("VERIFIER_API_KEYS") {
            Ok(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw)
                .map_err(|e| CoreError::Config(format!("VERIFIER_API_KEYS: {e}")))?,
            _ => Vec::new(),
        };

        Ok(Config {
            database_url: env_str("DATABASE_URL", "sqlite://ledger.db"),
            verify_base_url: env_str("VERIFY_BASE_URL", "https://verify.example.com"),

            device_token_ttl_seconds: env_parse("DEVICE_TOKEN_TTL_SECONDS", 2_592_000),
            device_token_renewal_buffer: env_parse("DEVICE_TOKEN_RENEWAL_BUFFER", 604_800),
            verify_signatures: env_bool("VERIFY_SIGNATURES", false),

            ledger_repo_root: env_str("LEDGER_REPO_ROOT", "./ledger"),
            ledger_batches_subdir: env_str("LEDGER_BATCHES_SUBDIR", "batches"),
            ledger_roots_subdir: env_str("LEDGER_ROOTS_SUBDIR", "roots"),
            ledger_proofs_subdir: env_str("LEDGER_PROOFS_SUBDIR", "proofs"),
            ledger_root_index_filename: env_str("LEDGER_ROOT_INDEX_FILENAME", "ledger_index.json"),
            ledger_daily_roots_filename: env_str("LEDGER_DAILY_ROOTS_FILENAME", "daily_roots.csv"),
            ledger_proof_manifest_filename: env_str(
                "LEDGER_PROOF_MANIFEST_FILENAME",
                "proof_manifest.jsonl",
            ),
            ledger_git_auto_commit: env_bool("LEDGER_GIT_AUTO_COMMIT", false),
            ledger_git_auto_push: env_bool("LEDGER_GIT_AUTO_PUSH", false),
            ledger_git_remote: env_str("LEDGER_GIT_REMOTE", "origin"),
            ledger_git_branch: env_str("LEDGER_GIT_BRANCH", "main"),

            cors_allow_origins: env_list("CORS_ALLOW_ORIGINS", &[]),
            allow_manifest_summary: env_bool("ALLOW_MANIFEST_SUMMARY", false),
            manifest_summary_max_bytes: env_parse("MANIFEST_SUMMARY_MAX_BYTES", 4096),
            allowed_manifest_summary_fields: env_list(
                "ALLOWED_MANIFEST_SUMMARY_FIELDS",
                &["title", "creator", "capture_time_utc", "description"],
            ),

            verifier_api_keys,
            anonymous_rate_limit_per_minute: env_parse("ANONYMOUS_RATE_LIMIT_PER_MINUTE", 60),
            authenticated_rate_limit_per_minute: env_parse(
                "AUTHENTICATED_RATE_LIMIT_PER_MINUTE",
                600,
            ),
            rate_limit_max_entries: env_parse("RATE_LIMIT_MAX_ENTRIES", 10_000),

            ntp_servers: env_list("NTP_SERVERS", &["time.cloudflare.com", "pool.ntp.org"]),
            ntp_timeout_ms: env_parse("NTP_TIMEOUT_MS", 1500),
            replay_cache_ttl_seconds: env_parse("REPLAY_CACHE_TTL_SECONDS", 300),

            tls_required: env_bool("TLS_REQUIRED", true),
            port: env_parse("PORT", 8080),

            devicecheck_enabled: env_bool("DEVICECHECK_ENABLED", false),
            devicecheck_team_id: env_str("DEVICECHECK_TEAM_ID", ""),
            devicecheck_key_id: env_str("DEVICECHECK_KEY_ID", ""),
            devicecheck_private_key_pem: env_str("DEVICECHECK_PRIVATE_KEY_PEM", ""),
            devicecheck_environment: env_str("DEVICECHECK_ENVIRONMENT", "production"),
            devicecheck_allowed_bundle_ids: env_list("DEVICECHECK_ALLOWED_BUNDLE_IDS", &[]),
            devicecheck_timeout_ms: env_parse("DEVICECHECK_TIMEOUT_MS", 5000),

            crl_fetch_timeout_ms: env_parse("CRL_FETCH_TIMEOUT_MS", 5000),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_list_parses_comma_list() {
        assert_eq!(
            env_list("ORIGINSEAL_TEST_UNSET_LIST", &["a", "b"]),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn env_bool_accepts_common_truthy_strings() {
        std::env::set_var("ORIGINSEAL_TEST_BOOL", "yes");
        assert!(env_bool("ORIGINSEAL_TEST_BOOL", false));
        std::env::remove_var("ORIGINSEAL_TEST_BOOL");
    }
}
