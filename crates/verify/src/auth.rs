//! Verifier auth layer (C6, §4.6): API-key lookup plus HMAC-SHA256 request
//! signing with a bounded timestamp window.

use chrono::{DateTime, Utc};
use originseal_core::config::{ApiKeyRecord, Config};

const TIMESTAMP_WINDOW_SECONDS: i64 = 300;

/// Stable error codes surfaced at the HTTP boundary (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    InvalidApiKey,
    MissingHmacHeaders,
    InvalidTimestamp,
    TimestampOutOfWindow,
    InvalidSignature,
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidApiKey => "invalid_api_key",
            AuthError::MissingHmacHeaders => "missing_hmac_headers",
            AuthError::InvalidTimestamp => "invalid_timestamp",
            AuthError::TimestampOutOfWindow => "timestamp_out_of_window",
            AuthError::InvalidSignature => "invalid_signature",
        }
    }

    /// All these errors map to HTTP 401 at the boundary.
    pub fn status_code(&self) -> u16 {
        401
    }
}

/// Per-request client identity, carried through the call chain (§9).
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    pub api_key: Option<String>,
    pub name: String,
    pub authenticated: bool,
    pub rate_limit_per_minute: u32,
    pub allow_manifest_summary: bool,
}

impl ClientIdentity {
    fn anonymous(config: &Config) -> Self {
        ClientIdentity {
            api_key: None,
            name: "anonymous".to_string(),
            authenticated: false,
            rate_limit_per_minute: config.anonymous_rate_limit_per_minute,
            allow_manifest_summary: config.allow_manifest_summary,
        }
    }
}

/// Request headers relevant to authentication, pre-extracted by the HTTP
/// layer so this function stays framework-agnostic.
pub struct AuthHeaders<'a> {
    pub api_key: Option<&'a str>,
    pub timestamp: Option<&'a str>,
    pub signature: Option<&'a str>,
}

/// Authenticates one request per §4.6. `content_hash` is the payload's
/// content hash (empty string if none) used in the signed message.
pub fn authenticate(
    headers: &AuthHeaders,
    content_hash: &str,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<ClientIdentity, AuthError> {
    let Some(api_key) = headers.api_key else {
        return Ok(ClientIdentity::anonymous(config));
    };

    let record = find_key(config, api_key).ok_or(AuthError::InvalidApiKey)?;

    let (Some(ts_raw), Some(sig_raw)) = (headers.timestamp, headers.signature) else {
        return Err(AuthError::MissingHmacHeaders);
    };

    let ts: i64 = ts_raw.parse().map_err(|_| AuthError::InvalidTimestamp)?;
    if (now.timestamp() - ts).abs() > TIMESTAMP_WINDOW_SECONDS {
        return Err(AuthError::TimestampOutOfWindow);
    }

    if !originseal_crypto::hmac_auth::verify(&record.hmac_secret, ts, content_hash, sig_raw) {
        return Err(AuthError::InvalidSignature);
    }

    Ok(ClientIdentity {
        api_key: Some(record.key.clone()),
        name: record.name.clone(),
        authenticated: true,
        rate_limit_per_minute: record
            .rate_limit_per_minute
            .unwrap_or(config.authenticated_rate_limit_per_minute),
        allow_manifest_summary: record
            .allow_manifest_summary
            .unwrap_or(config.allow_manifest_summary),
    })
}

fn find_key<'a>(config: &'a Config, key: &str) -> Option<&'a ApiKeyRecord> {
    config.verifier_api_keys.iter().find(|k| k.key == key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use originseal_core::config::ApiKeyRecord;

    fn test_config() -> Config {
        Config {
            database_url: String::new(),
            verify_base_url: String::new(),
            device_token_ttl_seconds: 0,
            device_token_renewal_buffer: 0,
            verify_signatures: false,
            ledger_repo_root: String::new(),
            ledger_batches_subdir: String::new(),
            ledger_roots_subdir: String::new(),
            ledger_proofs_subdir: String::new(),
            ledger_root_index_filename: String::new(),
            ledger_daily_roots_filename: String::new(),
            ledger_proof_manifest_filename: String::new(),
            ledger_git_auto_commit: false,
            ledger_git_auto_push: false,
            ledger_git_remote: String::new(),
            ledger_git_branch: String::new(),
            cors_allow_origins: vec![],
            allow_manifest_summary: false,
            manifest_summary_max_bytes: 4096,
            allowed_manifest_summary_fields: vec![],
            verifier_api_keys: vec![ApiKeyRecord {
                key: "k1".to_string(),
                hmac_secret: "secret".to_string(),
                name: "Client One".to_string(),
                rate_limit_per_minute: Some(120),
                allow_manifest_summary: Some(true),
            }],
            anonymous_rate_limit_per_minute: 60,
            authenticated_rate_limit_per_minute: 600,
            rate_limit_max_entries: 10_000,
            ntp_servers: vec![],
            ntp_timeout_ms: 1500,
            replay_cache_ttl_seconds: 300,
            tls_required: true,
            port: 8080,
            devicecheck_enabled: false,
            devicecheck_team_id: String::new(),
            devicecheck_key_id: String::new(),
            devicecheck_private_key_pem: String::new(),
            devicecheck_environment: "production".to_string(),
            devicecheck_allowed_bundle_ids: vec![],
            devicecheck_timeout_ms: 5000,
            crl_fetch_timeout_ms: 5000,
        }
    }

    #[test]
    fn no_api_key_is_anonymous() {
        let config = test_config();
        let identity = authenticate(
            &AuthHeaders { api_key: None, timestamp: None, signature: None },
            "",
            &config,
            Utc::now(),
        )
        .unwrap();
        assert!(!identity.authenticated);
        assert_eq!(identity.rate_limit_per_minute, 60);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let config = test_config();
        let err = authenticate(
            &AuthHeaders { api_key: Some("nope"), timestamp: None, signature: None },
            "",
            &config,
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err, AuthError::InvalidApiKey);
    }

    #[test]
    fn known_key_without_hmac_headers_is_rejected() {
        let config = test_config();
        let err = authenticate(
            &AuthHeaders { api_key: Some("k1"), timestamp: None, signature: None },
            "",
            &config,
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err, AuthError::MissingHmacHeaders);
    }

    #[test]
    fn valid_signature_authenticates() {
        let config = test_config();
        let now = Utc::now();
        let ts = now.timestamp();
        let sig = originseal_crypto::hmac_auth::sign("secret", ts, "c1");
        let ts_str = ts.to_string();
        let identity = authenticate(
            &AuthHeaders {
                api_key: Some("k1"),
                timestamp: Some(&ts_str),
                signature: Some(&sig),
            },
            "c1",
            &config,
            now,
        )
        .unwrap();
        assert!(identity.authenticated);
        assert_eq!(identity.rate_limit_per_minute, 120);
        assert!(identity.allow_manifest_summary);
    }

    #[test]
    fn timestamp_exactly_at_window_boundary_is_accepted() {
        let config = test_config();
        let now = Utc::now();
        let ts = now.timestamp() - TIMESTAMP_WINDOW_SECONDS;
        let sig = originseal_crypto::hmac_auth::sign("secret", ts, "");
        let ts_str = ts.to_string();
        let result = authenticate(
            &AuthHeaders {
                api_key: Some("k1"),
                timestamp: Some(&ts_str),
                signature: Some(&sig),
            },
            "",
            &config,
            now,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn timestamp_one_second_past_window_is_rejected() {
        let config = test_config();
        let now = Utc::now();
        let ts = now.timestamp() - TIMESTAMP_WINDOW_SECONDS - 1;
        let sig = originseal_crypto::hmac_auth::sign("secret", ts, "");
        let ts_str = ts.to_string();
        let err = authenticate(
            &AuthHeaders {
                api_key: Some("k1"),
                timestamp: Some(&ts_str),
                signature: Some(&sig),
            },
            "",
            &config,
            now,
        )
        .unwrap_err();
        assert_eq!(err, AuthError::TimestampOutOfWindow);
    }
}
