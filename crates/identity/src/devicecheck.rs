//! Apple DeviceCheck client: the synchronous single-endpoint `validate_device_token`
//! flow mandated by §4.7/§9. The multi-endpoint update/query variants and the
//! async JWT-refresh client the reference carries are explicitly out of scope
//! (§9 open question) — this client mints one short-lived JWT per call and
//! posts once, matching Apple's documented contract.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use thiserror::Error;

const PRODUCTION_URL: &str = "https://api.devicecheck.apple.com/v1/validate_device_token";
const DEVELOPMENT_URL: &str = "https://api.development.devicecheck.apple.com/v1/validate_device_token";

#[derive(Debug, Error)]
pub enum DeviceCheckError {
    /// Surfaced as `devicecheck_<reason>` (maps to HTTP 403 at the boundary).
    #[error("{0}")]
    Rejected(String),
}

#[derive(Debug, Clone)]
pub struct DeviceCheckConfig {
    pub enabled: bool,
    pub team_id: String,
    pub key_id: String,
    pub private_key_pem: String,
    pub environment: String,
    pub allowed_bundle_ids: Vec<String>,
    pub timeout: Duration,
}

#[derive(Serialize)]
struct Claims {
    iss: String,
    iat: i64,
}

#[derive(Serialize)]
struct ValidateRequest<'a> {
    device_token: &'a str,
    transaction_id: String,
    timestamp: i64,
}

/// Long-lived DeviceCheck HTTP client; internally a shared, thread-safe
/// `reqwest::Client` connection pool, constructed once at startup (§5).
pub struct DeviceCheckClient {
    http: reqwest::Client,
    config: DeviceCheckConfig,
}

impl DeviceCheckClient {
    pub fn new(config: DeviceCheckConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("reqwest client builds with a finite timeout");
        DeviceCheckClient { http, config }
    }

    /// Mints a fresh ES256 JWT (`iss` = team id, `kid` header = key id) and
    /// POSTs a single `validate_device_token` call. `Ok(())` means Apple
    /// accepted the token as genuine and unused for this transaction;
    /// `Err` carries the reason suffix for the `devicecheck_<reason>` code.
    pub async fn validate(&self, device_token: &str) -> Result<(), DeviceCheckError> {
        if BASE64.decode(device_token).is_err() {
            return Err(DeviceCheckError::Rejected("token_invalid".to_string()));
        }

        let jwt = self.mint_jwt().map_err(|_| {
            DeviceCheckError::Rejected("server_misconfigured".to_string())
        })?;

        let url = if self.config.environment == "development" {
            DEVELOPMENT_URL
        } else {
            PRODUCTION_URL
        };

        let body = ValidateRequest {
            device_token,
            transaction_id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        };

        let response = self
            .http
            .post(url)
            .bearer_auth(jwt)
            .json(&body)
            .send()
            .await
            .map_err(|_| DeviceCheckError::Rejected("devicecheck_service_error".to_string()))?;

        match response.status().as_u16() {
            200..=299 => Ok(()),
            400 => Err(DeviceCheckError::Rejected("invalid_device_token".to_string())),
            401 => Err(DeviceCheckError::Rejected("unauthorized".to_string())),
            429 => Err(DeviceCheckError::Rejected("rate_limited".to_string())),
            _ => Err(DeviceCheckError::Rejected("devicecheck_service_error".to_string())),
        }
    }

    fn mint_jwt(&self) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = Claims {
            iss: self.config.team_id.clone(),
            iat: chrono::Utc::now().timestamp(),
        };
        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.config.key_id.clone());
        let key = EncodingKey::from_ec_pem(self.config.private_key_pem.as_bytes())?;
        encode(&header, &claims, &key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_non_base64_device_token() {
        let client = DeviceCheckClient::new(DeviceCheckConfig {
            enabled: true,
            team_id: "TEAM".to_string(),
            key_id: "KEY".to_string(),
            private_key_pem: String::new(),
            environment: "development".to_string(),
            allowed_bundle_ids: vec![],
            timeout: Duration::from_millis(50),
        });
        let err = client.validate("not base64 !!!").await.unwrap_err();
        assert_eq!(err.to_string(), "token_invalid");
    }
}
