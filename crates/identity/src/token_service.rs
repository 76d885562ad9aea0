//! Device enrolment and token lifecycle (C7, §4.7).

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use originseal_core::model::DeviceToken;
use originseal_core::store::Store;

use crate::devicecheck::DeviceCheckClient;
use crate::error::{IdentityError, Result};

/// Incoming enrolment request, as decoded from `POST /device/enroll`.
#[derive(Debug, Clone)]
pub struct EnrolRequest {
    pub device_id: String,
    pub public_key: String,
    pub platform: Option<String>,
    pub app_version: Option<String>,
    pub devicecheck_token: Option<String>,
    pub bundle_id: Option<String>,
    pub current_token: Option<String>,
    pub force: bool,
}

/// Successful enrolment outcome.
#[derive(Debug, Clone)]
pub struct EnrolResponse {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub struct TokenService<'a> {
    pub store: &'a Store,
    pub ttl_seconds: i64,
    pub renewal_buffer_seconds: i64,
    pub devicecheck: Option<&'a DeviceCheckClient>,
    pub devicecheck_allowed_bundle_ids: &'a [String],
}

impl<'a> TokenService<'a> {
    /// Runs the full enrolment flow of §4.7, steps 1-5.
    pub async fn enrol(&self, req: &EnrolRequest) -> Result<EnrolResponse> {
        // Step 1: public key format.
        if !originseal_crypto::ed25519::is_well_formed_public_key(&req.public_key) {
            return Err(IdentityError::PublicKeyMalformed);
        }

        // Step 2: optional DeviceCheck attestation.
        if let Some(client) = self.devicecheck {
            let token = req
                .devicecheck_token
                .as_ref()
                .ok_or(IdentityError::DeviceCheckTokenRequired)?;
            if BASE64.decode(token).is_err() {
                return Err(IdentityError::DeviceCheckTokenInvalid);
            }
            if !self.devicecheck_allowed_bundle_ids.is_empty() {
                let bundle_id = req
                    .bundle_id
                    .as_ref()
                    .ok_or(IdentityError::BundleIdRequired)?;
                if !self
                    .devicecheck_allowed_bundle_ids
                    .iter()
                    .any(|b| b == bundle_id)
                {
                    return Err(IdentityError::BundleIdNotAllowed);
                }
            }
            client
                .validate(token)
                .await
                .map_err(|e| IdentityError::DeviceCheckRejected(e.to_string()))?;
        }

        let now = Utc::now();
        let existing = self.store.get_device_token(&req.device_id)?;

        let issued = match existing {
            // Step 3: no existing row, issue fresh.
            None => self.issue_fresh(req, now)?,
            Some(stored) => {
                if req.force {
                    // force=true rotates unconditionally.
                    self.rotate(req, now)?
                } else {
                    if stored.token != req.current_token.clone().unwrap_or_default() {
                        return Err(IdentityError::TokenMismatch);
                    }
                    let remaining = stored.expires_at - now;
                    if !stored.force_renewal_required
                        && remaining > ChronoDuration::seconds(self.renewal_buffer_seconds)
                    {
                        // Idempotent reuse: same token bytes.
                        EnrolResponse {
                            token: stored.token.clone(),
                            issued_at: stored.issued_at,
                            expires_at: stored.expires_at,
                        }
                    } else {
                        self.rotate(req, now)?
                    }
                }
            }
        };

        Ok(issued)
    }

    fn issue_fresh(&self, req: &EnrolRequest, now: DateTime<Utc>) -> Result<EnrolResponse> {
        let token = originseal_crypto::token::generate_bearer_token();
        let expires_at = now + ChronoDuration::seconds(self.ttl_seconds);
        let row = DeviceToken {
            device_id: req.device_id.clone(),
            token: token.clone(),
            public_key: req.public_key.clone(),
            platform: req.platform.clone(),
            app_version: req.app_version.clone(),
            issued_at: now,
            expires_at,
            force_renewal_required: false,
        };
        self.store.put_device_token(&row)?;
        Ok(EnrolResponse {
            token,
            issued_at: now,
            expires_at,
        })
    }

    fn rotate(&self, req: &EnrolRequest, now: DateTime<Utc>) -> Result<EnrolResponse> {
        self.issue_fresh(req, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(device_id: &str) -> EnrolRequest {
        EnrolRequest {
            device_id: device_id.to_string(),
            public_key: "ed25519:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=".to_string(),
            platform: Some("iOS".to_string()),
            app_version: None,
            devicecheck_token: None,
            bundle_id: None,
            current_token: None,
            force: false,
        }
    }

    #[tokio::test]
    async fn fresh_enrolment_issues_a_token() {
        let store = Store::open_in_memory().unwrap();
        let service = TokenService {
            store: &store,
            ttl_seconds: 2_592_000,
            renewal_buffer_seconds: 604_800,
            devicecheck: None,
            devicecheck_allowed_bundle_ids: &[],
        };
        let resp = service.enrol(&req("d1")).await.unwrap();
        assert!(resp.expires_at > resp.issued_at);
        assert_eq!(store.get_device_token("d1").unwrap().unwrap().token, resp.token);
    }

    #[tokio::test]
    async fn reenrolment_outside_renewal_buffer_reuses_token() {
        let store = Store::open_in_memory().unwrap();
        let service = TokenService {
            store: &store,
            ttl_seconds: 2_592_000,
            renewal_buffer_seconds: 604_800,
            devicecheck: None,
            devicecheck_allowed_bundle_ids: &[],
        };
        let first = service.enrol(&req("d1")).await.unwrap();

        let mut second_req = req("d1");
        second_req.current_token = Some(first.token.clone());
        let second = service.enrol(&second_req).await.unwrap();

        assert_eq!(first.token, second.token);
    }

    #[tokio::test]
    async fn wrong_current_token_is_rejected() {
        let store = Store::open_in_memory().unwrap();
        let service = TokenService {
            store: &store,
            ttl_seconds: 2_592_000,
            renewal_buffer_seconds: 604_800,
            devicecheck: None,
            devicecheck_allowed_bundle_ids: &[],
        };
        service.enrol(&req("d1")).await.unwrap();

        let mut bad_req = req("d1");
        bad_req.current_token = Some("wrong-token".to_string());
        let err = service.enrol(&bad_req).await.unwrap_err();
        assert!(matches!(err, IdentityError::TokenMismatch));
    }

    #[tokio::test]
    async fn malformed_public_key_is_rejected() {
        let store = Store::open_in_memory().unwrap();
        let service = TokenService {
            store: &store,
            ttl_seconds: 2_592_000,
            renewal_buffer_seconds: 604_800,
            devicecheck: None,
            devicecheck_allowed_bundle_ids: &[],
        };
        let mut bad = req("d1");
        bad.public_key = "not-a-key".to_string();
        let err = service.enrol(&bad).await.unwrap_err();
        assert!(matches!(err, IdentityError::PublicKeyMalformed));
    }
}
