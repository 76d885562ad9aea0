//! Route handlers for the provenance ledger HTTP surface (C12, §6).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use originseal_core::model::CaptureRecord;
use originseal_identity::token_service::{EnrolRequest, TokenService};
use originseal_verify::{authenticate, engine, AuthHeaders, VerifyRequest};

use crate::error::ApiError;
use crate::state::AppState;

const SHORTCODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const SHORTCODE_LEN: usize = 6;

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn generate_shortcode() -> String {
    let mut rng = rand::thread_rng();
    (0..SHORTCODE_LEN)
        .map(|_| SHORTCODE_ALPHABET[rng.gen_range(0..SHORTCODE_ALPHABET.len())] as char)
        .collect()
}

// ---- GET /health --------------------------------------------------------

pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    let store = state.store.lock().expect("store mutex poisoned");
    match store.ping() {
        Ok(()) => Json(json!({ "status": "ok" })).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "health check database ping failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
                .into_response()
        }
    }
}

// ---- POST /device/enroll -------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct EnrollBody {
    pub device_id: String,
    pub public_key: String,
    pub platform: Option<String>,
    pub app_version: Option<String>,
    pub devicecheck_token: Option<String>,
    pub bundle_id: Option<String>,
    pub current_token: Option<String>,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
pub struct EnrollResponse {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub async fn enroll(
    State(state): State<Arc<AppState>>,
    Json(body): Json<EnrollBody>,
) -> Result<Json<EnrollResponse>, ApiError> {
    let store = state.store.lock().expect("store mutex poisoned");
    let service = TokenService {
        store: &store,
        ttl_seconds: state.config.device_token_ttl_seconds,
        renewal_buffer_seconds: state.config.device_token_renewal_buffer,
        devicecheck: state.devicecheck.as_ref(),
        devicecheck_allowed_bundle_ids: &state.config.devicecheck_allowed_bundle_ids,
    };

    let req = EnrolRequest {
        device_id: body.device_id,
        public_key: body.public_key,
        platform: body.platform,
        app_version: body.app_version,
        devicecheck_token: body.devicecheck_token,
        bundle_id: body.bundle_id,
        current_token: body.current_token,
        force: body.force,
    };

    let resp = service.enrol(&req).await?;
    Ok(Json(EnrollResponse {
        token: resp.token,
        issued_at: resp.issued_at,
        expires_at: resp.expires_at,
    }))
}

// ---- POST /lock-proof ----------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LockProofBody {
    pub device_id: String,
    pub device_pubkey: String,
    pub asset_hash: String,
    pub capture_time_utc: String,
    pub signature: Option<String>,
    pub geo_lat: Option<String>,
    pub geo_lon: Option<String>,
    pub geo_accuracy_m: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LockProofResponse {
    pub status: &'static str,
    pub record_id: String,
    pub shortcode: String,
    pub verify_url: String,
    pub merkle: MerkleBlock,
}

#[derive(Debug, Serialize)]
pub struct MerkleBlock {
    pub batch_id: Option<String>,
    pub root_hash: Option<String>,
    pub sealed_at_utc: Option<DateTime<Utc>>,
}

pub async fn lock_proof(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<LockProofBody>,
) -> Result<Json<LockProofResponse>, ApiError> {
    let bearer = header_str(&headers, "authorization")
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::UNAUTHORIZED,
                "missing_authorization",
                "Missing or invalid Authorization header",
            )
        })?;

    let header_device_id = header_str(&headers, "x-device-id").unwrap_or_default();
    let header_pubkey = header_str(&headers, "x-device-publickey").unwrap_or_default();

    if header_device_id != body.device_id {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "device_id_mismatch",
            "X-Device-ID does not match body device_id",
        ));
    }
    if header_pubkey != body.device_pubkey {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "device_pubkey_mismatch",
            "X-Device-PublicKey does not match body device_pubkey",
        ));
    }

    let store = state.store.lock().expect("store mutex poisoned");
    let stored = store
        .get_device_token(&body.device_id)?
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::UNAUTHORIZED,
                "invalid_token_or_device",
                "Invalid token or device",
            )
        })?;

    if stored.token != bearer {
        return Err(ApiError::new(
            StatusCode::UNAUTHORIZED,
            "invalid_token_or_device",
            "Invalid token or device",
        ));
    }
    if stored.expires_at <= Utc::now() {
        return Err(ApiError::new(StatusCode::UNAUTHORIZED, "token_expired", "Token expired"));
    }
    if stored.public_key != body.device_pubkey {
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "public_key_mismatch",
            "Public key mismatch",
        ));
    }

    if state.config.verify_signatures {
        let signature = body.signature.as_deref().ok_or_else(|| {
            ApiError::new(StatusCode::BAD_REQUEST, "invalid_signature", "Invalid signature")
        })?;
        let message = format!("{}|{}", body.asset_hash, body.capture_time_utc);
        originseal_crypto::ed25519::verify(&stored.public_key, message.as_bytes(), signature)
            .map_err(|_| {
                ApiError::new(StatusCode::BAD_REQUEST, "invalid_signature", "Invalid signature")
            })?;
    }

    let capture_time_utc = DateTime::parse_from_rfc3339(&body.capture_time_utc)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            ApiError::new(
                StatusCode::BAD_REQUEST,
                "invalid_capture_time_utc",
                "Invalid capture_time_utc",
            )
        })?;

    let record_id = Uuid::new_v4().to_string();
    let shortcode = generate_shortcode();
    let verify_url = format!("{}/v/{}", state.config.verify_base_url, record_id);

    let record = CaptureRecord {
        record_id: record_id.clone(),
        shortcode: Some(shortcode.clone()),
        verify_url: Some(verify_url.clone()),
        asset_hash: Some(body.asset_hash),
        capture_time_utc: Some(capture_time_utc),
        device_id: Some(body.device_id),
        device_pubkey: Some(body.device_pubkey),
        geo_lat: body.geo_lat,
        geo_lon: body.geo_lon,
        geo_accuracy_m: body.geo_accuracy_m,
        signature: body.signature,
        created_at_utc: Utc::now(),
        merkle_batch_id: None,
        merkle_root_hash: None,
        merkle_sealed_at_utc: None,
    };
    store.insert_capture_record(&record)?;

    Ok(Json(LockProofResponse {
        status: "LOCKED",
        record_id,
        shortcode,
        verify_url,
        merkle: MerkleBlock {
            batch_id: None,
            root_hash: None,
            sealed_at_utc: None,
        },
    }))
}

// ---- shared verifier auth helper ----------------------------------------

fn verify_request_from_value(payload: &Value) -> VerifyRequest {
    VerifyRequest {
        content_hash: payload.get("content_hash").and_then(|v| v.as_str()).map(String::from),
        manifest_hash: payload.get("manifest_hash").and_then(|v| v.as_str()).map(String::from),
        device_signature_hash: payload
            .get("device_signature_hash")
            .and_then(|v| v.as_str())
            .map(String::from),
        attestation_cert_hash: payload
            .get("attestation_cert_hash")
            .and_then(|v| v.as_str())
            .map(String::from),
        client_nonce: payload.get("client_nonce").and_then(|v| v.as_str()).map(String::from),
        manifest_summary: payload.get("manifest_summary").cloned(),
    }
}

// ---- POST /api/v1/verify -------------------------------------------------

pub async fn verify(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Result<Json<engine::VerifyResponse>, ApiError> {
    let content_hash = payload.get("content_hash").and_then(|v| v.as_str()).unwrap_or("");
    let auth_headers = AuthHeaders {
        api_key: header_str(&headers, "x-api-key"),
        timestamp: header_str(&headers, "x-api-timestamp"),
        signature: header_str(&headers, "x-api-signature"),
    };
    state.trusted_clock.refresh_if_due();
    let now = state.trusted_clock.now();
    let identity = authenticate(&auth_headers, content_hash, &state.config, now)?;

    let rate_key = identity.api_key.clone().unwrap_or_else(|| "anonymous".to_string());
    if !state.rate_limiter.hit(&rate_key, identity.rate_limit_per_minute) {
        return Err(ApiError::new(StatusCode::TOO_MANY_REQUESTS, "rate_limited", "rate_limited"));
    }

    let parsed = verify_request_from_value(&payload);
    let store = state.store.lock().expect("store mutex poisoned");
    let response = engine::verify(
        &payload,
        &parsed,
        &identity,
        &store,
        &state.replay_guard,
        now,
        &state.config.allowed_manifest_summary_fields,
        state.config.manifest_summary_max_bytes,
    )?;
    Ok(Json(response))
}

// ---- POST /api/v1/ledger/lookup -----------------------------------------

pub async fn lookup(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Result<Json<originseal_core::model::LedgerEntry>, ApiError> {
    let content_hash = payload.get("content_hash").and_then(|v| v.as_str()).unwrap_or("");
    let auth_headers = AuthHeaders {
        api_key: header_str(&headers, "x-api-key"),
        timestamp: header_str(&headers, "x-api-timestamp"),
        signature: header_str(&headers, "x-api-signature"),
    };
    state.trusted_clock.refresh_if_due();
    let now = state.trusted_clock.now();
    let identity = authenticate(&auth_headers, content_hash, &state.config, now)?;

    if !identity.authenticated {
        return Err(ApiError::new(
            StatusCode::UNAUTHORIZED,
            "api_key_required",
            "api_key_required",
        ));
    }

    let rate_key = identity.api_key.clone().unwrap_or_else(|| "anonymous".to_string());
    if !state.rate_limiter.hit(&rate_key, identity.rate_limit_per_minute) {
        return Err(ApiError::new(StatusCode::TOO_MANY_REQUESTS, "rate_limited", "rate_limited"));
    }

    let parsed = verify_request_from_value(&payload);
    let store = state.store.lock().expect("store mutex poisoned");
    let entry = engine::lookup(&store, &parsed)?;
    Ok(Json(entry))
}

// ---- GET /api/v1/certs/{cert_hash} --------------------------------------

#[derive(Debug, Serialize)]
pub struct CertResponse {
    pub cert_hash: String,
    pub pem: Option<String>,
    pub serial_number: Option<String>,
    pub issuer: Option<String>,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revocation_reason: Option<String>,
}

pub async fn get_cert(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(cert_hash): Path<String>,
) -> Result<Json<CertResponse>, ApiError> {
    let auth_headers = AuthHeaders {
        api_key: header_str(&headers, "x-api-key"),
        timestamp: header_str(&headers, "x-api-timestamp"),
        signature: header_str(&headers, "x-api-signature"),
    };
    let now = state.trusted_clock.now();
    let identity = authenticate(&auth_headers, "", &state.config, now)?;

    let store = state.store.lock().expect("store mutex poisoned");
    let cert = originseal_verify::cert_store::get(&store, &cert_hash)?;

    Ok(Json(CertResponse {
        cert_hash: cert.cert_hash,
        pem: if identity.authenticated { cert.pem } else { None },
        serial_number: cert.serial_number,
        issuer: cert.issuer,
        revoked: cert.revoked,
        revoked_at: cert.revoked_at,
        revocation_reason: cert.revocation_reason,
    }))
}
