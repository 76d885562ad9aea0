//! Persistence contracts (C11): the four entities the backend owns and the
//! invariants the store enforces on them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A bearer token bound to a device's Ed25519 public key.
///
/// Keyed by `device_id`; invariant: `token` is globally unique and
/// `expires_at > issued_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceToken {
    pub device_id: String,
    pub token: String,
    pub public_key: String,
    pub platform: Option<String>,
    pub app_version: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub force_renewal_required: bool,
}

/// An immutable write-path record of a device witnessing some content at a
/// point in time. Sealing fields start `NULL` and are set exactly once, all
/// together, by the Merkle sealer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureRecord {
    pub record_id: String,
    pub shortcode: Option<String>,
    pub verify_url: Option<String>,
    pub asset_hash: Option<String>,
    pub capture_time_utc: Option<DateTime<Utc>>,
    pub device_id: Option<String>,
    pub device_pubkey: Option<String>,
    pub geo_lat: Option<String>,
    pub geo_lon: Option<String>,
    pub geo_accuracy_m: Option<String>,
    pub signature: Option<String>,
    pub created_at_utc: DateTime<Utc>,
    pub merkle_batch_id: Option<String>,
    pub merkle_root_hash: Option<String>,
    pub merkle_sealed_at_utc: Option<DateTime<Utc>>,
}

/// A sealed, queryable ledger row. Distinct from `CaptureRecord`: a
/// `CaptureRecord` is the write-path row; a `LedgerEntry` is what the
/// verification engine matches against, keyed by content/manifest/signature
/// hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: String,
    pub content_hash: String,
    pub manifest_hash: Option<String>,
    pub device_signature_hash: Option<String>,
    pub attestation_cert_hash: String,
    pub timestamp_utc: DateTime<Utc>,
    pub proof_level: String,
    pub merkle_root: Option<String>,
    pub merkle_proof: Option<String>,
    pub entry_hash: String,
    pub created_at_utc: DateTime<Utc>,
    pub sourced_from: Option<String>,
}

/// An ingested platform attestation certificate, keyed by the SHA-256 of its
/// DER encoding. `revoked` is monotonic once set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationCertificate {
    pub cert_hash: String,
    pub pem: Option<String>,
    pub metadata_json: Option<String>,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revocation_reason: Option<String>,
    pub created_at_utc: DateTime<Utc>,
    pub serial_number: Option<String>,
    pub issuer: Option<String>,
    pub crl_urls: Option<String>,
    pub last_checked_at: Option<DateTime<Utc>>,
}
