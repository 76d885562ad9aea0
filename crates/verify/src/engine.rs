//! Verification engine (C10, §4.10): hygiene, replay guard, ledger lookup,
//! multi-predicate verdict.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use originseal_core::model::LedgerEntry;
use originseal_core::store::Store;
use originseal_core::types::ProofLevel;

use crate::auth::ClientIdentity;
use crate::error::{Result, VerifyError};
use crate::hygiene::{check_manifest_summary, check_payload_hygiene};
use crate::replay_guard::ReplayGuard;

const TIMESTAMP_LEAD_TOLERANCE_SECONDS: i64 = 120;
const VERDICT_TTL_MINUTES: i64 = 5;

/// Parsed fields of a verify request, pulled out of the raw JSON body by the
/// caller so this module stays decoupled from the HTTP deserialization layer.
#[derive(Debug, Clone, Default)]
pub struct VerifyRequest {
    pub content_hash: Option<String>,
    pub manifest_hash: Option<String>,
    pub device_signature_hash: Option<String>,
    pub attestation_cert_hash: Option<String>,
    pub client_nonce: Option<String>,
    pub manifest_summary: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyResponse {
    pub verdict: &'static str,
    pub reason: Option<&'static str>,
    pub content_match: bool,
    pub attestation_valid: bool,
    pub signature_valid: bool,
    pub manifest_valid: bool,
    pub timestamp_valid: bool,
    pub proof_level: ProofLevel,
    pub expires_at: DateTime<Utc>,
    pub notes: Vec<String>,
}

impl VerifyResponse {
    fn not_found(now: DateTime<Utc>) -> Self {
        VerifyResponse {
            verdict: "not_verified",
            reason: Some("ledger_not_found"),
            content_match: false,
            attestation_valid: false,
            signature_valid: false,
            manifest_valid: false,
            timestamp_valid: false,
            proof_level: ProofLevel::Basic,
            expires_at: now + chrono::Duration::minutes(VERDICT_TTL_MINUTES),
            notes: vec!["no ledger entry matched content_hash, manifest_hash, or device_signature_hash".to_string()],
        }
    }
}

/// Full verification pass per §4.10, steps 1-7. `raw_payload` is the
/// untouched request body, used for the hygiene walk; `parsed` is the same
/// body's relevant fields pulled out for lookup and predicate evaluation.
pub fn verify(
    raw_payload: &Value,
    parsed: &VerifyRequest,
    identity: &ClientIdentity,
    store: &Store,
    replay_guard: &ReplayGuard,
    trusted_now: DateTime<Utc>,
    allowed_manifest_fields: &[String],
    manifest_summary_max_bytes: usize,
) -> Result<VerifyResponse> {
    check_payload_hygiene(raw_payload)?;
    check_manifest_summary(
        parsed.manifest_summary.as_ref(),
        identity,
        allowed_manifest_fields,
        manifest_summary_max_bytes,
    )?;

    let content_hash = parsed.content_hash.as_deref().unwrap_or("");
    let replay_key = ReplayGuard::key(parsed.client_nonce.as_deref(), content_hash);
    if replay_guard.check_and_record(&replay_key) {
        return Err(VerifyError::ReplayDetected);
    }

    let Some(entry) = lookup_entry(store, parsed)? else {
        return Ok(VerifyResponse::not_found(trusted_now));
    };

    evaluate(&entry, parsed, store, trusted_now)
}

/// Lookup-only path (skips hygiene, manifest-summary, and replay checks, and
/// the predicate/verdict machinery): returns the matched entry or
/// [`VerifyError::LedgerNotFound`].
pub fn lookup(store: &Store, parsed: &VerifyRequest) -> Result<LedgerEntry> {
    lookup_entry(store, parsed)?.ok_or(VerifyError::LedgerNotFound)
}

fn lookup_entry(store: &Store, req: &VerifyRequest) -> Result<Option<LedgerEntry>> {
    if let Some(hash) = &req.content_hash {
        if let Some(entry) = store.find_ledger_entry_by_content_hash(hash)? {
            return Ok(Some(entry));
        }
    }
    if let Some(hash) = &req.manifest_hash {
        if let Some(entry) = store.find_ledger_entry_by_manifest_hash(hash)? {
            return Ok(Some(entry));
        }
    }
    if let Some(hash) = &req.device_signature_hash {
        if let Some(entry) = store.find_ledger_entry_by_signature_hash(hash)? {
            return Ok(Some(entry));
        }
    }
    Ok(None)
}

fn evaluate(
    entry: &LedgerEntry,
    req: &VerifyRequest,
    store: &Store,
    trusted_now: DateTime<Utc>,
) -> Result<VerifyResponse> {
    let content_match = req.content_hash.as_deref() == Some(entry.content_hash.as_str());

    let attestation_valid = req.attestation_cert_hash.as_deref() == Some(entry.attestation_cert_hash.as_str())
        && store
            .get_certificate(&entry.attestation_cert_hash)?
            .map(|c| !c.revoked)
            .unwrap_or(false);

    let signature_valid = match (&req.device_signature_hash, &entry.device_signature_hash) {
        (Some(client), Some(ledger)) => client == ledger,
        (None, Some(_)) => false,
        _ => true,
    };

    let manifest_valid = match (&req.manifest_hash, &entry.manifest_hash) {
        (Some(client), Some(ledger)) => client == ledger,
        _ => true,
    };

    let timestamp_valid =
        (entry.timestamp_utc - trusted_now).num_seconds() <= TIMESTAMP_LEAD_TOLERANCE_SECONDS;

    let (verdict, reason): (&'static str, Option<&'static str>) = if !attestation_valid {
        ("not_verified", Some("attestation_revoked"))
    } else if !signature_valid || !manifest_valid {
        ("not_verified", Some("signature_mismatch"))
    } else if !timestamp_valid {
        ("not_verified", Some("timestamp_mismatch"))
    } else if !content_match {
        ("not_verified", Some("ledger_not_found"))
    } else {
        ("verified", None)
    };

    let mut notes = Vec::new();
    if !content_match {
        notes.push("content_hash did not match the matched ledger entry".to_string());
    }
    if !attestation_valid {
        notes.push("attestation certificate missing, mismatched, or revoked".to_string());
    }
    if !signature_valid {
        notes.push("device_signature_hash mismatch against the ledger entry".to_string());
    }
    if !manifest_valid {
        notes.push("manifest_hash mismatch against the ledger entry".to_string());
    }
    if !timestamp_valid {
        notes.push("ledger timestamp leads the trusted clock beyond tolerance".to_string());
    }
    notes.truncate(4);

    Ok(VerifyResponse {
        verdict,
        reason,
        content_match,
        attestation_valid,
        signature_valid,
        manifest_valid,
        timestamp_valid,
        proof_level: ProofLevel::clamp(&entry.proof_level),
        expires_at: trusted_now + chrono::Duration::minutes(VERDICT_TTL_MINUTES),
        notes,
    })
}
