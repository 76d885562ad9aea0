//! End-to-end scenarios from the trust/ledger pipeline spec (§8), wired
//! across crate boundaries the way a deployed service would: enrol a
//! device, lock a capture record, seal a batch, and verify it.

use chrono::Utc;
use ed25519_dalek::{Signer, SigningKey};
use originseal_core::merkle::compute_merkle_root;
use originseal_core::model::{AttestationCertificate, CaptureRecord, LedgerEntry};
use originseal_core::sealer::seal_pending_records;
use originseal_core::store::Store;
use originseal_crypto::ed25519;
use originseal_identity::token_service::{EnrolRequest, TokenService};
use originseal_verify::engine::{self, VerifyRequest};
use originseal_verify::ReplayGuard;
use rand::rngs::OsRng;
use std::time::Duration;

fn test_config(ledger_root: &std::path::Path) -> originseal_core::Config {
    originseal_core::Config {
        database_url: "sqlite://:memory:".to_string(),
        verify_base_url: "https://verify.example.com".to_string(),
        device_token_ttl_seconds: 2_592_000,
        device_token_renewal_buffer: 604_800,
        verify_signatures: true,
        ledger_repo_root: ledger_root.display().to_string(),
        ledger_batches_subdir: "batches".to_string(),
        ledger_roots_subdir: "roots".to_string(),
        ledger_proofs_subdir: "proofs".to_string(),
        ledger_root_index_filename: "ledger_index.json".to_string(),
        ledger_daily_roots_filename: "daily_roots.csv".to_string(),
        ledger_proof_manifest_filename: "proof_manifest.jsonl".to_string(),
        ledger_git_auto_commit: false,
        ledger_git_auto_push: false,
        ledger_git_remote: "origin".to_string(),
        ledger_git_branch: "main".to_string(),
        cors_allow_origins: vec![],
        allow_manifest_summary: false,
        manifest_summary_max_bytes: 4096,
        allowed_manifest_summary_fields: vec![],
        verifier_api_keys: vec![],
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

/// Scenario 1: enrol a device, then write a lock-proof record against the
/// issued token, checking the Ed25519 signature the device attached.
#[tokio::test]
async fn enrol_then_lock_produces_a_locked_record_with_null_merkle_fields() {
    let store = Store::open_in_memory().unwrap();

    let mut csprng = OsRng;
    let signing_key = SigningKey::generate(&mut csprng);
    let public_key = format!(
        "ed25519:{}",
        base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            signing_key.verifying_key().to_bytes()
        )
    );

    let service = TokenService {
        store: &store,
        ttl_seconds: 2_592_000,
        renewal_buffer_seconds: 604_800,
        devicecheck: None,
        devicecheck_allowed_bundle_ids: &[],
    };
    let enrolment = service
        .enrol(&EnrolRequest {
            device_id: "d1".to_string(),
            public_key: public_key.clone(),
            platform: Some("iOS".to_string()),
            app_version: None,
            devicecheck_token: None,
            bundle_id: None,
            current_token: None,
            force: false,
        })
        .await
        .unwrap();
    assert_eq!(
        enrolment.expires_at - enrolment.issued_at,
        chrono::Duration::days(30)
    );

    let asset_hash = format!("sha256:{}", "a".repeat(64));
    let capture_time_utc = "2026-01-01T00:00:00Z".to_string();
    let message = format!("{asset_hash}|{capture_time_utc}");
    let sig = signing_key.sign(message.as_bytes());
    let signature = format!(
        "ed25519_sig:{}",
        base64::Engine::encode(&base64::engine::general_purpose::STANDARD, sig.to_bytes())
    );

    // Mirrors the `/lock-proof` handler's signature check when
    // VERIFY_SIGNATURES=true.
    ed25519::verify(&public_key, message.as_bytes(), &signature).unwrap();

    let record_id = uuid::Uuid::new_v4().to_string();
    let verify_url = format!("https://verify.example.com/v/{record_id}");
    let record = CaptureRecord {
        record_id: record_id.clone(),
        shortcode: Some("abc123".to_string()),
        verify_url: Some(verify_url.clone()),
        asset_hash: Some(asset_hash),
        capture_time_utc: Some(
            chrono::DateTime::parse_from_rfc3339(&capture_time_utc)
                .unwrap()
                .with_timezone(&Utc),
        ),
        device_id: Some("d1".to_string()),
        device_pubkey: Some(public_key),
        geo_lat: None,
        geo_lon: None,
        geo_accuracy_m: None,
        signature: Some(signature),
        created_at_utc: Utc::now(),
        merkle_batch_id: None,
        merkle_root_hash: None,
        merkle_sealed_at_utc: None,
    };
    store.insert_capture_record(&record).unwrap();

    let pending = store.select_unsealed_records().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].merkle_batch_id, None);
    assert!(pending[0].verify_url.as_ref().unwrap().ends_with(&record_id));
}

/// Scenario 2: two capture records sealed together yield one batch file
/// whose root matches the leaves' recomputed Merkle root.
#[test]
fn sealing_two_records_yields_one_batch_with_matching_root() {
    let mut store = Store::open_in_memory().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let a = format!("sha256:{}", "a".repeat(64));
    let b = format!("sha256:{}", "b".repeat(64));
    let t0 = Utc::now();
    for (id, hash) in [("r1", &a), ("r2", &b)] {
        store
            .insert_capture_record(&CaptureRecord {
                record_id: id.to_string(),
                shortcode: Some("abc123".to_string()),
                verify_url: Some(format!("https://verify.example.com/v/{id}")),
                asset_hash: Some(hash.clone()),
                capture_time_utc: Some(t0),
                device_id: Some("d1".to_string()),
                device_pubkey: Some("ed25519:AAAA".to_string()),
                geo_lat: None,
                geo_lon: None,
                geo_accuracy_m: None,
                signature: None,
                created_at_utc: t0,
                merkle_batch_id: None,
                merkle_root_hash: None,
                merkle_sealed_at_utc: None,
            })
            .unwrap();
    }

    let report = seal_pending_records(&mut store, &config, false, false)
        .unwrap()
        .expect("one batch sealed");
    assert_eq!(report.record_count, 2);
    assert_eq!(report.root_hash, compute_merkle_root(&[a, b]).unwrap());

    let batch_contents = std::fs::read_to_string(&report.ledger_file).unwrap();
    let batch_json: serde_json::Value = serde_json::from_str(&batch_contents).unwrap();
    assert_eq!(batch_json["root_hash"], report.root_hash);

    for id in ["r1", "r2"] {
        let row = store
            .select_unsealed_records()
            .unwrap()
            .iter()
            .find(|r| r.record_id == id)
            .cloned();
        assert!(row.is_none(), "{id} should have left the unsealed set");
    }
}

/// Scenario 3 & 4: a matching ledger entry with a valid attestation yields
/// `verified`/`rooted`; a miss on content_hash yields `ledger_not_found`.
#[tokio::test]
async fn verify_hit_and_miss() {
    let store = Store::open_in_memory().unwrap();
    let now = Utc::now();

    store
        .upsert_certificate(&AttestationCertificate {
            cert_hash: "cert1".to_string(),
            pem: None,
            metadata_json: None,
            revoked: false,
            revoked_at: None,
            revocation_reason: None,
            created_at_utc: now,
            serial_number: Some("ABCD".to_string()),
            issuer: Some("CN=Test".to_string()),
            crl_urls: Some("[]".to_string()),
            last_checked_at: None,
        })
        .unwrap();
    store
        .insert_ledger_entry(&LedgerEntry {
            entry_id: "e1".to_string(),
            content_hash: "c".repeat(64),
            manifest_hash: None,
            device_signature_hash: None,
            attestation_cert_hash: "cert1".to_string(),
            timestamp_utc: now,
            proof_level: "rooted".to_string(),
            merkle_root: Some(format!("sha256:{}", "f".repeat(64))),
            merkle_proof: None,
            entry_hash: "x".repeat(64),
            created_at_utc: now,
            sourced_from: None,
        })
        .unwrap();

    let identity = originseal_verify::ClientIdentity {
        api_key: None,
        name: "anonymous".to_string(),
        authenticated: false,
        rate_limit_per_minute: 60,
        allow_manifest_summary: false,
    };
    let guard = ReplayGuard::new(Duration::from_secs(300));

    let hit_req = VerifyRequest {
        content_hash: Some("c".repeat(64)),
        attestation_cert_hash: Some("cert1".to_string()),
        ..Default::default()
    };
    let hit = engine::verify(
        &serde_json::json!({"content_hash": "c".repeat(64)}),
        &hit_req,
        &identity,
        &store,
        &guard,
        now,
        &[],
        4096,
    )
    .unwrap();
    assert_eq!(hit.verdict, "verified");
    assert_eq!(hit.proof_level, originseal_core::ProofLevel::Rooted);
    assert!((hit.expires_at - now - chrono::Duration::minutes(5)).num_seconds().abs() < 2);

    let miss_req = VerifyRequest {
        content_hash: Some("f".repeat(64)),
        ..Default::default()
    };
    let miss = engine::verify(
        &serde_json::json!({"content_hash": "f".repeat(64)}),
        &miss_req,
        &identity,
        &store,
        &guard,
        now,
        &[],
        4096,
    )
    .unwrap();
    assert_eq!(miss.verdict, "not_verified");
    assert_eq!(miss.reason, Some("ledger_not_found"));
    assert!(!miss.content_match);
}

/// Scenario 5: a certificate transitioned to revoked fails subsequent
/// attestation checks even though the ledger entry otherwise matches.
#[tokio::test]
async fn revoked_certificate_fails_verification() {
    let store = Store::open_in_memory().unwrap();
    let now = Utc::now();

    store
        .upsert_certificate(&AttestationCertificate {
            cert_hash: "cert1".to_string(),
            pem: None,
            metadata_json: None,
            revoked: false,
            revoked_at: None,
            revocation_reason: None,
            created_at_utc: now,
            serial_number: Some("SERIAL1".to_string()),
            issuer: Some("CN=Test".to_string()),
            crl_urls: Some("[]".to_string()),
            last_checked_at: None,
        })
        .unwrap();
    store
        .insert_ledger_entry(&LedgerEntry {
            entry_id: "e1".to_string(),
            content_hash: "c".repeat(64),
            manifest_hash: None,
            device_signature_hash: None,
            attestation_cert_hash: "cert1".to_string(),
            timestamp_utc: now,
            proof_level: "attested".to_string(),
            merkle_root: None,
            merkle_proof: None,
            entry_hash: "x".repeat(64),
            created_at_utc: now,
            sourced_from: None,
        })
        .unwrap();

    // Simulates what the CRL refresher would do on finding this cert's
    // serial in a fetched revocation list.
    store.revoke_certificate("cert1", "crl_revoked", now).unwrap();

    let identity = originseal_verify::ClientIdentity {
        api_key: None,
        name: "anonymous".to_string(),
        authenticated: false,
        rate_limit_per_minute: 60,
        allow_manifest_summary: false,
    };
    let guard = ReplayGuard::new(Duration::from_secs(300));
    let req = VerifyRequest {
        content_hash: Some("c".repeat(64)),
        attestation_cert_hash: Some("cert1".to_string()),
        ..Default::default()
    };
    let resp = engine::verify(
        &serde_json::json!({"content_hash": "c".repeat(64)}),
        &req,
        &identity,
        &store,
        &guard,
        now,
        &[],
        4096,
    )
    .unwrap();
    assert_eq!(resp.verdict, "not_verified");
    assert_eq!(resp.reason, Some("attestation_revoked"));
}

/// Scenario 6: two identical verify payloads sharing a nonce within the TTL
/// window — the second is a replay.
#[tokio::test]
async fn replayed_nonce_is_rejected_on_second_call() {
    let store = Store::open_in_memory().unwrap();
    let identity = originseal_verify::ClientIdentity {
        api_key: None,
        name: "anonymous".to_string(),
        authenticated: false,
        rate_limit_per_minute: 60,
        allow_manifest_summary: false,
    };
    let guard = ReplayGuard::new(Duration::from_secs(300));
    let req = VerifyRequest {
        content_hash: Some("c".repeat(64)),
        client_nonce: Some("nonce-1".to_string()),
        ..Default::default()
    };
    let payload = serde_json::json!({"content_hash": "c".repeat(64), "client_nonce": "nonce-1"});

    engine::verify(&payload, &req, &identity, &store, &guard, Utc::now(), &[], 4096).unwrap();
    let err = engine::verify(&payload, &req, &identity, &store, &guard, Utc::now(), &[], 4096)
        .unwrap_err();
    assert!(matches!(err, originseal_verify::VerifyError::ReplayDetected));
}
