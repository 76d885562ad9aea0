//! SQL DDL for the four persisted entities, applied with `execute_batch` on
//! every `Store::open`, matching the reference ledger's `init_schema`.

pub(crate) const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS device_tokens (
    device_id               TEXT PRIMARY KEY,
    token                   TEXT NOT NULL UNIQUE,
    public_key              TEXT NOT NULL,
    platform                TEXT,
    app_version             TEXT,
    issued_at               TEXT NOT NULL,
    expires_at              TEXT NOT NULL,
    force_renewal_required  INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS capture_records (
    record_id               TEXT PRIMARY KEY,
    shortcode               TEXT,
    verify_url              TEXT,
    asset_hash              TEXT,
    capture_time_utc        TEXT,
    device_id               TEXT,
    device_pubkey           TEXT,
    geo_lat                 TEXT,
    geo_lon                 TEXT,
    geo_accuracy_m          TEXT,
    signature               TEXT,
    created_at_utc          TEXT NOT NULL,
    merkle_batch_id         TEXT,
    merkle_root_hash        TEXT,
    merkle_sealed_at_utc    TEXT
);

CREATE INDEX IF NOT EXISTS idx_capture_records_unsealed
    ON capture_records (created_at_utc, record_id)
    WHERE merkle_batch_id IS NULL;

CREATE TABLE IF NOT EXISTS ledger_entries (
    entry_id                TEXT PRIMARY KEY,
    content_hash            TEXT NOT NULL,
    manifest_hash           TEXT,
    device_signature_hash   TEXT,
    attestation_cert_hash   TEXT NOT NULL,
    timestamp_utc           TEXT NOT NULL,
    proof_level             TEXT NOT NULL DEFAULT 'basic',
    merkle_root             TEXT,
    merkle_proof            TEXT,
    entry_hash              TEXT NOT NULL,
    created_at_utc          TEXT NOT NULL,
    sourced_from            TEXT
);

CREATE INDEX IF NOT EXISTS idx_ledger_entries_content_hash ON ledger_entries (content_hash);
CREATE INDEX IF NOT EXISTS idx_ledger_entries_manifest_hash ON ledger_entries (manifest_hash);
CREATE INDEX IF NOT EXISTS idx_ledger_entries_device_signature_hash ON ledger_entries (device_signature_hash);
CREATE INDEX IF NOT EXISTS idx_ledger_entries_attestation_cert_hash ON ledger_entries (attestation_cert_hash);

CREATE TABLE IF NOT EXISTS attestation_certificates (
    cert_hash               TEXT PRIMARY KEY,
    pem                     TEXT,
    metadata_json           TEXT,
    revoked                 INTEGER NOT NULL DEFAULT 0,
    revoked_at              TEXT,
    revocation_reason       TEXT,
    created_at_utc          TEXT NOT NULL,
    serial_number           TEXT,
    issuer                  TEXT,
    crl_urls                TEXT,
    last_checked_at         TEXT
);

CREATE INDEX IF NOT EXISTS idx_attestation_certificates_serial ON attestation_certificates (serial_number);
"#;
