//! SQLite-backed persistence for the four entities in [`crate::model`].
//!
//! Mirrors the reference event ledger's connection discipline: WAL journal
//! mode plus `synchronous=NORMAL` for concurrent readers during a writer's
//! transaction, one `Store` wrapping one `rusqlite::Connection`, and each
//! mutating operation that touches more than one row wrapped in an explicit
//! transaction.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{CoreError, Result};
use crate::model::{AttestationCertificate, CaptureRecord, DeviceToken, LedgerEntry};
use crate::schema::SCHEMA_SQL;

/// Owns the single SQLite connection backing the ledger database.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Opens (creating if absent) the SQLite database at `path`, enables WAL
    /// mode, and applies the schema. Accepts either a bare filesystem path or
    /// a `sqlite://` URL as found in `DATABASE_URL`; the scheme is stripped
    /// before handing the path to `rusqlite`.
    pub fn open(path: &str) -> Result<Self> {
        let path = path.strip_prefix("sqlite://").unwrap_or(path);
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Store { conn })
    }

    /// Opens a private in-memory database, used by unit and integration
    /// tests so each test gets an isolated store.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Store { conn })
    }

    /// Direct access to the underlying connection for callers (the sealer)
    /// that need to span a transaction across multiple store operations.
    pub fn connection(&mut self) -> &mut Connection {
        &mut self.conn
    }

    // ---- device_tokens -------------------------------------------------

    pub fn get_device_token(&self, device_id: &str) -> Result<Option<DeviceToken>> {
        self.conn
            .query_row(
                "SELECT device_id, token, public_key, platform, app_version, issued_at, \
                 expires_at, force_renewal_required FROM device_tokens WHERE device_id = ?1",
                params![device_id],
                row_to_device_token,
            )
            .optional()
            .map_err(CoreError::from)
    }

    /// Inserts a fresh token row, or replaces the existing row for this
    /// `device_id` entirely (issuance and rotation share this path; no field
    /// is preserved across rotation).
    pub fn put_device_token(&self, tok: &DeviceToken) -> Result<()> {
        self.conn.execute(
            "INSERT INTO device_tokens (device_id, token, public_key, platform, app_version, \
             issued_at, expires_at, force_renewal_required) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
             ON CONFLICT(device_id) DO UPDATE SET \
                token = excluded.token, public_key = excluded.public_key, \
                platform = excluded.platform, app_version = excluded.app_version, \
                issued_at = excluded.issued_at, expires_at = excluded.expires_at, \
                force_renewal_required = excluded.force_renewal_required",
            params![
                tok.device_id,
                tok.token,
                tok.public_key,
                tok.platform,
                tok.app_version,
                tok.issued_at.to_rfc3339(),
                tok.expires_at.to_rfc3339(),
                tok.force_renewal_required as i64,
            ],
        )?;
        Ok(())
    }

    // ---- capture_records -------------------------------------------------

    pub fn insert_capture_record(&self, rec: &CaptureRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO capture_records (record_id, shortcode, verify_url, asset_hash, \
             capture_time_utc, device_id, device_pubkey, geo_lat, geo_lon, geo_accuracy_m, \
             signature, created_at_utc, merkle_batch_id, merkle_root_hash, merkle_sealed_at_utc) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                rec.record_id,
                rec.shortcode,
                rec.verify_url,
                rec.asset_hash,
                rec.capture_time_utc.map(|t| t.to_rfc3339()),
                rec.device_id,
                rec.device_pubkey,
                rec.geo_lat,
                rec.geo_lon,
                rec.geo_accuracy_m,
                rec.signature,
                rec.created_at_utc.to_rfc3339(),
                rec.merkle_batch_id,
                rec.merkle_root_hash,
                rec.merkle_sealed_at_utc.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    /// Rows with `merkle_batch_id IS NULL AND asset_hash IS NOT NULL`,
    /// ordered by `created_at_utc ASC, record_id ASC` (the tie-break chosen
    /// for the sealer, §4.9).
    pub fn select_unsealed_records(&self) -> Result<Vec<CaptureRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT record_id, shortcode, verify_url, asset_hash, capture_time_utc, device_id, \
             device_pubkey, geo_lat, geo_lon, geo_accuracy_m, signature, created_at_utc, \
             merkle_batch_id, merkle_root_hash, merkle_sealed_at_utc FROM capture_records \
             WHERE merkle_batch_id IS NULL AND asset_hash IS NOT NULL \
             ORDER BY created_at_utc ASC, record_id ASC",
        )?;
        let rows = stmt
            .query_map([], row_to_capture_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Atomically marks a set of records sealed into the same batch. Called
    /// within the sealer's single spanning transaction.
    pub fn mark_records_sealed(
        &mut self,
        record_ids: &[String],
        batch_id: &str,
        root_hash: &str,
        sealed_at: DateTime<Utc>,
    ) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "UPDATE capture_records SET merkle_batch_id = ?1, merkle_root_hash = ?2, \
                 merkle_sealed_at_utc = ?3 WHERE record_id = ?4 AND merkle_batch_id IS NULL",
            )?;
            for id in record_ids {
                let changed = stmt.execute(params![batch_id, root_hash, sealed_at.to_rfc3339(), id])?;
                if changed != 1 {
                    return Err(CoreError::InvariantViolation(format!(
                        "record {id} was sealed concurrently"
                    )));
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    // ---- ledger_entries -------------------------------------------------

    pub fn insert_ledger_entry(&self, entry: &LedgerEntry) -> Result<()> {
        self.conn.execute(
            "INSERT INTO ledger_entries (entry_id, content_hash, manifest_hash, \
             device_signature_hash, attestation_cert_hash, timestamp_utc, proof_level, \
             merkle_root, merkle_proof, entry_hash, created_at_utc, sourced_from) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                entry.entry_id,
                entry.content_hash,
                entry.manifest_hash,
                entry.device_signature_hash,
                entry.attestation_cert_hash,
                entry.timestamp_utc.to_rfc3339(),
                entry.proof_level,
                entry.merkle_root,
                entry.merkle_proof,
                entry.entry_hash,
                entry.created_at_utc.to_rfc3339(),
                entry.sourced_from,
            ],
        )?;
        Ok(())
    }

    pub fn find_ledger_entry_by_content_hash(&self, hash: &str) -> Result<Option<LedgerEntry>> {
        self.query_ledger_entry_by("content_hash", hash)
    }

    pub fn find_ledger_entry_by_manifest_hash(&self, hash: &str) -> Result<Option<LedgerEntry>> {
        self.query_ledger_entry_by("manifest_hash", hash)
    }

    pub fn find_ledger_entry_by_signature_hash(&self, hash: &str) -> Result<Option<LedgerEntry>> {
        self.query_ledger_entry_by("device_signature_hash", hash)
    }

    fn query_ledger_entry_by(&self, column: &str, value: &str) -> Result<Option<LedgerEntry>> {
        let sql = format!(
            "SELECT entry_id, content_hash, manifest_hash, device_signature_hash, \
             attestation_cert_hash, timestamp_utc, proof_level, merkle_root, merkle_proof, \
             entry_hash, created_at_utc, sourced_from FROM ledger_entries WHERE {column} = ?1 \
             ORDER BY created_at_utc ASC LIMIT 1"
        );
        self.conn
            .query_row(&sql, params![value], row_to_ledger_entry)
            .optional()
            .map_err(CoreError::from)
    }

    // ---- attestation_certificates ---------------------------------------

    pub fn get_certificate(&self, cert_hash: &str) -> Result<Option<AttestationCertificate>> {
        self.conn
            .query_row(
                "SELECT cert_hash, pem, metadata_json, revoked, revoked_at, revocation_reason, \
                 created_at_utc, serial_number, issuer, crl_urls, last_checked_at \
                 FROM attestation_certificates WHERE cert_hash = ?1",
                params![cert_hash],
                row_to_certificate,
            )
            .optional()
            .map_err(CoreError::from)
    }

    /// Upserts a certificate by `cert_hash`: on conflict, `pem`/`metadata_json`
    /// (when supplied)/`serial_number`/`issuer`/`crl_urls` (when non-empty)
    /// are updated in place; `revoked`, `revoked_at`, and `created_at_utc`
    /// are preserved, per §4.3.
    pub fn upsert_certificate(&self, cert: &AttestationCertificate) -> Result<()> {
        let existing = self.get_certificate(&cert.cert_hash)?;
        match existing {
            None => {
                self.conn.execute(
                    "INSERT INTO attestation_certificates (cert_hash, pem, metadata_json, \
                     revoked, revoked_at, revocation_reason, created_at_utc, serial_number, \
                     issuer, crl_urls, last_checked_at) \
                     VALUES (?1, ?2, ?3, 0, NULL, NULL, ?4, ?5, ?6, ?7, NULL)",
                    params![
                        cert.cert_hash,
                        cert.pem,
                        cert.metadata_json,
                        cert.created_at_utc.to_rfc3339(),
                        cert.serial_number,
                        cert.issuer,
                        cert.crl_urls,
                    ],
                )?;
            }
            Some(prev) => {
                let metadata_json = cert.metadata_json.clone().or(prev.metadata_json);
                let crl_urls = match &cert.crl_urls {
                    Some(v) if !v.is_empty() && v != "[]" => Some(v.clone()),
                    _ => prev.crl_urls,
                };
                self.conn.execute(
                    "UPDATE attestation_certificates SET pem = ?1, metadata_json = ?2, \
                     serial_number = ?3, issuer = ?4, crl_urls = ?5 WHERE cert_hash = ?6",
                    params![
                        cert.pem,
                        metadata_json,
                        cert.serial_number,
                        cert.issuer,
                        crl_urls,
                        cert.cert_hash,
                    ],
                )?;
            }
        }
        Ok(())
    }

    /// All certificates with at least one stored CRL URL, for the CRL
    /// refresher's per-cert URL union.
    pub fn certificates_with_crl_urls(&self) -> Result<Vec<AttestationCertificate>> {
        let mut stmt = self.conn.prepare(
            "SELECT cert_hash, pem, metadata_json, revoked, revoked_at, revocation_reason, \
             created_at_utc, serial_number, issuer, crl_urls, last_checked_at \
             FROM attestation_certificates WHERE crl_urls IS NOT NULL AND crl_urls != '' AND crl_urls != '[]'",
        )?;
        let rows = stmt
            .query_map([], row_to_certificate)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// All non-revoked certificates, for matching revoked serials during a
    /// CRL refresh pass.
    pub fn unrevoked_certificates(&self) -> Result<Vec<AttestationCertificate>> {
        let mut stmt = self.conn.prepare(
            "SELECT cert_hash, pem, metadata_json, revoked, revoked_at, revocation_reason, \
             created_at_utc, serial_number, issuer, crl_urls, last_checked_at \
             FROM attestation_certificates WHERE revoked = 0 AND serial_number IS NOT NULL",
        )?;
        let rows = stmt
            .query_map([], row_to_certificate)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Marks a single certificate revoked. Monotonic: never called on an
    /// already-revoked cert by the refresher (it only bumps `last_checked_at`
    /// in that case, via [`Store::touch_certificate_checked`]).
    pub fn revoke_certificate(
        &self,
        cert_hash: &str,
        reason: &str,
        revoked_at: DateTime<Utc>,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE attestation_certificates SET revoked = 1, revoked_at = ?1, \
             revocation_reason = ?2, last_checked_at = ?1 WHERE cert_hash = ?3",
            params![revoked_at.to_rfc3339(), reason, cert_hash],
        )?;
        Ok(())
    }

    pub fn touch_certificate_checked(&self, cert_hash: &str, checked_at: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "UPDATE attestation_certificates SET last_checked_at = ?1 WHERE cert_hash = ?2",
            params![checked_at.to_rfc3339(), cert_hash],
        )?;
        Ok(())
    }

    /// A trivial liveness probe for `GET /health`.
    pub fn ping(&self) -> Result<()> {
        self.conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }
}

fn parse_dt(s: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
}

fn parse_opt_dt(s: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    s.map(parse_dt).transpose()
}

fn row_to_device_token(row: &rusqlite::Row) -> rusqlite::Result<DeviceToken> {
    Ok(DeviceToken {
        device_id: row.get(0)?,
        token: row.get(1)?,
        public_key: row.get(2)?,
        platform: row.get(3)?,
        app_version: row.get(4)?,
        issued_at: parse_dt(row.get(5)?)?,
        expires_at: parse_dt(row.get(6)?)?,
        force_renewal_required: row.get::<_, i64>(7)? != 0,
    })
}

fn row_to_capture_record(row: &rusqlite::Row) -> rusqlite::Result<CaptureRecord> {
    Ok(CaptureRecord {
        record_id: row.get(0)?,
        shortcode: row.get(1)?,
        verify_url: row.get(2)?,
        asset_hash: row.get(3)?,
        capture_time_utc: parse_opt_dt(row.get(4)?)?,
        device_id: row.get(5)?,
        device_pubkey: row.get(6)?,
        geo_lat: row.get(7)?,
        geo_lon: row.get(8)?,
        geo_accuracy_m: row.get(9)?,
        signature: row.get(10)?,
        created_at_utc: parse_dt(row.get(11)?)?,
        merkle_batch_id: row.get(12)?,
        merkle_root_hash: row.get(13)?,
        merkle_sealed_at_utc: parse_opt_dt(row.get(14)?)?,
    })
}

fn row_to_ledger_entry(row: &rusqlite::Row) -> rusqlite::Result<LedgerEntry> {
    Ok(LedgerEntry {
        entry_id: row.get(0)?,
        content_hash: row.get(1)?,
        manifest_hash: row.get(2)?,
        device_signature_hash: row.get(3)?,
        attestation_cert_hash: row.get(4)?,
        timestamp_utc: parse_dt(row.get(5)?)?,
        proof_level: row.get(6)?,
        merkle_root: row.get(7)?,
        merkle_proof: row.get(8)?,
        entry_hash: row.get(9)?,
        created_at_utc: parse_dt(row.get(10)?)?,
        sourced_from: row.get(11)?,
    })
}

fn row_to_certificate(row: &rusqlite::Row) -> rusqlite::Result<AttestationCertificate> {
    Ok(AttestationCertificate {
        cert_hash: row.get(0)?,
        pem: row.get(1)?,
        metadata_json: row.get(2)?,
        revoked: row.get::<_, i64>(3)? != 0,
        revoked_at: parse_opt_dt(row.get(4)?)?,
        revocation_reason: row.get(5)?,
        created_at_utc: parse_dt(row.get(6)?)?,
        serial_number: row.get(7)?,
        issuer: row.get(8)?,
        crl_urls: row.get(9)?,
        last_checked_at: parse_opt_dt(row.get(10)?)?,
    })
}
