//! Attestation certificate store (C3, §4.3): ingest, serial/issuer/CRL URL
//! extraction, dedupe-by-DER-hash upsert.

use std::path::Path;

use chrono::Utc;
use sha2::{Digest, Sha256};
use x509_parser::extensions::{DistributionPointName, GeneralName, ParsedExtension};
use x509_parser::prelude::{FromDer, X509Certificate};

use originseal_core::model::AttestationCertificate;
use originseal_core::store::Store;

use crate::error::{Result, VerifyError};

/// Parses `pem`, computes its DER SHA-256 as `cert_hash`, and upserts it
/// into `store` with the supplied `metadata` (merged with any existing
/// metadata on conflict, per [`Store::upsert_certificate`]).
pub fn ingest(store: &Store, pem: &str, metadata: Option<serde_json::Value>) -> Result<String> {
    let (_, parsed_pem) = x509_parser::pem::parse_x509_pem(pem.as_bytes())
        .map_err(|e| VerifyError::CertParse(e.to_string()))?;
    let der = parsed_pem.contents.clone();

    let cert_hash = hex::encode(Sha256::digest(&der));

    let (_, cert) =
        X509Certificate::from_der(&der).map_err(|e| VerifyError::CertParse(e.to_string()))?;

    let serial_number = hex::encode_upper(cert.raw_serial());
    let issuer = cert.issuer().to_string();
    let crl_urls = extract_crl_urls(&cert);

    let record = AttestationCertificate {
        cert_hash: cert_hash.clone(),
        pem: Some(pem.to_string()),
        metadata_json: metadata.map(|m| m.to_string()),
        revoked: false,
        revoked_at: None,
        revocation_reason: None,
        created_at_utc: Utc::now(),
        serial_number: Some(serial_number),
        issuer: Some(issuer),
        crl_urls: Some(serde_json::to_string(&crl_urls).unwrap_or_else(|_| "[]".to_string())),
        last_checked_at: None,
    };

    store.upsert_certificate(&record)?;
    Ok(cert_hash)
}

/// Recursively walks `dir` for files with a `.pem`/`.crt`/`.cer` suffix
/// (case-insensitive) and ingests each with `{"source": <path>}` metadata,
/// matching the original's `ingest_certificates_from_dir` subdirectory
/// coverage. Returns the number successfully ingested.
pub fn bulk_ingest_dir(store: &Store, dir: &Path) -> Result<usize> {
    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            count += bulk_ingest_dir(store, &path)?;
            continue;
        }
        if !path.is_file() {
            continue;
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        if !matches!(ext.as_deref(), Some("pem") | Some("crt") | Some("cer")) {
            continue;
        }
        let pem = match std::fs::read_to_string(&path) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read certificate file");
                continue;
            }
        };
        let metadata = serde_json::json!({ "source": path.display().to_string() });
        match ingest(store, &pem, Some(metadata)) {
            Ok(_) => count += 1,
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to ingest certificate"),
        }
    }
    Ok(count)
}

/// Extracts CRL distribution-point URIs (full names only) from the
/// certificate's `cRLDistributionPoints` extension, if present.
fn extract_crl_urls(cert: &X509Certificate) -> Vec<String> {
    let mut urls = Vec::new();
    for ext in cert.extensions() {
        if let ParsedExtension::CRLDistributionPoints(crldp) = ext.parsed_extension() {
            for dp in crldp.iter() {
                if let Some(DistributionPointName::FullName(names)) = &dp.distribution_point {
                    for name in names {
                        if let GeneralName::URI(uri) = name {
                            urls.push(uri.to_string());
                        }
                    }
                }
            }
        }
    }
    urls
}

pub fn get(store: &Store, cert_hash: &str) -> Result<AttestationCertificate> {
    store
        .get_certificate(cert_hash)?
        .ok_or_else(|| VerifyError::CertNotFound(cert_hash.to_string()))
}
