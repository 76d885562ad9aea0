//! CRL refresher (C4, §4.4): fetches configured + per-cert CRL URLs, unions
//! revoked serials, and transitions matching certs to `revoked=true`.

use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use x509_parser::revocation_list::CertificateRevocationList;

use originseal_core::store::Store;

use crate::error::Result;

/// Outcome of one CRL refresh pass.
#[derive(Debug, Clone, Serialize)]
pub struct CrlRefreshReport {
    pub checked: usize,
    pub revoked: usize,
}

/// Runs one refresh pass. `configured_urls` come from settings; each
/// certificate's own stored CRL URL list is unioned in. The pass is
/// transactional: revocation state changes are only visible once all
/// fetched CRLs have been processed.
pub async fn refresh(
    store: &Store,
    configured_urls: &[String],
    http: &reqwest::Client,
    timeout: Duration,
) -> Result<CrlRefreshReport> {
    let mut urls: HashSet<String> = configured_urls.iter().cloned().collect();
    for cert in store.certificates_with_crl_urls()? {
        if let Some(raw) = &cert.crl_urls {
            if let Ok(list) = serde_json::from_str::<Vec<String>>(raw) {
                urls.extend(list);
            }
        }
    }

    let mut revoked_serials: HashSet<String> = HashSet::new();
    let mut checked = 0usize;

    for url in &urls {
        match fetch_crl(http, url, timeout).await {
            Ok(serials) => {
                checked += 1;
                revoked_serials.extend(serials);
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "CRL fetch failed, skipping");
            }
        }
    }

    let now = Utc::now();
    let mut newly_revoked = 0usize;
    for cert in store.unrevoked_certificates()? {
        let Some(serial) = &cert.serial_number else { continue };
        if revoked_serials.contains(serial) {
            store.revoke_certificate(&cert.cert_hash, "crl_revoked", now)?;
            newly_revoked += 1;
        }
    }

    Ok(CrlRefreshReport {
        checked,
        revoked: newly_revoked,
    })
}

/// Fetches one CRL over HTTP and returns its revoked serials as uppercase
/// hex. The body is tried first as DER, then as PEM.
async fn fetch_crl(http: &reqwest::Client, url: &str, timeout: Duration) -> Result<Vec<String>> {
    let response = http
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| crate::error::VerifyError::CertParse(e.to_string()))?;
    let body = response
        .bytes()
        .await
        .map_err(|e| crate::error::VerifyError::CertParse(e.to_string()))?;

    if let Ok((_, crl)) = CertificateRevocationList::from_der(&body) {
        return Ok(extract_revoked_serials(&crl));
    }

    if let Ok((_, pem)) = x509_parser::pem::parse_x509_pem(&body) {
        if let Ok((_, crl)) = CertificateRevocationList::from_der(&pem.contents) {
            return Ok(extract_revoked_serials(&crl));
        }
    }

    Err(crate::error::VerifyError::CertParse(format!(
        "CRL body at {url} parsed as neither DER nor PEM"
    )))
}

fn extract_revoked_serials(crl: &CertificateRevocationList) -> Vec<String> {
    crl.iter_revoked_certificates()
        .map(|entry| hex::encode_upper(entry.raw_serial()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn refresh_with_no_urls_checks_nothing_and_revokes_nothing() {
        let store = Store::open_in_memory().unwrap();
        let http = reqwest::Client::new();
        let report = refresh(&store, &[], &http, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(report.checked, 0);
        assert_eq!(report.revoked, 0);
    }
}
