//! Error types for the cert store, CRL refresher, and verification engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("failed to parse certificate: {0}")]
    CertParse(String),

    #[error("certificate not found: {0}")]
    CertNotFound(String),

    #[error("database error: {0}")]
    Store(#[from] originseal_core::CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("media_payload_not_allowed")]
    MediaPayloadNotAllowed,

    #[error("binary_payload_not_allowed")]
    BinaryPayloadNotAllowed,

    #[error("unexpected_field_size")]
    UnexpectedFieldSize,

    #[error("manifest_summary_not_allowed")]
    ManifestSummaryNotAllowed,

    #[error("manifest_summary_contains_disallowed_fields")]
    ManifestSummaryContainsDisallowedFields,

    #[error("manifest_summary_too_large")]
    ManifestSummaryTooLarge,

    #[error("replay_detected")]
    ReplayDetected,

    #[error("ledger_not_found")]
    LedgerNotFound,
}

impl VerifyError {
    /// The stable string code surfaced in error response bodies (§7).
    pub fn code(&self) -> &'static str {
        match self {
            VerifyError::CertParse(_) => "cert_parse_error",
            VerifyError::CertNotFound(_) => "cert_not_found",
            VerifyError::Store(_) => "internal_error",
            VerifyError::Io(_) => "internal_error",
            VerifyError::MediaPayloadNotAllowed => "media_payload_not_allowed",
            VerifyError::BinaryPayloadNotAllowed => "binary_payload_not_allowed",
            VerifyError::UnexpectedFieldSize => "unexpected_field_size",
            VerifyError::ManifestSummaryNotAllowed => "manifest_summary_not_allowed",
            VerifyError::ManifestSummaryContainsDisallowedFields => {
                "manifest_summary_contains_disallowed_fields"
            }
            VerifyError::ManifestSummaryTooLarge => "manifest_summary_too_large",
            VerifyError::ReplayDetected => "replay_detected",
            VerifyError::LedgerNotFound => "ledger_not_found",
        }
    }

    /// HTTP status this error maps to at the boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            VerifyError::CertNotFound(_) | VerifyError::LedgerNotFound => 404,
            VerifyError::ReplayDetected => 429,
            VerifyError::Store(_) | VerifyError::Io(_) | VerifyError::CertParse(_) => 500,
            _ => 400,
        }
    }
}

pub type Result<T> = std::result::Result<T, VerifyError>;
