//! Error types for device enrolment (C7): stable string codes surfaced to
//! clients per §7, plus the underlying transport/storage failures.

use thiserror::Error;

/// Errors that can occur during device enrolment and token issuance.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// `public_key` is not a well-formed `ed25519:<base64>` value.
    #[error("public_key_malformed")]
    PublicKeyMalformed,

    /// DeviceCheck is enabled but the request carried no `devicecheck_token`.
    #[error("devicecheck_token_required")]
    DeviceCheckTokenRequired,

    /// `devicecheck_token` did not decode as base64.
    #[error("devicecheck_token_invalid")]
    DeviceCheckTokenInvalid,

    /// A bundle-id allow-list is configured but the request has no `bundle_id`.
    #[error("bundle_id_required")]
    BundleIdRequired,

    /// `bundle_id` is not in the configured allow-list.
    #[error("bundle_id_not_allowed")]
    BundleIdNotAllowed,

    /// The DeviceCheck client rejected the token; `reason` becomes the
    /// `devicecheck_<reason>` error code.
    #[error("devicecheck_{0}")]
    DeviceCheckRejected(String),

    /// `current_token` did not match the stored token for this device,
    /// while `force` was false (maps to 403).
    #[error("token_mismatch")]
    TokenMismatch,

    #[error("database error: {0}")]
    Store(#[from] originseal_core::CoreError),
}

impl IdentityError {
    /// The stable string code surfaced in error response bodies (§7).
    pub fn code(&self) -> String {
        match self {
            IdentityError::PublicKeyMalformed => "public_key_malformed".to_string(),
            IdentityError::DeviceCheckTokenRequired => "devicecheck_token_required".to_string(),
            IdentityError::DeviceCheckTokenInvalid => "devicecheck_token_invalid".to_string(),
            IdentityError::BundleIdRequired => "bundle_id_required".to_string(),
            IdentityError::BundleIdNotAllowed => "bundle_id_not_allowed".to_string(),
            IdentityError::DeviceCheckRejected(reason) => format!("devicecheck_{reason}"),
            IdentityError::TokenMismatch => "token_mismatch".to_string(),
            IdentityError::Store(_) => "internal_error".to_string(),
        }
    }

    /// HTTP status this error maps to at the boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            IdentityError::TokenMismatch => 403,
            IdentityError::DeviceCheckRejected(_) => 403,
            IdentityError::Store(_) => 500,
            _ => 400,
        }
    }
}

pub type Result<T> = std::result::Result<T, IdentityError>;
