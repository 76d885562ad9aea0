//! Common types shared across the ledger, identity, and verification crates.

use serde::{Deserialize, Serialize};

/// Verdict richness for a verification result.
///
/// `basic` means the ledger entry matched by hash alone; `attested` adds a
/// valid, unrevoked attestation certificate; `rooted` additionally means the
/// entry has been folded into a published Merkle root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofLevel {
    /// Ledger match only.
    Basic,
    /// Ledger match plus a valid, unrevoked attestation certificate.
    Attested,
    /// Ledger match, valid attestation, and a published Merkle root.
    Rooted,
}

impl ProofLevel {
    /// Parses a proof level string, clamping anything unrecognized to
    /// [`ProofLevel::Basic`] per the verification engine's default.
    pub fn clamp(raw: &str) -> Self {
        match raw {
            "attested" => ProofLevel::Attested,
            "rooted" => ProofLevel::Rooted,
            "basic" => ProofLevel::Basic,
            _ => ProofLevel::Basic,
        }
    }

    /// The wire string for this level.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProofLevel::Basic => "basic",
            ProofLevel::Attested => "attested",
            ProofLevel::Rooted => "rooted",
        }
    }
}

impl Default for ProofLevel {
    fn default() -> Self {
        ProofLevel::Basic
    }
}

/// Current instant, expressed as a UTC `DateTime`.
///
/// Centralised so callers that need to honor a trusted-time offset (rather
/// than the bare system clock) have one place to substitute it.
pub fn now_utc() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}
