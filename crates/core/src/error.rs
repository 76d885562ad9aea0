//! Core error types shared across the ledger, Merkle kernel, and config layers.

use thiserror::Error;

/// Core error type for the provenance ledger backend.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A Merkle leaf or input string failed the `sha256:<64 hex>` format check.
    #[error("invalid sha256 hash format: {0}")]
    InvalidHashFormat(String),

    /// `build_merkle_tree`/`compute_merkle_root` was called with an empty leaf set.
    #[error("merkle computation error: empty leaf set")]
    MerkleComputationError,

    /// A SQLite-backed operation failed.
    #[cfg(feature = "sqlite")]
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A row was expected to exist but did not.
    #[error("not found: {0}")]
    NotFound(String),

    /// A stored invariant was violated (e.g. sealing fields partially set).
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Writing or reading a ledger artifact on disk failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An artifact failed to (de)serialize as JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Shelling out to `git` for auto-commit/push failed.
    #[error("git error: {0}")]
    Git(String),

    /// A required configuration value was missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Generic catch-all for conditions with no dedicated variant.
    #[error("core error: {0}")]
    Generic(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
