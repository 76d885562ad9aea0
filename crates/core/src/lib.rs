//! Core data model, Merkle kernel, persistence, and sealer for the
//! provenance ledger backend.

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod rate_limit;
pub mod types;

#[cfg(feature = "merkle")]
pub mod merkle;

#[cfg(feature = "sqlite")]
pub mod schema;
#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "ledger")]
pub mod sealer;

pub use config::Config;
pub use error::{CoreError, Result};
pub use types::ProofLevel;
