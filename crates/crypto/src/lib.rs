//! Cryptographic primitives for the provenance ledger backend: Ed25519
//! device-key verification, HMAC-SHA256 verifier request signing, and
//! bearer token generation.
//!
//! SHA-256 Merkle hashing lives in `originseal_core::merkle`; this crate
//! covers the signature and authentication primitives layered on top of it.

#![warn(clippy::all)]

pub mod ed25519;
pub mod error;
pub mod hmac_auth;
pub mod token;

pub use error::{CryptoError, Result};
