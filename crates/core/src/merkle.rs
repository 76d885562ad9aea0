//! Deterministic SHA-256 Merkle tree construction over `sha256:<hex>` leaves.
//!
//! Leaves and the root are always carried in their `sha256:`-prefixed form at
//! the API boundary; internally the kernel strips the prefix before hashing
//! so that parent hashes are computed over raw lowercase hex, matching the
//! reference ledger's pairing rule: no separator, no domain tag, just the
//! UTF-8 concatenation of the two child hex strings.

use sha2::{Digest, Sha256};

use crate::error::{CoreError, Result};

const SHA256_PREFIX: &str = "sha256:";
const SHA256_HEX_LEN: usize = 64;

/// Strips the `sha256:` prefix from a leaf/root string and validates that the
/// remainder is exactly 64 lowercase hex characters.
///
/// Uppercase input is accepted and lowercased, mirroring the reference
/// implementation's `_strip_prefix`.
pub fn strip_prefix(value: &str) -> Result<String> {
    let rest = value
        .strip_prefix(SHA256_PREFIX)
        .ok_or_else(|| CoreError::InvalidHashFormat(value.to_string()))?;
    if rest.len() != SHA256_HEX_LEN || !rest.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CoreError::InvalidHashFormat(value.to_string()));
    }
    Ok(rest.to_ascii_lowercase())
}

/// Re-applies the `sha256:` prefix to a bare hex digest.
pub fn with_prefix(hex_digest: &str) -> String {
    format!("{SHA256_PREFIX}{hex_digest}")
}

fn hash_pair(left: &str, right: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    hex::encode(hasher.finalize())
}

/// Computes only the Merkle root over an ordered, non-empty sequence of
/// `sha256:<hex>` leaves. Equivalent to `build_merkle_tree(leaves)?.0`.
pub fn compute_merkle_root(leaves: &[String]) -> Result<String> {
    Ok(build_merkle_tree(leaves)?.0)
}

/// Builds the full Merkle tree over an ordered, non-empty sequence of
/// `sha256:<hex>` leaves.
///
/// Returns `(root, levels)` where `levels[0]` is the stripped (unprefixed)
/// leaf hex values in input order, and each subsequent level is the parent
/// row, ending with a single-element final level. Odd-length levels
/// duplicate their last element before pairing, per the reference rule.
pub fn build_merkle_tree(leaves: &[String]) -> Result<(String, Vec<Vec<String>>)> {
    if leaves.is_empty() {
        return Err(CoreError::MerkleComputationError);
    }

    let mut level: Vec<String> = leaves.iter().map(|l| strip_prefix(l)).collect::<Result<_>>()?;
    let mut levels: Vec<Vec<String>> = vec![level.clone()];

    while level.len() > 1 {
        if level.len() % 2 == 1 {
            let last = level.last().expect("non-empty level").clone();
            level.push(last);
        }
        let next: Vec<String> = level
            .chunks_exact(2)
            .map(|pair| hash_pair(&pair[0], &pair[1]))
            .collect();
        levels.push(next.clone());
        level = next;
    }

    let root = with_prefix(&level[0]);
    Ok((root, levels))
}
