//! Stable hashing helpers.
//!
//! Two unrelated uses:
//! - shard selection for contributor records (xxhash64, seed 0). Must stay
//!   stable across toolchains, so std's DefaultHasher is not used.
//! - the privacy digest inside creation tokens (SHA-256, hex). It hides the
//!   raw contributor identity; it is not a security control and nothing relies
//!   on its collision resistance.

use sha2::{Digest, Sha256};
use std::hash::Hasher;
use twox_hash::XxHash64;

/// 64-bit xxhash (seed 0) of arbitrary bytes.
#[inline]
pub fn hash64(bytes: &[u8]) -> u64 {
    let mut h = XxHash64::with_seed(0);
    h.write(bytes);
    h.finish()
}

/// Shard index for a contributor identity.
#[inline]
pub fn shard_of(identity: &str, shards: usize) -> usize {
    debug_assert!(shards > 0, "shards must be > 0");
    (hash64(identity.as_bytes()) % (shards as u64)) as usize
}

/// Lowercase hex SHA-256 of `"<identity>|<sequence>"`.
pub fn privacy_digest(identity: &str, sequence: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(identity.as_bytes());
    hasher.update(b"|");
    hasher.update(sequence.to_string().as_bytes());
    to_hex(&hasher.finalize())
}

pub fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{:02x}", b);
    }
    s
}
