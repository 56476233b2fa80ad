//! Per-contributor sequence allocation and creation tokens.
//!
//! `next_sequence` is an optimistic read-increment-commit loop against a
//! `ContributorLedger`. The ledger persists the new value before reporting a
//! successful compare-and-set, so a returned sequence is always durable. A
//! lost compare-and-set is retried up to `max_retries` times.
//!
//! Token layout: `{micros:020}.{sha256_hex("{identity}|{sequence}")}`.
//! The zero-padded prefix makes lexicographic order equal numeric order.

use log::{debug, trace, warn};
use std::sync::Arc;

use crate::clock::Clock;
use crate::error::{PagingError, PagingResult};
use crate::hash::privacy_digest;
use crate::metrics::{record_allocator_exhausted, record_allocator_retry, record_sequence_allocated};
use crate::model::Contributor;
use crate::store::ContributorLedger;

pub const TOKEN_DELIMITER: char = '.';
const TOKEN_PREFIX_LEN: usize = 20;
const TOKEN_DIGEST_LEN: usize = 64;

/// True if `s` has the shape of a creation token.
pub fn is_creation_token(s: &str) -> bool {
    let Some((prefix, digest)) = s.split_once(TOKEN_DELIMITER) else {
        return false;
    };
    prefix.len() == TOKEN_PREFIX_LEN
        && prefix.bytes().all(|b| b.is_ascii_digit())
        && digest.len() == TOKEN_DIGEST_LEN
        && digest
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

pub struct ShardedSequenceAllocator {
    clock: Arc<dyn Clock>,
    max_retries: u32,
}

impl ShardedSequenceAllocator {
    pub fn new(clock: Arc<dyn Clock>, max_retries: u32) -> Self {
        Self { clock, max_retries }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Next sequence for `identity`: 1 for a new contributor, then 2, 3, ...
    pub fn next_sequence(
        &self,
        ledger: &dyn ContributorLedger,
        identity: &str,
    ) -> PagingResult<u64> {
        if identity.is_empty() {
            return Err(PagingError::invalid_argument("contributor identity is empty"));
        }
        let mut attempt = 0u32;
        loop {
            let current = ledger
                .load_contributor(identity)
                .map_err(PagingError::store)?
                .unwrap_or_else(|| Contributor::new(identity));
            let next = Contributor {
                identity: identity.to_string(),
                sequence: current.sequence + 1,
            };
            if ledger
                .commit_contributor(&next, current.sequence)
                .map_err(PagingError::store)?
            {
                record_sequence_allocated();
                trace!("allocator: {} -> {}", identity, next.sequence);
                return Ok(next.sequence);
            }

            if attempt >= self.max_retries {
                record_allocator_exhausted();
                warn!(
                    "allocator: gave up on contributor {} after {} retries",
                    identity, attempt
                );
                return Err(PagingError::StoreUnavailable {
                    message: format!(
                        "sequence allocation for {} contended after {} retries",
                        identity, attempt
                    ),
                });
            }
            attempt += 1;
            record_allocator_retry();
            debug!("allocator: contention on {}, retry {}", identity, attempt);
            std::thread::yield_now();
        }
    }

    /// Allocate the next sequence for `identity` and build its creation token.
    pub fn derive_creation_token(
        &self,
        ledger: &dyn ContributorLedger,
        identity: &str,
    ) -> PagingResult<String> {
        let sequence = self.next_sequence(ledger, identity)?;
        let now = self.clock.now();
        Ok(format!(
            "{:020}{}{}",
            now.as_micros(),
            TOKEN_DELIMITER,
            privacy_digest(identity, sequence)
        ))
    }
}
