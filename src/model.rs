//! Core data types: records, contributors, timestamps and pages.
//!
//! - `Timestamp` is microseconds since the Unix epoch. The key-range codec
//!   carries it as floating-point seconds with six decimals, so micros are the
//!   finest resolution that survives a bookmark round-trip.
//! - `Record` is immutable once appended; `creation_token` is only present for
//!   records written under the unique-token strategy.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Microseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub const MICROS_PER_SEC: u64 = 1_000_000;

    #[inline]
    pub fn from_micros(micros: u64) -> Self {
        Timestamp(micros)
    }

    #[inline]
    pub fn as_micros(self) -> u64 {
        self.0
    }

    /// Seconds as a float (lossy for very large values).
    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / Self::MICROS_PER_SEC as f64
    }

    /// Inverse of `as_secs_f64`, rounding to the nearest microsecond.
    /// Returns None for negative, non-finite or out-of-range inputs.
    pub fn from_secs_f64(secs: f64) -> Option<Self> {
        if !secs.is_finite() || secs < 0.0 {
            return None;
        }
        let micros = (secs * Self::MICROS_PER_SEC as f64).round();
        if micros > u64::MAX as f64 {
            return None;
        }
        Some(Timestamp(micros as u64))
    }

    /// Parse a real number of seconds. Plain decimals (`123.456789`) are
    /// converted with integer arithmetic so they round-trip exactly; any
    /// other float syntax goes through `f64`.
    pub fn parse_secs(s: &str) -> Option<Self> {
        let s = s.trim();
        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };
        let plain = !int_part.is_empty()
            && int_part.bytes().all(|b| b.is_ascii_digit())
            && frac_part.bytes().all(|b| b.is_ascii_digit());
        if !plain {
            return s.parse::<f64>().ok().and_then(Self::from_secs_f64);
        }

        let secs: u64 = int_part.parse().ok()?;
        let mut micros: u64 = 0;
        for (i, b) in frac_part.bytes().take(6).enumerate() {
            micros += u64::from(b - b'0') * 10u64.pow(5 - i as u32);
        }
        // round half up on the seventh digit
        if frac_part.len() > 6 && frac_part.as_bytes()[6] >= b'5' {
            micros += 1;
        }
        secs.checked_mul(Self::MICROS_PER_SEC)?
            .checked_add(micros)
            .map(Timestamp)
    }
}

impl fmt::Display for Timestamp {
    /// `<secs>.<micros:06>`, the same shape the key-range codec writes.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:06}",
            self.0 / Self::MICROS_PER_SEC,
            self.0 % Self::MICROS_PER_SEC
        )
    }
}

/// A stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Store-assigned identity: 16 lowercase hex digits.
    pub identity: String,
    pub text: String,
    pub created_at: Timestamp,
    /// Set once at first persistence for unique-token paging; never recomputed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_token: Option<String>,
}

/// Input to `RecordStore::append`. Identity is assigned by the store;
/// `created_at` too, unless the caller pins it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewRecord {
    pub text: String,
    pub creation_token: Option<String>,
    pub created_at: Option<Timestamp>,
}

impl NewRecord {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            creation_token: None,
            created_at: None,
        }
    }

    /// Pin `created_at` instead of taking it from the store clock.
    pub fn with_created_at(mut self, created_at: Timestamp) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn with_creation_token(mut self, token: impl Into<String>) -> Self {
        self.creation_token = Some(token.into());
        self
    }
}

/// Per-writer sequence state used by the allocator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    pub identity: String,
    pub sequence: u64,
}

impl Contributor {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            sequence: 0,
        }
    }
}

/// One page of results plus the bookmark for the next one (None on the last page).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Page {
    pub records: Vec<Record>,
    pub next_bookmark: Option<String>,
}

impl Page {
    pub fn is_last(&self) -> bool {
        self.next_bookmark.is_none()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
