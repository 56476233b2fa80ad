//! Time sources.
//!
//! - `SystemClock`: wall clock in microseconds (saturating, never panics).
//! - `MonotonicClock`: wraps any clock and guarantees strictly increasing
//!   readings within the process (`max(now, last + 1)`). Creation tokens use it
//!   so that tokens minted here never share a timestamp prefix.
//! - `ManualClock`: test clock; frozen, or stepping by a fixed amount per read.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::model::Timestamp;

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Timestamp {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp((now.as_micros()).min(u64::MAX as u128) as u64)
    }
}

#[derive(Debug, Default)]
pub struct MonotonicClock<C: Clock = SystemClock> {
    inner: C,
    last: AtomicU64,
}

impl<C: Clock> MonotonicClock<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            last: AtomicU64::new(0),
        }
    }
}

impl<C: Clock> Clock for MonotonicClock<C> {
    fn now(&self) -> Timestamp {
        let wall = self.inner.now().as_micros();
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let next = wall.max(prev.saturating_add(1));
            match self
                .last
                .compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return Timestamp(next),
                Err(actual) => prev = actual,
            }
        }
    }
}

/// Deterministic clock for tests and demos.
#[derive(Debug)]
pub struct ManualClock {
    micros: AtomicU64,
    step: u64,
}

impl ManualClock {
    /// Always returns `at` until moved with `set`/`advance`.
    pub fn frozen(at: Timestamp) -> Self {
        Self {
            micros: AtomicU64::new(at.as_micros()),
            step: 0,
        }
    }

    /// Returns `start`, `start + step`, `start + 2*step`, ... on successive reads.
    pub fn ticking(start: Timestamp, step: u64) -> Self {
        Self {
            micros: AtomicU64::new(start.as_micros()),
            step,
        }
    }

    pub fn set(&self, at: Timestamp) {
        self.micros.store(at.as_micros(), Ordering::SeqCst);
    }

    pub fn advance(&self, micros: u64) {
        self.micros.fetch_add(micros, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.micros.fetch_add(self.step, Ordering::SeqCst))
    }
}
