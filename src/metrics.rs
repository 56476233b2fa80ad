//! Lightweight global metrics.
//!
//! Thread-safe atomic counters for:
//! - paging (pages served per strategy, rejected bookmarks)
//! - appends and sequence allocation (incl. contention retries)
//! - journal I/O (frames written, fsyncs, frames replayed, torn tails)

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::strategy::StrategyKind;

// ----- Paging -----
static PAGES_NATIVE: AtomicU64 = AtomicU64::new(0);
static PAGES_KEY_RANGE: AtomicU64 = AtomicU64::new(0);
static PAGES_UNIQUE_TOKEN: AtomicU64 = AtomicU64::new(0);
static RECORDS_SERVED: AtomicU64 = AtomicU64::new(0);
static KEY_RANGE_SUPPLEMENTS: AtomicU64 = AtomicU64::new(0);
static BOOKMARKS_REJECTED: AtomicU64 = AtomicU64::new(0);

// ----- Writes -----
static RECORDS_APPENDED: AtomicU64 = AtomicU64::new(0);
static SEQUENCES_ALLOCATED: AtomicU64 = AtomicU64::new(0);
static ALLOCATOR_RETRIES: AtomicU64 = AtomicU64::new(0);
static ALLOCATOR_EXHAUSTED: AtomicU64 = AtomicU64::new(0);

// ----- Journal -----
static JOURNAL_FRAMES_WRITTEN: AtomicU64 = AtomicU64::new(0);
static JOURNAL_BYTES_WRITTEN: AtomicU64 = AtomicU64::new(0);
static JOURNAL_FSYNCS: AtomicU64 = AtomicU64::new(0);
static JOURNAL_FRAMES_REPLAYED: AtomicU64 = AtomicU64::new(0);
static JOURNAL_TORN_TAILS: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    // Paging
    pub pages_native: u64,
    pub pages_key_range: u64,
    pub pages_unique_token: u64,
    pub records_served: u64,
    pub key_range_supplements: u64,
    pub bookmarks_rejected: u64,

    // Writes
    pub records_appended: u64,
    pub sequences_allocated: u64,
    pub allocator_retries: u64,
    pub allocator_exhausted: u64,

    // Journal
    pub journal_frames_written: u64,
    pub journal_bytes_written: u64,
    pub journal_fsyncs: u64,
    pub journal_frames_replayed: u64,
    pub journal_torn_tails: u64,
}

impl MetricsSnapshot {
    pub fn pages_total(&self) -> u64 {
        self.pages_native + self.pages_key_range + self.pages_unique_token
    }

    pub fn avg_page_len(&self) -> f64 {
        let pages = self.pages_total();
        if pages == 0 {
            0.0
        } else {
            self.records_served as f64 / pages as f64
        }
    }
}

// ----- Recorders (paging) -----
pub fn record_page_served(kind: StrategyKind, records: usize) {
    let counter = match kind {
        StrategyKind::Native => &PAGES_NATIVE,
        StrategyKind::KeyRange => &PAGES_KEY_RANGE,
        StrategyKind::UniqueToken => &PAGES_UNIQUE_TOKEN,
    };
    counter.fetch_add(1, Ordering::Relaxed);
    RECORDS_SERVED.fetch_add(records as u64, Ordering::Relaxed);
}

pub fn record_key_range_supplement() {
    KEY_RANGE_SUPPLEMENTS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_bookmark_rejected() {
    BOOKMARKS_REJECTED.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (writes) -----
pub fn record_append() {
    RECORDS_APPENDED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_sequence_allocated() {
    SEQUENCES_ALLOCATED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_allocator_retry() {
    ALLOCATOR_RETRIES.fetch_add(1, Ordering::Relaxed);
}

pub fn record_allocator_exhausted() {
    ALLOCATOR_EXHAUSTED.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (journal) -----
pub fn record_journal_frame(bytes: usize) {
    JOURNAL_FRAMES_WRITTEN.fetch_add(1, Ordering::Relaxed);
    JOURNAL_BYTES_WRITTEN.fetch_add(bytes as u64, Ordering::Relaxed);
}

pub fn record_journal_fsync() {
    JOURNAL_FSYNCS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_journal_replayed(frames: u64) {
    JOURNAL_FRAMES_REPLAYED.fetch_add(frames, Ordering::Relaxed);
}

pub fn record_journal_torn_tail() {
    JOURNAL_TORN_TAILS.fetch_add(1, Ordering::Relaxed);
}

// ----- Snapshot -----
pub fn metrics_snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        pages_native: PAGES_NATIVE.load(Ordering::Relaxed),
        pages_key_range: PAGES_KEY_RANGE.load(Ordering::Relaxed),
        pages_unique_token: PAGES_UNIQUE_TOKEN.load(Ordering::Relaxed),
        records_served: RECORDS_SERVED.load(Ordering::Relaxed),
        key_range_supplements: KEY_RANGE_SUPPLEMENTS.load(Ordering::Relaxed),
        bookmarks_rejected: BOOKMARKS_REJECTED.load(Ordering::Relaxed),

        records_appended: RECORDS_APPENDED.load(Ordering::Relaxed),
        sequences_allocated: SEQUENCES_ALLOCATED.load(Ordering::Relaxed),
        allocator_retries: ALLOCATOR_RETRIES.load(Ordering::Relaxed),
        allocator_exhausted: ALLOCATOR_EXHAUSTED.load(Ordering::Relaxed),

        journal_frames_written: JOURNAL_FRAMES_WRITTEN.load(Ordering::Relaxed),
        journal_bytes_written: JOURNAL_BYTES_WRITTEN.load(Ordering::Relaxed),
        journal_fsyncs: JOURNAL_FSYNCS.load(Ordering::Relaxed),
        journal_frames_replayed: JOURNAL_FRAMES_REPLAYED.load(Ordering::Relaxed),
        journal_torn_tails: JOURNAL_TORN_TAILS.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Counters are process-global and other tests run concurrently, so only
    // monotonic growth is asserted here.
    #[test]
    fn page_counters_grow() {
        let before = metrics_snapshot();
        record_page_served(StrategyKind::UniqueToken, 3);
        record_bookmark_rejected();
        let after = metrics_snapshot();
        assert!(after.pages_unique_token >= before.pages_unique_token + 1);
        assert!(after.records_served >= before.records_served + 3);
        assert!(after.bookmarks_rejected >= before.bookmarks_rejected + 1);
    }

    #[test]
    fn avg_page_len_handles_zero() {
        assert_eq!(MetricsSnapshot::default().avg_page_len(), 0.0);
        let s = MetricsSnapshot {
            pages_key_range: 2,
            records_served: 9,
            ..Default::default()
        };
        assert_eq!(s.avg_page_len(), 4.5);
    }
}
