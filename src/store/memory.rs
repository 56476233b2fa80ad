//! store/memory: process-local RecordStore.
//!
//! Indexes live behind one RwLock; contributors live in `ContributorShards`.
//! `created_at` comes from the store's clock (system clock by default) unless
//! the draft pins one; tests can also force equal timestamps with
//! `ManualClock::frozen`.

use anyhow::{anyhow, Result};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::clock::{Clock, SystemClock};
use crate::config::DEFAULT_CONTRIBUTOR_SHARDS;
use crate::metrics::record_append;
use crate::model::{Contributor, NewRecord, Record, Timestamp};

use super::index::{fresh_identity, ContributorShards, IndexKey, RecordIndex};
use super::{ContributorLedger, NativeBatch, NativeScan, RecordStore, ScanPosition};

pub struct MemoryStore {
    index: RwLock<RecordIndex>,
    contributors: ContributorShards,
    clock: Arc<dyn Clock>,
    native: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Store whose `created_at` values come from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::with_shards(clock, DEFAULT_CONTRIBUTOR_SHARDS)
    }

    pub fn with_shards(clock: Arc<dyn Clock>, shards: usize) -> Self {
        Self {
            index: RwLock::new(RecordIndex::new()),
            contributors: ContributorShards::new(shards),
            clock,
            native: true,
        }
    }

    /// Same store, but `native_scan()` reports the capability as missing.
    pub fn without_native_scan(mut self) -> Self {
        self.native = false;
        self
    }

    pub fn contributor_count(&self) -> usize {
        self.contributors.len()
    }

    pub fn shard_count(&self) -> usize {
        self.contributors.shard_count()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, RecordIndex>> {
        self.index
            .read()
            .map_err(|_| anyhow!("record index lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, RecordIndex>> {
        self.index
            .write()
            .map_err(|_| anyhow!("record index lock poisoned"))
    }

    /// Assign identity and `created_at` without inserting. Callers that
    /// persist between `prepare` and `insert` must serialize appends themselves.
    pub(crate) fn prepare(&self, draft: NewRecord) -> Result<Record> {
        let idx = self.read()?;
        Self::prepare_in(&idx, draft, self.clock.now())
    }

    fn prepare_in(idx: &RecordIndex, draft: NewRecord, now: Timestamp) -> Result<Record> {
        if let Some(token) = &draft.creation_token {
            if idx.contains_token(token) {
                return Err(anyhow!("duplicate creation token {}", token));
            }
        }
        Ok(Record {
            identity: fresh_identity(idx),
            text: draft.text,
            created_at: draft.created_at.unwrap_or(now),
            creation_token: draft.creation_token,
        })
    }

    pub(crate) fn insert(&self, record: Record) -> Result<()> {
        self.write()?.insert(record)
    }

    pub(crate) fn contributors(&self) -> &ContributorShards {
        &self.contributors
    }
}

impl ContributorLedger for MemoryStore {
    fn load_contributor(&self, identity: &str) -> Result<Option<Contributor>> {
        self.contributors.load(identity)
    }

    fn commit_contributor(&self, next: &Contributor, expected: u64) -> Result<bool> {
        self.contributors.commit_with(next, expected, |_| Ok(()))
    }
}

impl RecordStore for MemoryStore {
    fn append(&self, draft: NewRecord) -> Result<Record> {
        let mut idx = self.write()?;
        let record = Self::prepare_in(&idx, draft, self.clock.now())?;
        idx.insert(record.clone())?;
        record_append();
        Ok(record)
    }

    fn get(&self, identity: &str) -> Result<Option<Record>> {
        Ok(self.read()?.get(identity).cloned())
    }

    fn scan_descending_by_creation(
        &self,
        older_than: Option<Timestamp>,
        limit: usize,
    ) -> Result<Vec<Record>> {
        Ok(self.read()?.scan_descending(older_than, limit))
    }

    fn scan_created_at(
        &self,
        created_at: Timestamp,
        after_identity: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Record>> {
        Ok(self.read()?.scan_created_at(created_at, after_identity, limit))
    }

    fn scan_by_creation_token(&self, below: Option<&str>, limit: usize) -> Result<Vec<Record>> {
        Ok(self.read()?.scan_by_token(below, limit))
    }

    fn native_scan(&self) -> Option<&dyn NativeScan> {
        if self.native {
            Some(self)
        } else {
            None
        }
    }

    fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }
}

impl NativeScan for MemoryStore {
    fn scan_from(&self, start: Option<&ScanPosition>, limit: usize) -> Result<NativeBatch> {
        let key = start.map(|p| IndexKey::new(p.created_at, p.identity.clone()));
        let (records, more) = self.read()?.scan_after(key.as_ref(), limit);
        let position = records.last().map(ScanPosition::after);
        Ok(NativeBatch {
            records,
            position,
            more,
        })
    }
}
