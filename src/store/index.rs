//! store/index: in-memory ordered indexes shared by both store implementations.
//!
//! - `by_creation`: primary order, key `(Reverse(created_at), identity)`, so a
//!   forward BTreeMap walk is newest-first with ascending identity on ties.
//! - `by_identity`: identity -> created_at, for point lookups.
//! - `by_token`: creation token -> primary key, only for records that carry one.
//!
//! `ContributorShards` keeps one mutex per contributor, found through N
//! mutex-guarded maps picked by `hash::shard_of`. A shard lock only covers
//! the map lookup; a commit holds just its own contributor's lock.

use anyhow::{anyhow, Result};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::hash::shard_of;
use crate::model::{Contributor, Record, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct IndexKey {
    newest_first: Reverse<Timestamp>,
    identity: String,
}

impl IndexKey {
    pub fn new(created_at: Timestamp, identity: impl Into<String>) -> Self {
        Self {
            newest_first: Reverse(created_at),
            identity: identity.into(),
        }
    }

    pub fn of(record: &Record) -> Self {
        Self::new(record.created_at, record.identity.clone())
    }

    pub fn created_at(&self) -> Timestamp {
        self.newest_first.0
    }
}

#[derive(Debug, Default)]
pub struct RecordIndex {
    by_creation: BTreeMap<IndexKey, Record>,
    by_identity: HashMap<String, Timestamp>,
    by_token: BTreeMap<String, IndexKey>,
}

impl RecordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_creation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_creation.is_empty()
    }

    pub fn contains_identity(&self, identity: &str) -> bool {
        self.by_identity.contains_key(identity)
    }

    pub fn contains_token(&self, token: &str) -> bool {
        self.by_token.contains_key(token)
    }

    /// Fails on a duplicate identity or creation token; the index is left untouched.
    pub fn insert(&mut self, record: Record) -> Result<()> {
        if self.contains_identity(&record.identity) {
            return Err(anyhow!("duplicate record identity {}", record.identity));
        }
        if let Some(token) = &record.creation_token {
            if self.contains_token(token) {
                return Err(anyhow!("duplicate creation token {}", token));
            }
        }
        let key = IndexKey::of(&record);
        if let Some(token) = &record.creation_token {
            self.by_token.insert(token.clone(), key.clone());
        }
        self.by_identity
            .insert(record.identity.clone(), record.created_at);
        self.by_creation.insert(key, record);
        Ok(())
    }

    pub fn get(&self, identity: &str) -> Option<&Record> {
        let created_at = *self.by_identity.get(identity)?;
        self.by_creation.get(&IndexKey::new(created_at, identity))
    }

    pub fn scan_descending(&self, older_than: Option<Timestamp>, limit: usize) -> Vec<Record> {
        let start = match older_than {
            None => Bound::Unbounded,
            // created_at < t  <=>  created_at <= t-1 (integer micros)
            Some(Timestamp(0)) => return Vec::new(),
            Some(Timestamp(t)) => Bound::Included(IndexKey::new(Timestamp(t - 1), String::new())),
        };
        self.by_creation
            .range((start, Bound::Unbounded))
            .take(limit)
            .map(|(_, r)| r.clone())
            .collect()
    }

    pub fn scan_created_at(
        &self,
        created_at: Timestamp,
        after_identity: Option<&str>,
        limit: usize,
    ) -> Vec<Record> {
        let start = match after_identity {
            None => Bound::Included(IndexKey::new(created_at, String::new())),
            Some(id) => Bound::Excluded(IndexKey::new(created_at, id)),
        };
        self.by_creation
            .range((start, Bound::Unbounded))
            .take_while(|(k, _)| k.created_at() == created_at)
            .take(limit)
            .map(|(_, r)| r.clone())
            .collect()
    }

    pub fn scan_by_token(&self, below: Option<&str>, limit: usize) -> Vec<Record> {
        let end = match below {
            None => Bound::Unbounded,
            Some(t) => Bound::Excluded(t.to_string()),
        };
        self.by_token
            .range((Bound::Unbounded, end))
            .rev()
            .take(limit)
            .filter_map(|(_, key)| self.by_creation.get(key).cloned())
            .collect()
    }

    /// Up to `limit` records strictly after `after` in primary order, plus
    /// whether anything remains beyond them.
    pub fn scan_after(&self, after: Option<&IndexKey>, limit: usize) -> (Vec<Record>, bool) {
        let start = match after {
            None => Bound::Unbounded,
            Some(k) => Bound::Excluded(k.clone()),
        };
        let mut iter = self.by_creation.range((start, Bound::Unbounded));
        let records: Vec<Record> = iter.by_ref().take(limit).map(|(_, r)| r.clone()).collect();
        let more = iter.next().is_some();
        (records, more)
    }
}

/// Fresh 16-hex-digit identity not yet present in `index`.
pub fn fresh_identity(index: &RecordIndex) -> String {
    loop {
        let id = format!("{:016x}", rand::random::<u64>());
        if !index.contains_identity(&id) {
            return id;
        }
    }
}

type Slot = Arc<Mutex<u64>>;

#[derive(Debug)]
pub struct ContributorShards {
    shards: Vec<Mutex<HashMap<String, Slot>>>,
}

impl ContributorShards {
    pub fn new(shards: usize) -> Self {
        let n = shards.max(1);
        let mut v = Vec::with_capacity(n);
        for _ in 0..n {
            v.push(Mutex::new(HashMap::new()));
        }
        Self { shards: v }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard(&self, identity: &str) -> Result<MutexGuard<'_, HashMap<String, Slot>>> {
        self.shards[shard_of(identity, self.shards.len())]
            .lock()
            .map_err(|_| anyhow!("contributor shard lock poisoned"))
    }

    fn existing_slot(&self, identity: &str) -> Result<Option<Slot>> {
        let slot = self.shard(identity)?.get(identity).cloned();
        Ok(slot)
    }

    /// Shard lock is held only for the lookup/insert, never across a commit.
    fn slot(&self, identity: &str) -> Result<Slot> {
        let mut g = self.shard(identity)?;
        let slot = g.entry(identity.to_string()).or_default().clone();
        Ok(slot)
    }

    fn lock_slot(slot: &Slot) -> Result<MutexGuard<'_, u64>> {
        slot.lock()
            .map_err(|_| anyhow!("contributor lock poisoned"))
    }

    pub fn load(&self, identity: &str) -> Result<Option<Contributor>> {
        let slot = match self.existing_slot(identity)? {
            Some(slot) => slot,
            None => return Ok(None),
        };
        let sequence = *Self::lock_slot(&slot)?;
        if sequence == 0 {
            return Ok(None);
        }
        Ok(Some(Contributor {
            identity: identity.to_string(),
            sequence,
        }))
    }

    /// Compare-and-set under this contributor's own lock. `persist` runs
    /// before the in-memory value changes; if it fails nothing is updated.
    /// Other contributors, same shard or not, are not held up by `persist`.
    pub fn commit_with<F>(&self, next: &Contributor, expected: u64, persist: F) -> Result<bool>
    where
        F: FnOnce(&Contributor) -> Result<()>,
    {
        let slot = self.slot(&next.identity)?;
        let mut current = Self::lock_slot(&slot)?;
        if *current != expected {
            return Ok(false);
        }
        persist(next)?;
        *current = next.sequence;
        Ok(true)
    }

    /// Replay path: last write wins.
    pub fn restore(&self, contributor: Contributor) -> Result<()> {
        let slot = self.slot(&contributor.identity)?;
        *Self::lock_slot(&slot)? = contributor.sequence;
        Ok(())
    }

    /// Contributors with at least one committed sequence.
    pub fn len(&self) -> usize {
        let mut n = 0;
        for shard in &self.shards {
            let slots: Vec<Slot> = match shard.lock() {
                Ok(g) => g.values().cloned().collect(),
                Err(_) => continue,
            };
            n += slots
                .iter()
                .filter(|s| s.lock().map(|v| *v != 0).unwrap_or(false))
                .count();
        }
        n
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str, ts: u64, token: Option<&str>) -> Record {
        Record {
            identity: id.to_string(),
            text: format!("text-{id}"),
            created_at: Timestamp(ts),
            creation_token: token.map(str::to_string),
        }
    }

    fn ids(v: &[Record]) -> Vec<&str> {
        v.iter().map(|r| r.identity.as_str()).collect()
    }

    fn sample() -> RecordIndex {
        let mut idx = RecordIndex::new();
        for (id, ts) in [("b", 20), ("a", 20), ("c", 20), ("d", 10), ("e", 30), ("f", 5)] {
            idx.insert(rec(id, ts, None)).unwrap();
        }
        idx
    }

    #[test]
    fn primary_order_is_newest_first_then_identity() {
        let idx = sample();
        assert_eq!(ids(&idx.scan_descending(None, 10)), ["e", "a", "b", "c", "d", "f"]);
        assert_eq!(ids(&idx.scan_descending(Some(Timestamp(20)), 10)), ["d", "f"]);
        assert_eq!(ids(&idx.scan_descending(Some(Timestamp(21)), 2)), ["a", "b"]);
        assert!(idx.scan_descending(Some(Timestamp(0)), 10).is_empty());
    }

    #[test]
    fn same_instant_scan_is_ascending_and_exclusive() {
        let idx = sample();
        assert_eq!(ids(&idx.scan_created_at(Timestamp(20), None, 10)), ["a", "b", "c"]);
        assert_eq!(ids(&idx.scan_created_at(Timestamp(20), Some("a"), 10)), ["b", "c"]);
        assert_eq!(ids(&idx.scan_created_at(Timestamp(20), Some("c"), 10)), Vec::<&str>::new());
        assert_eq!(ids(&idx.scan_created_at(Timestamp(20), Some("a"), 1)), ["b"]);
    }

    #[test]
    fn scan_after_reports_more() {
        let idx = sample();
        let (page, more) = idx.scan_after(None, 3);
        assert_eq!(ids(&page), ["e", "a", "b"]);
        assert!(more);
        let (page, more) = idx.scan_after(Some(&IndexKey::of(&page[2])), 3);
        assert_eq!(ids(&page), ["c", "d", "f"]);
        assert!(!more);
    }

    #[test]
    fn token_index_descends_and_skips_untokened() {
        let mut idx = sample();
        idx.insert(rec("x", 1, Some("0001.aa"))).unwrap();
        idx.insert(rec("y", 2, Some("0002.bb"))).unwrap();
        idx.insert(rec("z", 3, Some("0003.cc"))).unwrap();
        assert_eq!(ids(&idx.scan_by_token(None, 10)), ["z", "y", "x"]);
        assert_eq!(ids(&idx.scan_by_token(Some("0003.cc"), 10)), ["y", "x"]);
        assert_eq!(ids(&idx.scan_by_token(Some("0003.cc"), 1)), ["y"]);
    }

    #[test]
    fn duplicates_are_rejected() {
        let mut idx = sample();
        assert!(idx.insert(rec("a", 99, None)).is_err());
        idx.insert(rec("t1", 1, Some("tok"))).unwrap();
        assert!(idx.insert(rec("t2", 1, Some("tok"))).is_err());
        assert!(idx.get("t2").is_none());
        assert_eq!(idx.get("t1").unwrap().text, "text-t1");
    }

    #[test]
    fn contributor_cas_rejects_stale_expectation() {
        let shards = ContributorShards::new(4);
        let c1 = Contributor { identity: "a".into(), sequence: 1 };
        assert!(shards.commit_with(&c1, 0, |_| Ok(())).unwrap());
        assert!(!shards.commit_with(&c1, 0, |_| Ok(())).unwrap());
        assert_eq!(shards.load("a").unwrap().unwrap().sequence, 1);
        assert!(shards.load("b").unwrap().is_none());
    }

    #[test]
    fn failed_persist_leaves_sequence_unchanged() {
        let shards = ContributorShards::new(1);
        let c1 = Contributor { identity: "a".into(), sequence: 1 };
        assert!(shards
            .commit_with(&c1, 0, |_| Err(anyhow!("disk gone")))
            .is_err());
        assert!(shards.load("a").unwrap().is_none());
        assert!(shards.is_empty());
    }
}
