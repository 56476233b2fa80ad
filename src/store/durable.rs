//! store/durable: JournalStore: MemoryStore indexes written through an
//! append-only journal under `<root>/records.journal`.
//!
//! Open:
//! - takes `<root>/LOCK` (exclusive for writers, shared for read-only),
//! - creates the journal with a fresh header if missing,
//! - replays every frame into the in-memory indexes,
//! - writer mode truncates a torn tail so the next append starts on a frame boundary.
//!
//! Write path (append, contributor commit): frame -> write_all -> sync_data ->
//! index update. An acknowledged write survives a crash. A failed write is
//! cut back out of the journal, so later appends stay replayable.
//!
//! Lock order: contributor -> journal writer -> record index.

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::clock::{Clock, SystemClock};
use crate::config::DEFAULT_CONTRIBUTOR_SHARDS;
use crate::lock::{try_acquire_lock, LockGuard, LockMode};
use crate::metrics::{
    record_append, record_journal_frame, record_journal_fsync, record_journal_replayed,
    record_journal_torn_tail,
};
use crate::model::{Contributor, NewRecord, Record, Timestamp};

use super::journal::{
    replay, write_file_header, JournalEntry, JournalWriter, JOURNAL_FILE, JOURNAL_HDR_SIZE,
};
use super::memory::MemoryStore;
use super::{ContributorLedger, NativeScan, RecordStore};

pub struct JournalStore {
    root: PathBuf,
    mem: MemoryStore,
    writer: Option<Mutex<JournalWriter<File>>>,
    _lock: LockGuard,
}

impl JournalStore {
    /// Open (or create) a writable journal store in `root`.
    pub fn open(root: &Path) -> Result<Self> {
        Self::open_with(root, Arc::new(SystemClock), DEFAULT_CONTRIBUTOR_SHARDS)
    }

    pub fn open_with(root: &Path, clock: Arc<dyn Clock>, shards: usize) -> Result<Self> {
        std::fs::create_dir_all(root)
            .with_context(|| format!("create store dir {}", root.display()))?;
        let lock = try_acquire_lock(root, LockMode::Exclusive)?;
        let path = root.join(JOURNAL_FILE);

        let mut f = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("open journal {}", path.display()))?;

        if f.metadata()?.len() == 0 {
            debug!("journal: writing fresh header to {}", path.display());
            write_file_header(&mut f)?;
            f.sync_all()?;
        }

        let mem = MemoryStore::with_shards(clock, shards);
        let (valid_len, torn) = Self::load(&mut f, &mem, &path)?;
        if torn {
            warn!(
                "journal: truncating torn tail of {} to {} bytes",
                path.display(),
                valid_len
            );
            f.set_len(valid_len)?;
            f.sync_all()?;
        }
        f.seek(SeekFrom::End(0))?;

        Ok(Self {
            root: root.to_path_buf(),
            mem,
            writer: Some(Mutex::new(JournalWriter::new(f))),
            _lock: lock,
        })
    }

    /// Open an existing journal for reading only. Appends and contributor
    /// commits fail; a torn tail is ignored, not truncated.
    pub fn open_read_only(root: &Path) -> Result<Self> {
        let path = root.join(JOURNAL_FILE);
        if !path.exists() {
            return Err(anyhow!("journal not found at {}", path.display()));
        }
        let lock = try_acquire_lock(root, LockMode::Shared)?;
        let mut f = File::open(&path).with_context(|| format!("open journal {}", path.display()))?;
        let mem = MemoryStore::new();
        Self::load(&mut f, &mem, &path)?;
        Ok(Self {
            root: root.to_path_buf(),
            mem,
            writer: None,
            _lock: lock,
        })
    }

    fn load(f: &mut File, mem: &MemoryStore, path: &Path) -> Result<(u64, bool)> {
        if f.metadata()?.len() < JOURNAL_HDR_SIZE as u64 {
            return Err(anyhow!("journal too small: {}", path.display()));
        }
        let out = replay(f).with_context(|| format!("replay journal {}", path.display()))?;
        let frames = out.entries.len() as u64;
        let mut records = 0usize;
        for entry in out.entries {
            match entry {
                JournalEntry::Record(r) => {
                    mem.insert(r)?;
                    records += 1;
                }
                JournalEntry::Contributor(c) => mem.contributors().restore(c)?,
            }
        }
        record_journal_replayed(frames);
        if out.torn {
            record_journal_torn_tail();
        }
        if frames > 0 {
            info!(
                "journal replay: {} frame(s), {} record(s) from {}",
                frames,
                records,
                path.display()
            );
        } else {
            debug!("journal replay: empty journal {}", path.display());
        }
        Ok((out.valid_len, out.torn))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn journal_path(&self) -> PathBuf {
        self.root.join(JOURNAL_FILE)
    }

    pub fn is_read_only(&self) -> bool {
        self.writer.is_none()
    }

    pub fn contributor_count(&self) -> usize {
        self.mem.contributor_count()
    }

    fn writer(&self) -> Result<&Mutex<JournalWriter<File>>> {
        self.writer
            .as_ref()
            .ok_or_else(|| anyhow!("journal store opened read-only: {}", self.root.display()))
    }

    fn write_durable(w: &mut JournalWriter<File>, entry: &JournalEntry) -> Result<()> {
        let n = w.append(entry)?;
        record_journal_frame(n);
        record_journal_fsync();
        Ok(())
    }
}

impl ContributorLedger for JournalStore {
    fn load_contributor(&self, identity: &str) -> Result<Option<Contributor>> {
        self.mem.load_contributor(identity)
    }

    fn commit_contributor(&self, next: &Contributor, expected: u64) -> Result<bool> {
        let writer = self.writer()?;
        self.mem.contributors().commit_with(next, expected, |c| {
            let mut f = writer
                .lock()
                .map_err(|_| anyhow!("journal writer lock poisoned"))?;
            Self::write_durable(&mut f, &JournalEntry::Contributor(c.clone()))
        })
    }
}

impl RecordStore for JournalStore {
    fn append(&self, draft: NewRecord) -> Result<Record> {
        let mut f = self
            .writer()?
            .lock()
            .map_err(|_| anyhow!("journal writer lock poisoned"))?;
        let record = self.mem.prepare(draft)?;
        Self::write_durable(&mut f, &JournalEntry::Record(record.clone()))?;
        self.mem.insert(record.clone())?;
        record_append();
        Ok(record)
    }

    fn get(&self, identity: &str) -> Result<Option<Record>> {
        self.mem.get(identity)
    }

    fn scan_descending_by_creation(
        &self,
        older_than: Option<Timestamp>,
        limit: usize,
    ) -> Result<Vec<Record>> {
        self.mem.scan_descending_by_creation(older_than, limit)
    }

    fn scan_created_at(
        &self,
        created_at: Timestamp,
        after_identity: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Record>> {
        self.mem.scan_created_at(created_at, after_identity, limit)
    }

    fn scan_by_creation_token(&self, below: Option<&str>, limit: usize) -> Result<Vec<Record>> {
        self.mem.scan_by_creation_token(below, limit)
    }

    fn native_scan(&self) -> Option<&dyn NativeScan> {
        self.mem.native_scan()
    }

    fn len(&self) -> Result<usize> {
        self.mem.len()
    }
}
