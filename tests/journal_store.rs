use anyhow::Result;
use std::fs::{self, OpenOptions};
use std::io::{self, Cursor, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use pagemark::store::journal::{
    replay, write_file_header, JournalEntry, JournalSink, JournalWriter, JOURNAL_FILE,
};
use pagemark::{
    ContributorLedger, JournalStore, ManualClock, NewRecord, PagingConfig, PagingService,
    Record, RecordStore, ServiceBuilder, ShardedSequenceAllocator, StrategyKind, Timestamp,
};

static COUNTER: AtomicU64 = AtomicU64::new(0);

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("pagemark-{}-{}-{}-{}", prefix, pid, t, n))
}

fn service(kind: StrategyKind, store: JournalStore) -> PagingService<JournalStore> {
    ServiceBuilder::new()
        .config(PagingConfig::default().with_strategy(kind))
        .build(Arc::new(store))
}

#[test]
fn records_survive_reopen() -> Result<()> {
    let root = unique_root("reopen");
    let ids: Vec<String>;
    {
        let store = JournalStore::open(&root)?;
        ids = (0..4)
            .map(|i| store.append(NewRecord::new(format!("r{i}"))).map(|r| r.identity))
            .collect::<Result<_>>()?;
        assert_eq!(store.len()?, 4);
    }
    {
        let store = JournalStore::open(&root)?;
        assert_eq!(store.len()?, 4);
        for id in &ids {
            assert!(store.get(id)?.is_some(), "{id} lost on reopen");
        }
        store.append(NewRecord::new("r4"))?;
    }
    let ro = JournalStore::open_read_only(&root)?;
    assert!(ro.is_read_only());
    assert_eq!(ro.len()?, 5);
    assert!(ro.append(NewRecord::new("nope")).is_err());

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn bookmark_issued_before_restart_still_resumes() -> Result<()> {
    let root = unique_root("bookmark");
    let bookmark;
    let first_ids: Vec<String>;
    {
        let clock = Arc::new(ManualClock::ticking(Timestamp(1_000_000), 3));
        let store = JournalStore::open_with(&root, clock, 4)?;
        let svc = service(StrategyKind::KeyRange, store);
        svc.populate(Some(9), None)?;
        let first = svc.first_page(5)?;
        first_ids = first.records.iter().map(|r| r.identity.clone()).collect();
        bookmark = first.next_bookmark.expect("9 records need two pages");
    }

    let svc = service(StrategyKind::KeyRange, JournalStore::open_read_only(&root)?);
    let second = svc.get_page(Some(&bookmark), 5)?;
    assert_eq!(second.len(), 4);
    assert!(second.is_last());
    for r in &second.records {
        assert!(!first_ids.contains(&r.identity));
    }

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn contributor_sequences_are_journaled() -> Result<()> {
    let root = unique_root("contrib");
    {
        let svc = service(StrategyKind::UniqueToken, JournalStore::open(&root)?);
        svc.populate(Some(3), Some("alice"))?;
        svc.append_record("from bob", Some("bob"))?;
    }
    let store = JournalStore::open(&root)?;
    assert_eq!(store.load_contributor("alice")?.map(|c| c.sequence), Some(3));
    assert_eq!(store.load_contributor("bob")?.map(|c| c.sequence), Some(1));
    assert_eq!(store.contributor_count(), 2);

    let alloc = ShardedSequenceAllocator::new(Arc::new(ManualClock::frozen(Timestamp(1))), 4);
    assert_eq!(alloc.next_sequence(&store, "alice")?, 4);
    assert_eq!(store.scan_by_creation_token(None, 10)?.len(), 4);

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn torn_tail_is_dropped_and_truncated() -> Result<()> {
    let root = unique_root("torn");
    {
        let store = JournalStore::open(&root)?;
        for i in 0..3 {
            store.append(NewRecord::new(format!("r{i}")))?;
        }
    }
    let path = root.join(JOURNAL_FILE);
    let good_len = fs::metadata(&path)?.len();
    {
        // a frame header promising 200 payload bytes, followed by only 5
        let mut f = OpenOptions::new().append(true).open(&path)?;
        let mut partial = vec![1u8, 0, 0, 0, 200, 0, 0, 0, 0, 0, 0, 0];
        partial.extend_from_slice(b"{\"ide");
        f.write_all(&partial)?;
        f.sync_all()?;
    }

    // read-only replay ignores the tail without touching it
    {
        let ro = JournalStore::open_read_only(&root)?;
        assert_eq!(ro.len()?, 3);
    }
    assert!(fs::metadata(&path)?.len() > good_len);

    {
        let store = JournalStore::open(&root)?;
        assert_eq!(store.len()?, 3);
        assert_eq!(fs::metadata(&path)?.len(), good_len);
        store.append(NewRecord::new("after repair"))?;
    }
    let store = JournalStore::open(&root)?;
    assert_eq!(store.len()?, 4);

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn second_writer_is_refused() -> Result<()> {
    let root = unique_root("lock");
    let _writer = JournalStore::open(&root)?;
    assert!(JournalStore::open(&root).is_err());
    assert!(JournalStore::open_read_only(&root).is_err());
    drop(_writer);
    assert!(JournalStore::open_read_only(&root).is_ok());

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn read_only_open_needs_a_journal() {
    let root = unique_root("missing");
    assert!(JournalStore::open_read_only(&root).is_err());
}

/// In-memory sink that runs out of space after `budget` bytes.
struct FlakySink {
    inner: Cursor<Vec<u8>>,
    budget: Option<usize>,
    fail_truncate: bool,
}

impl FlakySink {
    fn new() -> Self {
        Self {
            inner: Cursor::new(Vec::new()),
            budget: None,
            fail_truncate: false,
        }
    }
}

impl Write for FlakySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.budget {
            Some(0) => Err(io::Error::new(io::ErrorKind::Other, "no space left")),
            Some(left) => {
                let n = self.inner.write(&buf[..left.min(buf.len())])?;
                self.budget = Some(left - n);
                Ok(n)
            }
            None => self.inner.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl Seek for FlakySink {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

impl JournalSink for FlakySink {
    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        if self.fail_truncate {
            return Err(io::Error::new(io::ErrorKind::Other, "truncate refused"));
        }
        self.inner.truncate_to(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn entry(id: &str) -> JournalEntry {
    JournalEntry::Record(Record {
        identity: id.to_string(),
        text: format!("text {id}"),
        created_at: Timestamp(7),
        creation_token: None,
    })
}

#[test]
fn failed_append_leaves_journal_replayable() -> Result<()> {
    let mut sink = FlakySink::new();
    write_file_header(&mut sink)?;
    let mut w = JournalWriter::new(sink);
    w.append(&entry("a"))?;

    w.get_mut().budget = Some(20);
    assert!(w.append(&entry("b")).is_err());
    assert!(!w.is_poisoned());

    w.get_mut().budget = None;
    w.append(&entry("c"))?;

    let mut bytes = w.into_inner().inner;
    let out = replay(&mut bytes)?;
    assert!(!out.torn);
    assert_eq!(out.entries, vec![entry("a"), entry("c")]);
    Ok(())
}

#[test]
fn failed_rollback_poisons_the_writer() -> Result<()> {
    let mut sink = FlakySink::new();
    write_file_header(&mut sink)?;
    let mut w = JournalWriter::new(sink);
    w.append(&entry("a"))?;

    w.get_mut().budget = Some(20);
    w.get_mut().fail_truncate = true;
    assert!(w.append(&entry("b")).is_err());
    assert!(w.is_poisoned());

    w.get_mut().budget = None;
    assert!(w.append(&entry("c")).is_err());

    // the partial frame is the last thing in the journal, so replay still opens
    let mut bytes = w.into_inner().inner;
    let out = replay(&mut bytes)?;
    assert!(out.torn);
    assert_eq!(out.entries, vec![entry("a")]);
    Ok(())
}
