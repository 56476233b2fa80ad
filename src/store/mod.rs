//! store: the ordered record collection the strategies page over.
//!
//! Split by submodule:
//! - index.rs  : in-memory ordered indexes (creation order, identity, creation token)
//!                and the sharded contributor table
//! - memory.rs : MemoryStore: index only, no durability beyond the process
//! - journal.rs: frame format of the append-only journal (header, CRC32C, replay reader)
//! - durable.rs: JournalStore: MemoryStore indexes rebuilt from, and written through, a journal
//!
//! Each query carries a single inequality. The key-range strategy
//! has to combine `scan_created_at` and `scan_descending_by_creation` itself;
//! only stores that advertise `native_scan()` can resume from an opaque
//! position in one call.

use anyhow::Result;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use byteorder::{BigEndian, ByteOrder};

use crate::codec::CursorError;
use crate::model::{Contributor, NewRecord, Record, Timestamp};

pub mod durable;
pub mod index;
pub mod journal;
pub mod memory;

pub use durable::JournalStore;
pub use memory::MemoryStore;

/// Transactional storage for contributor sequences.
pub trait ContributorLedger: Send + Sync {
    fn load_contributor(&self, identity: &str) -> Result<Option<Contributor>>;

    /// Compare-and-set: store `next` only if the currently stored sequence
    /// equals `expected` (0 when the contributor does not exist yet).
    ///
    /// `Ok(true)` means `next` is durably persisted. `Ok(false)` means another
    /// writer got there first and nothing was written.
    fn commit_contributor(&self, next: &Contributor, expected: u64) -> Result<bool>;
}

/// Ordered record collection.
///
/// Primary order is `created_at DESC, identity ASC`.
pub trait RecordStore: ContributorLedger {
    /// Assign identity and `created_at`, persist, return the stored record.
    /// Returns only after the record (with its creation token, if any) is durable.
    fn append(&self, draft: NewRecord) -> Result<Record>;

    /// Point lookup. `Ok(None)` is the recoverable not-found.
    fn get(&self, identity: &str) -> Result<Option<Record>>;

    /// Records with `created_at < older_than` (all when None), primary order.
    fn scan_descending_by_creation(
        &self,
        older_than: Option<Timestamp>,
        limit: usize,
    ) -> Result<Vec<Record>>;

    /// Records with `created_at == created_at` and identity strictly after
    /// `after_identity` (all when None), ascending identity.
    fn scan_created_at(
        &self,
        created_at: Timestamp,
        after_identity: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Record>>;

    /// Records carrying a creation token strictly below `below` (all when
    /// None), descending token. Records without a token are not listed.
    fn scan_by_creation_token(&self, below: Option<&str>, limit: usize) -> Result<Vec<Record>>;

    /// Resumable native scans, if this store has them.
    fn native_scan(&self) -> Option<&dyn NativeScan>;

    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Store-native resumable scan over the primary order.
pub trait NativeScan: Send + Sync {
    /// Up to `limit` records strictly after `start` (from the newest when None).
    fn scan_from(&self, start: Option<&ScanPosition>, limit: usize) -> Result<NativeBatch>;
}

/// Result of one native scan call.
#[derive(Debug, Clone, Default)]
pub struct NativeBatch {
    pub records: Vec<Record>,
    /// Position just after the last returned record (None if nothing was returned).
    pub position: Option<ScanPosition>,
    /// More records exist after `position`.
    pub more: bool,
}

/// Serialized position inside the primary index.
///
/// Binary layout (big-endian), then URL-safe base64 without padding:
/// `[version u8][created_at u64][identity_len u16][identity][crc32c u32]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPosition {
    pub created_at: Timestamp,
    pub identity: String,
}

const POSITION_VERSION: u8 = 1;
const POSITION_FIXED_LEN: usize = 1 + 8 + 2 + 4;

impl ScanPosition {
    pub fn after(record: &Record) -> Self {
        Self {
            created_at: record.created_at,
            identity: record.identity.clone(),
        }
    }

    pub fn to_websafe(&self) -> String {
        let id = self.identity.as_bytes();
        let id_len = id.len().min(u16::MAX as usize);
        let mut buf = vec![0u8; POSITION_FIXED_LEN + id_len];
        buf[0] = POSITION_VERSION;
        BigEndian::write_u64(&mut buf[1..9], self.created_at.as_micros());
        BigEndian::write_u16(&mut buf[9..11], id_len as u16);
        buf[11..11 + id_len].copy_from_slice(&id[..id_len]);
        let crc = crc32c::crc32c(&buf[..11 + id_len]);
        BigEndian::write_u32(&mut buf[11 + id_len..], crc);
        URL_SAFE_NO_PAD.encode(&buf)
    }

    pub fn from_websafe(token: &str) -> std::result::Result<Self, CursorError> {
        let buf = URL_SAFE_NO_PAD
            .decode(token.trim().as_bytes())
            .map_err(|e| CursorError::Decode(format!("base64: {}", e)))?;
        if buf.len() < POSITION_FIXED_LEN {
            return Err(CursorError::Decode(format!(
                "position too short: {} bytes",
                buf.len()
            )));
        }
        if buf[0] != POSITION_VERSION {
            return Err(CursorError::Decode(format!(
                "unsupported position version {}",
                buf[0]
            )));
        }
        let id_len = BigEndian::read_u16(&buf[9..11]) as usize;
        if buf.len() != POSITION_FIXED_LEN + id_len {
            return Err(CursorError::Decode("position length mismatch".into()));
        }
        let stored = BigEndian::read_u32(&buf[11 + id_len..]);
        if stored != crc32c::crc32c(&buf[..11 + id_len]) {
            return Err(CursorError::Decode("position checksum mismatch".into()));
        }
        let identity = std::str::from_utf8(&buf[11..11 + id_len])
            .map_err(|_| CursorError::Decode("position identity is not UTF-8".into()))?
            .to_string();
        Ok(Self {
            created_at: Timestamp(BigEndian::read_u64(&buf[1..9])),
            identity,
        })
    }
}
