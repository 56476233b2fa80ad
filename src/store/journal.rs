//! store/journal: on-disk frame format of the record journal.
//!
//! File layout:
//!   [magic8 "PGMJRN01"][reserved u64 = 0]            16-byte file header
//!   [frame]*
//!
//! Frame layout (little-endian):
//!   [kind u8][reserved 3][len u32][crc32c u32][payload: len bytes of JSON]
//!
//! CRC32C covers header[0..8] + payload. A frame that does not fit in the
//! file, or whose CRC fails while being the last frame, is a torn tail: the
//! writer died mid-append and nothing after it was acknowledged. A CRC
//! failure followed by more bytes is corruption and an error.
//!
//! `JournalWriter` never leaves a partial frame behind a failed append: the
//! sink is cut back to the frame start before the error is returned. If even
//! that fails the writer is poisoned and refuses every later append.

use anyhow::{anyhow, Context, Result};
use byteorder::{ByteOrder, LittleEndian};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Cursor, ErrorKind, Read, Seek, SeekFrom, Write};

use crate::model::{Contributor, Record};

pub const JOURNAL_FILE: &str = "records.journal";
pub const JOURNAL_MAGIC: &[u8; 8] = b"PGMJRN01";
pub const JOURNAL_HDR_SIZE: usize = 16;

pub const FRAME_HDR_SIZE: usize = 12;
const FRAME_OFF_KIND: usize = 0;
const FRAME_OFF_LEN: usize = 4;
const FRAME_OFF_CRC32: usize = 8;

pub const FRAME_RECORD: u8 = 1;
pub const FRAME_CONTRIBUTOR: u8 = 2;

/// Decoded journal payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalEntry {
    Record(Record),
    Contributor(Contributor),
}

impl JournalEntry {
    pub fn kind(&self) -> u8 {
        match self {
            JournalEntry::Record(_) => FRAME_RECORD,
            JournalEntry::Contributor(_) => FRAME_CONTRIBUTOR,
        }
    }

    fn payload(&self) -> Result<Vec<u8>> {
        let bytes = match self {
            JournalEntry::Record(r) => serde_json::to_vec(r),
            JournalEntry::Contributor(c) => serde_json::to_vec(c),
        };
        bytes.context("encode journal payload")
    }

    fn decode(kind: u8, payload: &[u8]) -> Result<Option<Self>> {
        let entry = match kind {
            FRAME_RECORD => JournalEntry::Record(
                serde_json::from_slice(payload).context("decode record frame")?,
            ),
            FRAME_CONTRIBUTOR => JournalEntry::Contributor(
                serde_json::from_slice(payload).context("decode contributor frame")?,
            ),
            _ => return Ok(None),
        };
        Ok(Some(entry))
    }
}

fn crc32c_of_parts(hdr: &[u8], payload: &[u8]) -> u32 {
    let c = crc32c::crc32c_append(0, hdr);
    crc32c::crc32c_append(c, payload)
}

pub fn write_file_header<W: Write>(w: &mut W) -> Result<()> {
    let mut hdr = [0u8; JOURNAL_HDR_SIZE];
    hdr[..8].copy_from_slice(JOURNAL_MAGIC);
    w.write_all(&hdr)?;
    Ok(())
}

pub fn check_file_header<R: Read + Seek>(r: &mut R) -> Result<()> {
    r.seek(SeekFrom::Start(0))?;
    let mut hdr = [0u8; JOURNAL_HDR_SIZE];
    r.read_exact(&mut hdr).context("read journal header")?;
    if &hdr[..8] != JOURNAL_MAGIC {
        return Err(anyhow!("bad journal magic"));
    }
    Ok(())
}

/// Encode one entry as `[header][payload]`.
pub fn encode_frame(entry: &JournalEntry) -> Result<Vec<u8>> {
    let payload = entry.payload()?;
    if payload.len() > u32::MAX as usize {
        return Err(anyhow!(
            "payload too large for journal frame: {} bytes",
            payload.len()
        ));
    }
    let mut buf = vec![0u8; FRAME_HDR_SIZE + payload.len()];
    buf[FRAME_OFF_KIND] = entry.kind();
    LittleEndian::write_u32(
        &mut buf[FRAME_OFF_LEN..FRAME_OFF_LEN + 4],
        payload.len() as u32,
    );
    let crc = crc32c_of_parts(&buf[..FRAME_OFF_CRC32], &payload);
    LittleEndian::write_u32(&mut buf[FRAME_OFF_CRC32..FRAME_OFF_CRC32 + 4], crc);
    buf[FRAME_HDR_SIZE..].copy_from_slice(&payload);
    Ok(buf)
}

/// Write one frame at the writer's current position. Returns bytes written.
pub fn append_frame<W: Write>(w: &mut W, entry: &JournalEntry) -> Result<usize> {
    let frame = encode_frame(entry)?;
    w.write_all(&frame)?;
    Ok(frame.len())
}

/// Byte sink a `JournalWriter` appends to.
pub trait JournalSink: Write + Seek {
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
    fn sync(&mut self) -> io::Result<()>;
}

impl JournalSink for File {
    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

impl JournalSink for Cursor<Vec<u8>> {
    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.get_mut().truncate(len as usize);
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Appends whole, synced frames at the sink's current position.
#[derive(Debug)]
pub struct JournalWriter<S: JournalSink> {
    sink: S,
    poisoned: bool,
}

impl<S: JournalSink> JournalWriter<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            poisoned: false,
        }
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub fn get_ref(&self) -> &S {
        &self.sink
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_inner(self) -> S {
        self.sink
    }

    /// Write and sync one frame. Returns bytes written.
    pub fn append(&mut self, entry: &JournalEntry) -> Result<usize> {
        if self.poisoned {
            return Err(anyhow!("journal writer poisoned by a failed rollback"));
        }
        let frame = encode_frame(entry)?;
        let start = self.sink.stream_position().context("journal position")?;

        let written = match self.sink.write_all(&frame) {
            Ok(()) => self.sink.sync(),
            Err(e) => Err(e),
        };
        let err = match written {
            Ok(()) => return Ok(frame.len()),
            Err(e) => e,
        };

        if let Err(re) = self.rollback(start) {
            self.poisoned = true;
            warn!(
                "journal: rollback to {} failed after append error ({}): {}",
                start, err, re
            );
            return Err(anyhow!(
                "journal append failed ({}); rollback to {} failed: {}",
                err,
                start,
                re
            ));
        }
        debug!("journal: append failed, cut back to {}", start);
        Err(anyhow::Error::new(err).context("append journal frame"))
    }

    fn rollback(&mut self, start: u64) -> io::Result<()> {
        self.sink.truncate_to(start)?;
        self.sink.seek(SeekFrom::Start(start))?;
        self.sink.sync()
    }
}

/// Result of reading at one position.
#[derive(Debug)]
pub enum FrameRead {
    /// A valid frame; `entry` is None for kinds this version does not know.
    Frame {
        kind: u8,
        entry: Option<JournalEntry>,
        next: u64,
    },
    /// Clean end of file.
    End,
    /// Partial or checksum-failing last frame starting at this position.
    Torn,
}

pub fn read_next_frame<R: Read + Seek>(r: &mut R, pos: u64, file_len: u64) -> Result<FrameRead> {
    if pos == file_len {
        return Ok(FrameRead::End);
    }
    if pos + FRAME_HDR_SIZE as u64 > file_len {
        return Ok(FrameRead::Torn);
    }

    r.seek(SeekFrom::Start(pos))?;
    let mut hdr = [0u8; FRAME_HDR_SIZE];
    if let Err(e) = r.read_exact(&mut hdr) {
        if e.kind() == ErrorKind::UnexpectedEof {
            return Ok(FrameRead::Torn);
        }
        return Err(anyhow!("journal read header at {}: {}", pos, e));
    }

    let len = LittleEndian::read_u32(&hdr[FRAME_OFF_LEN..FRAME_OFF_LEN + 4]) as u64;
    let next = pos + FRAME_HDR_SIZE as u64 + len;
    if next > file_len {
        return Ok(FrameRead::Torn);
    }

    let mut payload = vec![0u8; len as usize];
    if let Err(e) = r.read_exact(&mut payload) {
        if e.kind() == ErrorKind::UnexpectedEof {
            return Ok(FrameRead::Torn);
        }
        return Err(anyhow!("journal read payload at {}: {}", pos, e));
    }

    let stored = LittleEndian::read_u32(&hdr[FRAME_OFF_CRC32..FRAME_OFF_CRC32 + 4]);
    let calc = crc32c_of_parts(&hdr[..FRAME_OFF_CRC32], &payload);
    if stored != calc {
        if next == file_len {
            return Ok(FrameRead::Torn);
        }
        return Err(anyhow!(
            "journal CRC mismatch at pos {} (stored={}, calc={})",
            pos,
            stored,
            calc
        ));
    }

    let kind = hdr[FRAME_OFF_KIND];
    let entry = JournalEntry::decode(kind, &payload)
        .with_context(|| format!("journal frame at pos {}", pos))?;
    Ok(FrameRead::Frame { kind, entry, next })
}

/// Everything readable from a journal.
#[derive(Debug, Default)]
pub struct Replay {
    pub entries: Vec<JournalEntry>,
    /// Offset just past the last valid frame.
    pub valid_len: u64,
    pub torn: bool,
}

/// Read all frames after the file header. Does not modify the file.
pub fn replay<R: Read + Seek>(r: &mut R) -> Result<Replay> {
    check_file_header(r)?;
    let file_len = r.seek(SeekFrom::End(0))?;
    let mut out = Replay {
        valid_len: JOURNAL_HDR_SIZE as u64,
        ..Default::default()
    };
    let mut pos = JOURNAL_HDR_SIZE as u64;
    loop {
        match read_next_frame(r, pos, file_len)? {
            FrameRead::Frame { kind, entry, next } => {
                match entry {
                    Some(e) => out.entries.push(e),
                    None => debug!("journal replay: skip unknown frame kind {} at {}", kind, pos),
                }
                pos = next;
                out.valid_len = next;
            }
            FrameRead::End => break,
            FrameRead::Torn => {
                debug!(
                    "journal replay: torn tail at off={}, {} byte(s) dropped",
                    pos,
                    file_len - pos
                );
                out.torn = true;
                break;
            }
        }
    }
    Ok(out)
}
