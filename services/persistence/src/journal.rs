//! Append-only order journal with checksums
//!
//! # Binary Format (per entry)
//! ```text
//! [body_len: u32]
//! [kind:     u8]      // 1 = order added, 2 = order removed
//! [payload:  bytes]   // bincode Order, or the 32-byte order key
//! [checksum: u32]     // CRC32C over kind+payload
//! ```
//! `body_len` counts kind, payload and checksum. All integers little-endian.

use crc32c::crc32c;
use ledger_types::ids::Hash;
use ledger_types::order::Order;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupt journal at offset {offset}: {reason}")]
    Corruption { offset: u64, reason: String },

    #[error("Journal entry {entry} contradicts earlier entries: {reason}")]
    Inconsistent { entry: u64, reason: String },

    #[error("Journal writer lock poisoned")]
    LockPoisoned,
}

impl From<bincode::Error> for JournalError {
    fn from(err: bincode::Error) -> Self {
        JournalError::Serialization(err.to_string())
    }
}

// ── Journal Entry ───────────────────────────────────────────────────

const KIND_ADDED: u8 = 1;
const KIND_REMOVED: u8 = 2;

/// kind + checksum
const MIN_BODY_LEN: usize = 1 + 4;

/// Largest body accepted when reading; anything above is treated as corruption
const MAX_BODY_LEN: usize = 16 * 1024 * 1024;

/// A single change to the set of live orders
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEntry {
    Added(Order),
    Removed(Hash),
}

impl JournalEntry {
    fn kind(&self) -> u8 {
        match self {
            JournalEntry::Added(_) => KIND_ADDED,
            JournalEntry::Removed(_) => KIND_REMOVED,
        }
    }

    fn payload(&self) -> Result<Vec<u8>, JournalError> {
        match self {
            JournalEntry::Added(order) => Ok(bincode::serialize(order)?),
            JournalEntry::Removed(key) => Ok(key.as_bytes().to_vec()),
        }
    }

    /// Serialize entry to the binary wire format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, JournalError> {
        let payload = self.payload()?;
        let mut checked = Vec::with_capacity(1 + payload.len());
        checked.push(self.kind());
        checked.extend_from_slice(&payload);
        let checksum = crc32c(&checked);

        let body_len = u32::try_from(checked.len() + 4)
            .map_err(|_| JournalError::Serialization("entry too large".into()))?;
        let mut buf = Vec::with_capacity(4 + checked.len() + 4);
        buf.extend_from_slice(&body_len.to_le_bytes());
        buf.extend_from_slice(&checked);
        buf.extend_from_slice(&checksum.to_le_bytes());
        Ok(buf)
    }

    /// Deserialize one entry from the front of `data`.
    ///
    /// Returns `(entry, bytes_consumed)`. `offset` only labels errors.
    pub fn from_bytes(data: &[u8], offset: u64) -> Result<(Self, usize), JournalError> {
        let corrupt = |reason: String| JournalError::Corruption { offset, reason };

        let len_bytes: [u8; 4] = data
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| corrupt("truncated length prefix".into()))?;
        let body_len = u32::from_le_bytes(len_bytes) as usize;
        if !(MIN_BODY_LEN..=MAX_BODY_LEN).contains(&body_len) {
            return Err(corrupt(format!("implausible body length {body_len}")));
        }
        let total = 4 + body_len;
        let body = data
            .get(4..total)
            .ok_or_else(|| corrupt(format!("incomplete entry: need {total} bytes, have {}", data.len())))?;

        let (checked, checksum_bytes) = body.split_at(body_len - 4);
        let mut stored = [0u8; 4];
        stored.copy_from_slice(checksum_bytes);
        if crc32c(checked) != u32::from_le_bytes(stored) {
            return Err(corrupt("checksum mismatch".into()));
        }

        let (kind, payload) = (checked[0], &checked[1..]);
        let entry = match kind {
            KIND_ADDED => JournalEntry::Added(
                bincode::deserialize(payload).map_err(|e| corrupt(format!("undecodable order: {e}")))?,
            ),
            KIND_REMOVED => {
                let key: [u8; 32] = payload
                    .try_into()
                    .map_err(|_| corrupt(format!("order key of {} bytes", payload.len())))?;
                JournalEntry::Removed(Hash::new(key))
            }
            other => return Err(corrupt(format!("unknown entry kind {other}"))),
        };
        Ok((entry, total))
    }
}

/// Decode every entry of a journal image, failing on the first bad one
pub fn decode_entries(data: &[u8]) -> Result<Vec<JournalEntry>, JournalError> {
    let mut entries = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        let (entry, consumed) = JournalEntry::from_bytes(&data[pos..], pos as u64)?;
        entries.push(entry);
        pos += consumed;
    }
    Ok(entries)
}

// ── Fsync Policy ────────────────────────────────────────────────────

/// Controls when `fsync` (durable write) is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsyncPolicy {
    /// Fsync after every batch.
    EveryWrite,
    /// Leave durability to the OS; batches are still flushed.
    Never,
}

// ── Journal Writer Configuration ────────────────────────────────────

#[derive(Debug, Clone)]
pub struct JournalConfig {
    /// Directory holding the journal file.
    pub dir: PathBuf,
    pub fsync_policy: FsyncPolicy,
}

impl JournalConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            fsync_policy: FsyncPolicy::EveryWrite,
        }
    }

    pub fn journal_path(&self) -> PathBuf {
        self.dir.join(JOURNAL_FILE)
    }
}

const JOURNAL_FILE: &str = "orders.journal";

// ── Journal Sink ────────────────────────────────────────────────────

/// Byte sink the journal appends to.
pub trait JournalSink: Write {
    /// Current length in bytes.
    fn size(&self) -> io::Result<u64>;
    /// Cut the sink back to `len` bytes.
    fn truncate(&mut self, len: u64) -> io::Result<()>;
    /// Make everything written so far durable.
    fn sync(&mut self) -> io::Result<()>;
}

impl JournalSink for File {
    fn size(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

// ── Journal Writer ──────────────────────────────────────────────────

/// Append-only journal writer.
///
/// Every batch is assembled in memory and handed to the sink in one write.
/// A batch that fails part way is cut off again, so bytes of a rejected
/// batch never precede a later one.
pub struct JournalWriter<S: JournalSink = File> {
    config: JournalConfig,
    sink: S,
    file_size: u64,
    torn_tail: bool,
}

impl JournalWriter {
    /// Open the journal for appending, creating the directory if needed.
    pub fn open(config: JournalConfig) -> Result<Self, JournalError> {
        fs::create_dir_all(&config.dir)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(config.journal_path())?;
        Self::with_sink(config, file)
    }

    pub fn path(&self) -> PathBuf {
        self.config.journal_path()
    }

    /// Read back every entry currently in the journal.
    pub fn read_all(&mut self) -> Result<Vec<JournalEntry>, JournalError> {
        self.repair_tail()?;
        read_journal(&self.config.journal_path())
    }

    /// Replace the journal with `entries`: written to a temporary file,
    /// synced, then renamed over the live one.
    pub fn rewrite(&mut self, entries: &[JournalEntry]) -> Result<(), JournalError> {
        let live = self.config.journal_path();
        let tmp = self.config.dir.join(format!("{JOURNAL_FILE}.tmp"));
        {
            let mut out = BufWriter::new(File::create(&tmp)?);
            for entry in entries {
                out.write_all(&entry.to_bytes()?)?;
            }
            out.flush()?;
            out.get_ref().sync_all()?;
        }
        fs::rename(&tmp, &live)?;

        let file = OpenOptions::new().append(true).open(&live)?;
        self.file_size = file.metadata()?.len();
        self.sink = file;
        self.torn_tail = false;
        Ok(())
    }
}

impl<S: JournalSink> JournalWriter<S> {
    fn with_sink(config: JournalConfig, sink: S) -> Result<Self, JournalError> {
        let file_size = sink.size()?;
        Ok(Self {
            config,
            sink,
            file_size,
            torn_tail: false,
        })
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Append a batch of entries as one write, then flush (and fsync per policy).
    ///
    /// On error the journal is left holding exactly the batches that
    /// succeeded before this one.
    pub fn append_batch(&mut self, entries: &[JournalEntry]) -> Result<(), JournalError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut buf = Vec::new();
        for entry in entries {
            buf.extend_from_slice(&entry.to_bytes()?);
        }
        self.repair_tail()?;

        match self.write_frames(&buf) {
            Ok(()) => {
                self.file_size += buf.len() as u64;
                Ok(())
            }
            Err(err) => {
                self.torn_tail = true;
                if let Err(cut) = self.repair_tail() {
                    warn!(error = %cut, size = self.file_size, "journal tail not truncated, retrying on next append");
                }
                Err(err.into())
            }
        }
    }

    fn write_frames(&mut self, buf: &[u8]) -> io::Result<()> {
        self.sink.write_all(buf)?;
        self.sink.flush()?;
        if self.config.fsync_policy == FsyncPolicy::EveryWrite {
            self.sink.sync()?;
        }
        Ok(())
    }

    /// Drop whatever a failed batch left past the last good entry
    fn repair_tail(&mut self) -> Result<(), JournalError> {
        if self.torn_tail {
            self.sink.truncate(self.file_size)?;
            self.torn_tail = false;
        }
        Ok(())
    }
}

/// Decode the journal at `path`; a missing file is an empty journal
pub fn read_journal(path: &Path) -> Result<Vec<JournalEntry>, JournalError> {
    let mut data = Vec::new();
    match File::open(path) {
        Ok(mut file) => {
            file.read_to_end(&mut data)?;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    }
    decode_entries(&data)
}

// ── Tests ───────────────────────────────────────────────────────────
