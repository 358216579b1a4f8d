//! Append-only mutation log.
//!
//! Every durable change to a store is one framed entry: either the full
//! new value of an aggregate (`put`) or its removal (`delete`). Replaying
//! the log from the start rebuilds the tables.

use crate::error::{Result, StoreError};
use crate::types::{AggregateKind, Timestamp};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Magic bytes for each log entry.
const ENTRY_MAGIC: &[u8; 4] = b"MUT\0";

/// Current log format version.
const LOG_VERSION: u8 = 1;

const OP_PUT: u8 = 0;
const OP_DELETE: u8 = 1;

/// What an entry does to its aggregate.
#[derive(Clone, Debug, PartialEq)]
pub enum LogOp {
    /// Full MessagePack-encoded value.
    Put(Vec<u8>),
    Delete,
}

/// One decoded log entry.
#[derive(Clone, Debug, PartialEq)]
pub struct LogEntry {
    pub seq: u64,
    pub timestamp: Timestamp,
    pub kind: AggregateKind,
    /// Raw aggregate id; always 0 for the settings singleton.
    pub id: u64,
    pub op: LogOp,
}

struct LogWriter {
    file: File,
    size: u64,
    next_seq: u64,
    writes_since_sync: u64,
}

/// Append-only mutation log.
pub struct MutationLog {
    path: PathBuf,
    writer: Mutex<LogWriter>,
    /// Sync every N writes (0 and 1 both mean every write).
    sync_interval: u64,
}

impl MutationLog {
    /// Default sync interval. Vocabulary edits are infrequent, so every
    /// write is synced unless configured otherwise.
    pub const DEFAULT_SYNC_INTERVAL: u64 = 1;

    /// Open or create a log with the default sync interval.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_sync_interval(path, Self::DEFAULT_SYNC_INTERVAL)
    }

    /// Open or create a log, syncing every `sync_interval` writes.
    pub fn open_with_sync_interval(path: impl AsRef<Path>, sync_interval: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;
        let mut size = file.metadata()?.len();

        let (entries, valid_len) = Self::scan(&file)?;
        if valid_len < size {
            tracing::warn!(
                path = %path.display(),
                dropped_bytes = size - valid_len,
                "truncating torn entry at end of mutation log"
            );
            file.set_len(valid_len)?;
            size = valid_len;
        }
        let next_seq = entries.last().map(|e| e.seq + 1).unwrap_or(1);

        Ok(Self {
            path,
            writer: Mutex::new(LogWriter {
                file,
                size,
                next_seq,
                writes_since_sync: 0,
            }),
            sync_interval: sync_interval.max(1),
        })
    }

    /// Append an entry, returning its sequence number.
    pub fn append(&self, kind: AggregateKind, id: u64, op: LogOp) -> Result<u64> {
        let mut writer = self.writer.lock();

        let entry = LogEntry {
            seq: writer.next_seq,
            timestamp: Timestamp::now(),
            kind,
            id,
            op,
        };

        let offset = writer.size;
        writer.file.seek(SeekFrom::Start(offset))?;
        let bytes = encode_entry(&entry);
        writer.file.write_all(&bytes)?;

        writer.size = offset + bytes.len() as u64;
        writer.next_seq += 1;

        writer.writes_since_sync += 1;
        if writer.writes_since_sync >= self.sync_interval {
            writer.file.sync_data()?;
            writer.writes_since_sync = 0;
        }

        Ok(entry.seq)
    }

    /// Encode a value and append it as a `put`.
    pub fn append_put<T: serde::Serialize>(&self, kind: AggregateKind, id: u64, value: &T) -> Result<u64> {
        let body = rmp_serde::to_vec_named(value)?;
        self.append(kind, id, LogOp::Put(body))
    }

    /// Force sync all pending writes to disk.
    pub fn sync(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.file.sync_all()?;
        writer.writes_since_sync = 0;
        Ok(())
    }

    /// Read every entry from the start of the log.
    ///
    /// A checksum mismatch or bad magic is an error. A torn trailing entry
    /// is cut off when the log is opened.
    pub fn entries(&self) -> Result<Vec<LogEntry>> {
        let writer = self.writer.lock();
        Self::scan(&writer.file).map(|(entries, _)| entries)
    }

    /// Current file size.
    pub fn size(&self) -> u64 {
        self.writer.lock().size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the log contents with `entries`, renumbered from 1.
    ///
    /// Writes to a sibling file first, then renames it over the log.
    pub fn rewrite(&self, entries: Vec<(AggregateKind, u64, LogOp)>) -> Result<()> {
        let mut writer = self.writer.lock();
        let tmp_path = self.path.with_extension("compact");

        let mut seq = 0;
        {
            let mut tmp = File::create(&tmp_path)?;
            for (kind, id, op) in entries {
                seq += 1;
                let entry = LogEntry {
                    seq,
                    timestamp: Timestamp::now(),
                    kind,
                    id,
                    op,
                };
                tmp.write_all(&encode_entry(&entry))?;
            }
            tmp.sync_all()?;
        }

        std::fs::rename(&tmp_path, &self.path)?;

        let file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        writer.size = file.metadata()?.len();
        writer.file = file;
        writer.next_seq = seq + 1;
        writer.writes_since_sync = 0;

        Ok(())
    }

    /// Decode entries from the start, returning them with the length of
    /// the valid prefix.
    fn scan(file: &File) -> Result<(Vec<LogEntry>, u64)> {
        let mut file = file.try_clone()?;
        let file_size = file.metadata()?.len();
        file.seek(SeekFrom::Start(0))?;
        let mut reader = BufReader::new(file);

        let mut entries = Vec::new();
        let mut position = 0u64;
        while position < file_size {
            match read_entry(&mut reader) {
                Ok((entry, len)) => {
                    position += len;
                    entries.push(entry);
                }
                Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }
        }

        Ok((entries, position))
    }
}

fn encode_entry(entry: &LogEntry) -> Vec<u8> {
    let (op_byte, body): (u8, &[u8]) = match &entry.op {
        LogOp::Put(body) => (OP_PUT, body),
        LogOp::Delete => (OP_DELETE, &[]),
    };

    let mut buf = Vec::with_capacity(4 + 1 + 8 + 8 + 1 + 8 + 1 + 4 + body.len() + 4);
    buf.extend_from_slice(ENTRY_MAGIC);
    buf.push(LOG_VERSION);
    buf.extend_from_slice(&entry.seq.to_le_bytes());
    buf.extend_from_slice(&entry.timestamp.0.to_le_bytes());
    buf.push(entry.kind.tag());
    buf.extend_from_slice(&entry.id.to_le_bytes());
    buf.push(op_byte);
    buf.extend_from_slice(&(body.len() as u32).to_le_bytes());
    buf.extend_from_slice(body);
    buf.extend_from_slice(&crc32fast::hash(body).to_le_bytes());
    buf
}

/// Read one entry, returning it with its encoded length.
fn read_entry(reader: &mut impl Read) -> Result<(LogEntry, u64)> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != ENTRY_MAGIC {
        return Err(StoreError::InvalidFormat("Invalid log entry magic".into()));
    }

    let mut version = [0u8; 1];
    reader.read_exact(&mut version)?;
    if version[0] != LOG_VERSION {
        return Err(StoreError::InvalidFormat(format!(
            "Unsupported log version: {}",
            version[0]
        )));
    }

    let mut u64_bytes = [0u8; 8];
    reader.read_exact(&mut u64_bytes)?;
    let seq = u64::from_le_bytes(u64_bytes);

    reader.read_exact(&mut u64_bytes)?;
    let timestamp = Timestamp(i64::from_le_bytes(u64_bytes));

    let mut kind_byte = [0u8; 1];
    reader.read_exact(&mut kind_byte)?;
    let kind = AggregateKind::from_tag(kind_byte[0]).ok_or_else(|| {
        StoreError::Corruption(format!("Unknown aggregate tag {} at seq {}", kind_byte[0], seq))
    })?;

    reader.read_exact(&mut u64_bytes)?;
    let id = u64::from_le_bytes(u64_bytes);

    let mut op_byte = [0u8; 1];
    reader.read_exact(&mut op_byte)?;

    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let body_len = u32::from_le_bytes(len_bytes) as usize;
    let mut body = vec![0u8; body_len];
    reader.read_exact(&mut body)?;

    let mut checksum_bytes = [0u8; 4];
    reader.read_exact(&mut checksum_bytes)?;
    let stored_checksum = u32::from_le_bytes(checksum_bytes);
    let computed_checksum = crc32fast::hash(&body);
    if stored_checksum != computed_checksum {
        return Err(StoreError::ChecksumMismatch {
            expected: stored_checksum,
            got: computed_checksum,
        });
    }

    let op = match op_byte[0] {
        OP_PUT => LogOp::Put(body),
        OP_DELETE => LogOp::Delete,
        other => {
            return Err(StoreError::Corruption(format!(
                "Unknown log op {} at seq {}",
                other, seq
            )))
        }
    };

    let len = (4 + 1 + 8 + 8 + 1 + 8 + 1 + 4 + body_len + 4) as u64;
    Ok((
        LogEntry {
            seq,
            timestamp,
            kind,
            id,
            op,
        },
        len,
    ))
}
