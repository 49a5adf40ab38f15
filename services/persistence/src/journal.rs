//! Append-only record journal with checksums and an ack cursor
//!
//! Commands are journaled before they are handed to the worker, and the
//! ack cursor advances only after a command's effects are durably
//! snapshotted. Records past the cursor are redelivered on startup, which
//! gives the pipeline at-least-once delivery; the worker's idempotency
//! window absorbs the duplicates.
//!
//! # Binary format (per record)
//! ```text
//! [payload_len: u32][payload: JSON bytes][checksum: u32]  // CRC32C over payload
//! ```
//!
//! The cursor lives in a sidecar file holding the count of acknowledged
//! records as a little-endian u64, replaced atomically on every ack.

use crc32c::crc32c;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use thiserror::Error;

const JOURNAL_FILE: &str = "journal.bin";
const ACK_FILE: &str = "journal.ack";

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Checksum mismatch in record {seq}")]
    Corrupt { seq: u64 },

    #[error("Ack cursor {cursor} ahead of journal length {len}")]
    CursorOutOfRange { cursor: u64, len: u64 },
}

/// Append-only journal of records of type `T`, JSON-encoded with a CRC32C
/// checksum per record.
pub struct Journal<T> {
    dir: PathBuf,
    file: File,
    len: u64,
    acked: u64,
    _marker: PhantomData<T>,
}

impl<T: Serialize + DeserializeOwned> Journal<T> {
    /// Open (or create) the journal in `dir`.
    ///
    /// Scans existing records to establish the length. A partially written
    /// trailing record from a crash mid-append is truncated away; a
    /// checksum mismatch in the interior is reported as corruption.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, JournalError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let path = dir.join(JOURNAL_FILE);

        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        let (len, valid_bytes) = scan_records(&data)?;
        if valid_bytes < data.len() {
            // Crash mid-append left a partial record at the tail.
            let file = OpenOptions::new().write(true).open(&path)?;
            file.set_len(valid_bytes as u64)?;
            file.sync_all()?;
        }

        let acked = read_cursor(&dir.join(ACK_FILE))?;
        if acked > len {
            return Err(JournalError::CursorOutOfRange { cursor: acked, len });
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            dir,
            file,
            len,
            acked,
            _marker: PhantomData,
        })
    }

    /// Append a record durably. Returns its sequence number.
    pub fn append(&mut self, record: &T) -> Result<u64, JournalError> {
        let payload =
            serde_json::to_vec(record).map_err(|e| JournalError::Serialization(e.to_string()))?;

        let mut buf = Vec::with_capacity(4 + payload.len() + 4);
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&payload);
        buf.extend_from_slice(&crc32c(&payload).to_le_bytes());

        self.file.write_all(&buf)?;
        self.file.sync_all()?;

        let seq = self.len;
        self.len += 1;
        Ok(seq)
    }

    /// All records past the ack cursor, oldest first.
    pub fn unacked(&self) -> Result<Vec<(u64, T)>, JournalError> {
        let data = fs::read(self.dir.join(JOURNAL_FILE))?;
        let mut records = Vec::new();
        let mut offset = 0usize;
        let mut seq = 0u64;
        while offset < data.len() {
            let (payload, next) = match next_record(&data, offset, seq)? {
                Some(found) => found,
                None => break,
            };
            if seq >= self.acked {
                let record = serde_json::from_slice(payload)
                    .map_err(|e| JournalError::Serialization(e.to_string()))?;
                records.push((seq, record));
            }
            offset = next;
            seq += 1;
        }
        Ok(records)
    }

    /// Advance the ack cursor past `seq`. The cursor never moves backwards.
    pub fn ack(&mut self, seq: u64) -> Result<(), JournalError> {
        let cursor = seq + 1;
        if cursor > self.len {
            return Err(JournalError::CursorOutOfRange {
                cursor,
                len: self.len,
            });
        }
        if cursor <= self.acked {
            return Ok(());
        }
        write_cursor(&self.dir, cursor)?;
        self.acked = cursor;
        Ok(())
    }

    /// Total records ever appended.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Records acknowledged so far.
    pub fn acked(&self) -> u64 {
        self.acked
    }
}

/// Count complete, checksum-valid records. Returns (count, valid byte
/// length). A truncated tail is not an error; a bad checksum is.
fn scan_records(data: &[u8]) -> Result<(u64, usize), JournalError> {
    let mut offset = 0usize;
    let mut seq = 0u64;
    while offset < data.len() {
        match next_record(data, offset, seq)? {
            Some((_, next)) => {
                offset = next;
                seq += 1;
            }
            None => break,
        }
    }
    Ok((seq, offset))
}

/// Parse the record starting at `offset`. Returns the payload slice and the
/// offset of the next record, or None if the record is incomplete.
fn next_record(data: &[u8], offset: usize, seq: u64) -> Result<Option<(&[u8], usize)>, JournalError> {
    if data.len() - offset < 4 {
        return Ok(None);
    }
    let payload_len =
        u32::from_le_bytes(data[offset..offset + 4].try_into().expect("4-byte slice")) as usize;
    let total = 4 + payload_len + 4;
    if data.len() - offset < total {
        return Ok(None);
    }
    let payload = &data[offset + 4..offset + 4 + payload_len];
    let stored = u32::from_le_bytes(
        data[offset + 4 + payload_len..offset + total]
            .try_into()
            .expect("4-byte slice"),
    );
    if crc32c(payload) != stored {
        return Err(JournalError::Corrupt { seq });
    }
    Ok(Some((payload, offset + total)))
}

fn read_cursor(path: &Path) -> Result<u64, JournalError> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };
    let mut buf = [0u8; 8];
    file.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn write_cursor(dir: &Path, cursor: u64) -> Result<(), JournalError> {
    let tmp = dir.join(format!("{ACK_FILE}.tmp"));
    {
        let mut file = File::create(&tmp)?;
        file.write_all(&cursor.to_le_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp, dir.join(ACK_FILE))?;
    Ok(())
}
