//! Whole-state document store with integrity and compression
//!
//! The worker persists its entire state as one document after every applied
//! command, so the newest document on disk is always a consistent image
//! taken between commands. Documents carry a SHA-256 hash of the serialized
//! state and are written atomically (tmp file, fsync, rename); a torn write
//! can therefore never replace a good document.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Current document format version.
pub const DOCUMENT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Integrity check failed: expected {expected}, got {actual}")]
    IntegrityFailure { expected: String, actual: String },

    #[error("Unsupported document version: {0}")]
    UnsupportedVersion(u32),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("No documents found")]
    NoDocuments,
}

/// One persisted state document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Document<T> {
    version: u32,
    /// Journal sequence of the last command applied to this state.
    sequence: u64,
    state: T,
    /// SHA-256 hex digest of the bincode-serialized state.
    checksum: String,
}

fn state_hash<T: Serialize>(state: &T) -> Result<String, StoreError> {
    let bytes =
        bincode::serialize(state).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Writes and loads state documents in a directory, newest first.
pub struct DocumentStore<T> {
    dir: PathBuf,
    compress: bool,
    keep_last: usize,
    _marker: PhantomData<T>,
}

impl<T: Serialize + DeserializeOwned> DocumentStore<T> {
    /// Create a store in `dir`. `compress` enables zstd; `keep_last` bounds
    /// how many documents survive each write (minimum 1).
    pub fn new(dir: impl Into<PathBuf>, compress: bool, keep_last: usize) -> Self {
        Self {
            dir: dir.into(),
            compress,
            keep_last: keep_last.max(1),
            _marker: PhantomData,
        }
    }

    /// Write a document atomically: serialize, compress, tmp + fsync +
    /// rename. Older documents beyond `keep_last` are removed afterwards.
    pub fn write(&self, sequence: u64, state: &T) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.dir)?;

        let document = Document {
            version: DOCUMENT_VERSION,
            sequence,
            checksum: state_hash(state)?,
            state,
        };
        let data = bincode::serialize(&document)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let (final_data, ext) = if self.compress {
            let compressed = zstd::encode_all(data.as_slice(), 3)
                .map_err(|e| StoreError::Compression(e.to_string()))?;
            (compressed, "doc.zst")
        } else {
            (data, "doc")
        };

        let filename = format!("state-{sequence:012}.{ext}");
        let path = self.dir.join(&filename);
        let tmp_path = self.dir.join(format!("{filename}.tmp"));

        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&final_data)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;

        self.cleanup()?;
        Ok(path)
    }

    /// Load the newest document. Ok(None) when the directory holds none.
    pub fn load_latest(&self) -> Result<Option<(u64, T)>, StoreError> {
        let mut documents = self.list()?;
        let (sequence, path) = match documents.pop() {
            Some(latest) => latest,
            None => return Ok(None),
        };
        let state = self.load(&path)?;
        Ok(Some((sequence, state)))
    }

    /// Load and verify one document file.
    pub fn load(&self, path: &Path) -> Result<T, StoreError> {
        let mut file = File::open(path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        let compressed = path.to_string_lossy().ends_with(".doc.zst");
        let raw = if compressed {
            zstd::decode_all(data.as_slice())
                .map_err(|e| StoreError::Compression(e.to_string()))?
        } else {
            data
        };

        let document: Document<T> =
            bincode::deserialize(&raw).map_err(|e| StoreError::Serialization(e.to_string()))?;

        if document.version > DOCUMENT_VERSION {
            return Err(StoreError::UnsupportedVersion(document.version));
        }
        let actual = state_hash(&document.state)?;
        if actual != document.checksum {
            return Err(StoreError::IntegrityFailure {
                expected: document.checksum,
                actual,
            });
        }
        Ok(document.state)
    }

    /// All documents as (sequence, path), ascending by sequence.
    pub fn list(&self) -> Result<Vec<(u64, PathBuf)>, StoreError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut results = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with("state-") && (name.ends_with(".doc") || name.ends_with(".doc.zst"))
            {
                if let Some(sequence) = parse_sequence(&name) {
                    results.push((sequence, entry.path()));
                }
            }
        }
        results.sort_by_key(|(sequence, _)| *sequence);
        Ok(results)
    }

    fn cleanup(&self) -> Result<(), StoreError> {
        let documents = self.list()?;
        if documents.len() > self.keep_last {
            let excess = documents.len() - self.keep_last;
            for (_, path) in documents.iter().take(excess) {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

fn parse_sequence(filename: &str) -> Option<u64> {
    filename
        .trim_start_matches("state-")
        .trim_end_matches(".doc.zst")
        .trim_end_matches(".doc")
        .parse::<u64>()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct FakeState {
        balances: BTreeMap<String, u64>,
    }

    fn sample_state() -> FakeState {
        let mut balances = BTreeMap::new();
        balances.insert("alice".into(), 50_000);
        balances.insert("bob".into(), 20_000);
        FakeState { balances }
    }

    #[test]
    fn test_write_and_load_latest() {
        let tmp = TempDir::new().unwrap();
        let store: DocumentStore<FakeState> = DocumentStore::new(tmp.path(), false, 3);

        store.write(7, &sample_state()).unwrap();
        let (sequence, state) = store.load_latest().unwrap().unwrap();
        assert_eq!(sequence, 7);
        assert_eq!(state, sample_state());
    }

    #[test]
    fn test_compressed_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store: DocumentStore<FakeState> = DocumentStore::new(tmp.path(), true, 3);

        let path = store.write(1, &sample_state()).unwrap();
        assert!(path.to_string_lossy().ends_with(".doc.zst"));
        assert_eq!(store.load(&path).unwrap(), sample_state());
    }

    #[test]
    fn test_load_latest_picks_highest_sequence() {
        let tmp = TempDir::new().unwrap();
        let store: DocumentStore<FakeState> = DocumentStore::new(tmp.path(), false, 10);

        for sequence in [3u64, 9, 5] {
            let mut state = sample_state();
            state.balances.insert("seq".into(), sequence);
            store.write(sequence, &state).unwrap();
        }
        let (sequence, state) = store.load_latest().unwrap().unwrap();
        assert_eq!(sequence, 9);
        assert_eq!(state.balances["seq"], 9);
    }

    #[test]
    fn test_cleanup_keeps_last_n() {
        let tmp = TempDir::new().unwrap();
        let store: DocumentStore<FakeState> = DocumentStore::new(tmp.path(), false, 2);

        for sequence in 1..=5 {
            store.write(sequence, &sample_state()).unwrap();
        }
        let remaining = store.list().unwrap();
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0].0, 4);
        assert_eq!(remaining[1].0, 5);
    }

    #[test]
    fn test_tamper_detected() {
        let tmp = TempDir::new().unwrap();
        let store: DocumentStore<FakeState> = DocumentStore::new(tmp.path(), false, 3);
        let path = store.write(1, &sample_state()).unwrap();

        let mut data = fs::read(&path).unwrap();
        let mid = data.len() / 2;
        data[mid] ^= 0xff;
        fs::write(&path, &data).unwrap();

        // Either the document no longer parses or the hash disagrees.
        assert!(store.load(&path).is_err());
    }

    #[test]
    fn test_empty_store() {
        let tmp = TempDir::new().unwrap();
        let store: DocumentStore<FakeState> = DocumentStore::new(tmp.path(), false, 3);
        assert!(store.load_latest().unwrap().is_none());
    }
}
