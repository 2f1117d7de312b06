//! Input file change detection.
//!
//! # Overview
//!
//! Device dumps can be several gigabytes, so a file is fingerprinted by its
//! size, its modification time, and a BLAKE3 hash over the first and last
//! [`WINDOW_SIZE`] bytes only. Changes confined to the middle of a large file
//! are not detected. Dumps grow or get truncated at the ends, which this
//! catches.
//!
//! [`ProcessedFiles`] keeps the fingerprint of every fully processed input
//! in `processed_files.json`, keyed by path.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::store::persist::{read_json, write_json_atomic, Loaded};

/// Bytes hashed at each end of the file (1 MiB).
pub const WINDOW_SIZE: u64 = 1024 * 1024;

/// Lightweight identity of a file's content at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileFingerprint {
    /// Size in bytes.
    pub size: u64,
    /// Modification time, seconds since the Unix epoch.
    pub mtime: f64,
    /// BLAKE3 hex digest of the head and tail windows.
    pub hash: String,
}

impl FileFingerprint {
    /// Fingerprint the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened, read or stat'ed.
    pub fn compute(path: &Path) -> io::Result<Self> {
        let mut file = File::open(path)?;
        let metadata = file.metadata()?;
        let size = metadata.len();
        let mtime = metadata
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        let mut hasher = blake3::Hasher::new();
        let mut buffer = Vec::with_capacity(WINDOW_SIZE.min(size) as usize);

        // Head window.
        (&mut file).take(WINDOW_SIZE).read_to_end(&mut buffer)?;
        hasher.update(&buffer);

        // Tail window. Overlaps the head for files under two windows.
        buffer.clear();
        file.seek(SeekFrom::Start(size.saturating_sub(WINDOW_SIZE)))?;
        file.take(WINDOW_SIZE).read_to_end(&mut buffer)?;
        hasher.update(&buffer);

        Ok(Self {
            size,
            mtime,
            hash: hasher.finalize().to_hex().to_string(),
        })
    }

    /// Whether `path` differs from a previously recorded fingerprint.
    ///
    /// A missing `previous` always counts as changed, as does a file that can
    /// no longer be fingerprinted.
    #[must_use]
    pub fn changed(path: &Path, previous: Option<&FileFingerprint>) -> bool {
        let Some(previous) = previous else {
            return true;
        };
        match Self::compute(path) {
            Ok(current) => current != *previous,
            Err(e) => {
                log::debug!("Cannot fingerprint {}: {}", path.display(), e);
                true
            }
        }
    }
}

/// A fingerprint together with when it was recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRecord {
    #[serde(flatten)]
    pub fingerprint: FileFingerprint,
    /// When processing finished.
    #[serde(default = "Utc::now")]
    pub processed_at: DateTime<Utc>,
}

/// Persistent `path -> fingerprint` map of fully processed inputs.
#[derive(Debug)]
pub struct ProcessedFiles {
    path: PathBuf,
    records: BTreeMap<String, ProcessedRecord>,
}

impl ProcessedFiles {
    /// An empty record set persisting to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: BTreeMap::new(),
        }
    }

    /// Load records from `path`, tolerating a missing or corrupt file.
    ///
    /// # Errors
    ///
    /// Returns an error only when the file exists but cannot be read.
    pub fn load(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let mut files = Self::new(path);
        match read_json(&files.path)? {
            Loaded::Value(records) => files.records = records,
            Loaded::Missing => {}
            Loaded::Corrupt(e) => log::warn!(
                "Could not load processed-file records {} ({}), treating all inputs as new",
                files.path.display(),
                e
            ),
        }
        Ok(files)
    }

    /// Recorded fingerprint for `input`, if any.
    #[must_use]
    pub fn get(&self, input: &Path) -> Option<&ProcessedRecord> {
        self.records.get(&record_key(input))
    }

    /// Whether `input` needs processing.
    #[must_use]
    pub fn has_changed(&self, input: &Path) -> bool {
        FileFingerprint::changed(input, self.get(input).map(|r| &r.fingerprint))
    }

    /// Whether `fingerprint` is what was recorded for `input`.
    #[must_use]
    pub fn is_recorded(&self, input: &Path, fingerprint: &FileFingerprint) -> bool {
        self.get(input).is_some_and(|r| r.fingerprint == *fingerprint)
    }

    /// Fingerprint `input` now and persist it as processed.
    ///
    /// Call only after the file was fully and successfully processed. When the
    /// file may have changed while it was being processed, use
    /// [`ProcessedFiles::record_fingerprint`] with the fingerprint taken
    /// before reading it.
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be fingerprinted or the record
    /// file cannot be written.
    pub fn record(&mut self, input: &Path) -> StoreResult<()> {
        let fingerprint = FileFingerprint::compute(input).map_err(|e| StoreError::io(input, e))?;
        self.record_fingerprint(input, fingerprint)
    }

    /// Persist a previously computed fingerprint for `input`.
    ///
    /// # Errors
    ///
    /// Returns an error if the record file cannot be written.
    pub fn record_fingerprint(
        &mut self,
        input: &Path,
        fingerprint: FileFingerprint,
    ) -> StoreResult<()> {
        log::debug!(
            "Recording {} as processed ({} bytes, hash {})",
            input.display(),
            fingerprint.size,
            &fingerprint.hash[..12]
        );
        self.records.insert(
            record_key(input),
            ProcessedRecord {
                fingerprint,
                processed_at: Utc::now(),
            },
        );
        self.save()
    }

    /// Drop the record for `input`, forcing reprocessing next time.
    ///
    /// # Errors
    ///
    /// Returns an error if the record file cannot be written.
    pub fn forget(&mut self, input: &Path) -> StoreResult<bool> {
        let removed = self.records.remove(&record_key(input)).is_some();
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    /// Rewrite the record file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self) -> StoreResult<()> {
        write_json_atomic(&self.path, &self.records)
    }

    /// Number of recorded inputs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn record_key(input: &Path) -> String {
    input.to_string_lossy().into_owned()
}
