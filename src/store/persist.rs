//! JSON state-file helpers.
//!
//! Writes go to a temp file in the destination directory that is then
//! renamed over the target, so a crash mid-write never leaves a truncated
//! state file behind. Reads distinguish "missing", "corrupt" and "unreadable":
//! only the last one is an error.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::{StoreError, StoreResult};

/// Outcome of reading a JSON state file.
#[derive(Debug)]
pub(crate) enum Loaded<T> {
    /// The file parsed successfully.
    Value(T),
    /// The file does not exist yet.
    Missing,
    /// The file exists but is not valid JSON of the expected shape.
    Corrupt(String),
}

/// Read and parse `path`.
///
/// Permission errors and other I/O failures are returned as [`StoreError::Io`].
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> StoreResult<Loaded<T>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Loaded::Missing),
        // Non-UTF-8 bytes get the same treatment as a parse failure.
        Err(e) if e.kind() == io::ErrorKind::InvalidData => {
            return Ok(Loaded::Corrupt(e.to_string()))
        }
        Err(e) => return Err(StoreError::io(path, e)),
    };

    match serde_json::from_str(&content) {
        Ok(value) => Ok(Loaded::Value(value)),
        Err(e) => Ok(Loaded::Corrupt(e.to_string())),
    }
}

/// Serialize `value` as pretty JSON and atomically replace `path`.
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> StoreResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;

    let json = serde_json::to_string_pretty(value).map_err(|source| StoreError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
    if let Err(e) = write_and_sync(&mut tmp, json.as_bytes()) {
        return Err(StoreError::io(tmp.path(), e));
    }

    tmp.persist(path).map_err(|e| StoreError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    log::trace!("Wrote {}", path.display());
    Ok(())
}

fn write_and_sync(tmp: &mut NamedTempFile, bytes: &[u8]) -> io::Result<()> {
    tmp.write_all(bytes)?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()
}
