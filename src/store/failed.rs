//! Persistent set of OUIs that no lookup service could resolve.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::StoreResult;
use crate::oui::OuiKey;
use crate::store::persist::{read_json, write_json_atomic, Loaded};

/// OUIs known to have no resolvable vendor, stored as a JSON array.
#[derive(Debug)]
pub struct FailedLookupSet {
    path: PathBuf,
    keys: BTreeSet<OuiKey>,
}

impl FailedLookupSet {
    /// An empty set that will persist to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            keys: BTreeSet::new(),
        }
    }

    /// Load the set from `path`, tolerating a missing or corrupt file.
    ///
    /// # Errors
    ///
    /// Returns an error only when the file exists but cannot be read.
    pub fn load(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let mut set = Self::new(path);

        let raw: Vec<String> = match read_json(&set.path)? {
            Loaded::Value(raw) => raw,
            Loaded::Missing => return Ok(set),
            Loaded::Corrupt(e) => {
                log::warn!(
                    "Could not load failed lookups {} ({}), starting empty",
                    set.path.display(),
                    e
                );
                return Ok(set);
            }
        };

        set.keys = raw.iter().filter_map(|s| s.parse().ok()).collect();
        if set.keys.len() < raw.len() {
            log::debug!(
                "Ignored {} unparseable or duplicate failed-lookup entries",
                raw.len() - set.keys.len()
            );
        }
        Ok(set)
    }

    /// Whether `key` is recorded as failed.
    #[must_use]
    pub fn contains(&self, key: &OuiKey) -> bool {
        self.keys.contains(key)
    }

    /// Record `key` as failed. Returns `true` if it was not already present.
    pub fn add(&mut self, key: OuiKey) -> bool {
        self.keys.insert(key)
    }

    /// Forget a failure, e.g. once the OUI has been resolved after all.
    pub fn remove(&mut self, key: &OuiKey) -> bool {
        self.keys.remove(key)
    }

    /// Rewrite the whole file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self) -> StoreResult<()> {
        write_json_atomic(&self.path, &self.keys)
    }

    /// Number of failed OUIs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no failures are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Iterate over failed OUIs in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &OuiKey> {
        self.keys.iter()
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
