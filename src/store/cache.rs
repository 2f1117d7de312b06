//! Persistent OUI -> vendor cache.

use std::collections::BTreeMap;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use crate::error::StoreResult;
use crate::oui::OuiKey;
use crate::store::persist::{read_json, write_json_atomic, Loaded};

/// Default number of writes accumulated before a lazy flush hits the disk.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 50;

/// Summary of a [`CacheStore::sanitize`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupStats {
    /// Entries before the pass.
    pub entries_before: usize,
    /// Entries whose vendor name was rewritten.
    pub rewritten: usize,
    /// Entries dropped because nothing was left of the vendor name.
    pub dropped: usize,
}

/// In-memory vendor cache backed by a JSON object on disk.
///
/// Writes are batched: [`put`](Self::put) only bumps a counter and
/// [`flush`](Self::flush) rewrites the file once enough writes accumulate.
#[derive(Debug)]
pub struct CacheStore {
    path: PathBuf,
    entries: BTreeMap<OuiKey, String>,
    pending_writes: usize,
    flush_threshold: usize,
}

impl CacheStore {
    /// An empty cache that will persist to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, flush_threshold: usize) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
            pending_writes: 0,
            flush_threshold: flush_threshold.max(1),
        }
    }

    /// Load the cache from `path`.
    ///
    /// A missing file yields an empty cache. A corrupt file is logged and
    /// also yields an empty cache. Keys are re-normalized; entries with
    /// unparseable keys or empty vendors are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error only when the file exists but cannot be read.
    pub fn load(path: impl Into<PathBuf>, flush_threshold: usize) -> StoreResult<Self> {
        let mut store = Self::new(path, flush_threshold);

        let raw: BTreeMap<String, String> = match read_json(&store.path)? {
            Loaded::Value(raw) => raw,
            Loaded::Missing => {
                log::debug!("No vendor cache at {}, starting empty", store.path.display());
                return Ok(store);
            }
            Loaded::Corrupt(e) => {
                log::warn!(
                    "Could not load vendor cache {} ({}), starting with an empty cache",
                    store.path.display(),
                    e
                );
                return Ok(store);
            }
        };

        let mut skipped = 0usize;
        for (raw_key, vendor) in raw {
            match raw_key.parse::<OuiKey>() {
                Ok(key) if !vendor.trim().is_empty() => {
                    store.entries.insert(key, vendor);
                }
                _ => skipped += 1,
            }
        }
        if skipped > 0 {
            log::warn!(
                "Skipped {} invalid entries while loading {}",
                skipped,
                store.path.display()
            );
        }

        log::debug!(
            "Loaded {} cached vendors from {}",
            store.entries.len(),
            store.path.display()
        );
        Ok(store)
    }

    /// Cached vendor for `key`.
    #[must_use]
    pub fn get(&self, key: &OuiKey) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Whether `key` has a cached vendor.
    #[must_use]
    pub fn contains(&self, key: &OuiKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or overwrite a mapping.
    ///
    /// Returns `false` (and stores nothing) for a blank vendor name.
    pub fn put(&mut self, key: OuiKey, vendor: impl Into<String>) -> bool {
        let vendor = vendor.into();
        if vendor.trim().is_empty() {
            log::warn!("Refusing to cache empty vendor name for {}", key);
            return false;
        }
        self.entries.insert(key, vendor);
        self.pending_writes += 1;
        true
    }

    /// Write the cache to disk if forced or if enough writes are pending.
    ///
    /// Every key is written, sorted. Returns whether a write happened.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn flush(&mut self, force: bool) -> StoreResult<bool> {
        if !force && self.pending_writes < self.flush_threshold {
            return Ok(false);
        }
        write_json_atomic(&self.path, &self.entries)?;
        log::debug!(
            "Flushed {} cached vendors to {} ({} pending writes)",
            self.entries.len(),
            self.path.display(),
            self.pending_writes
        );
        self.pending_writes = 0;
        Ok(true)
    }

    /// Tidy vendor names in place.
    ///
    /// Collapses internal whitespace and trims stray separators from the
    /// ends of each name. Keys are never merged, even when two OUIs end up
    /// sharing a vendor.
    pub fn sanitize(&mut self) -> CleanupStats {
        let mut stats = CleanupStats {
            entries_before: self.entries.len(),
            ..CleanupStats::default()
        };

        self.entries.retain(|key, vendor| {
            let clean = sanitize_vendor(vendor);
            if clean.is_empty() {
                log::debug!("Dropping {} with blank vendor after cleanup", key);
                stats.dropped += 1;
                return false;
            }
            if clean != *vendor {
                *vendor = clean;
                stats.rewritten += 1;
            }
            true
        });

        self.pending_writes += stats.rewritten + stats.dropped;
        stats
    }

    /// Seed the cache from a Wireshark `manuf` database.
    ///
    /// Lines look like `00:00:0C<TAB>Cisco<TAB>Cisco Systems, Inc`. The long
    /// name in the third column is preferred; the short name is used when it
    /// is missing. Comments, masked sub-block prefixes (`/28`, `/36`) and
    /// unparseable rows are skipped. Existing entries are never overwritten.
    ///
    /// Returns the number of OUIs added. Nothing is written until the next
    /// [`flush`](Self::flush).
    ///
    /// # Errors
    ///
    /// Returns an error if `reader` fails.
    pub fn import_manuf<R: BufRead>(&mut self, reader: R) -> io::Result<usize> {
        let mut added = 0usize;
        let mut kept = 0usize;
        let mut skipped = 0usize;

        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, vendor)) = parse_manuf_line(line) else {
                skipped += 1;
                continue;
            };
            if self.entries.contains_key(&key) {
                kept += 1;
                continue;
            }
            self.entries.insert(key, vendor);
            added += 1;
        }

        self.pending_writes += added;
        log::info!(
            "Imported {} vendors from manuf data ({} already cached, {} skipped)",
            added,
            kept,
            skipped
        );
        Ok(added)
    }

    /// All OUIs whose vendor matches `vendor`, ignoring case.
    #[must_use]
    pub fn ouis_for_vendor(&self, vendor: &str) -> Vec<OuiKey> {
        self.entries
            .iter()
            .filter(|(_, v)| v.eq_ignore_ascii_case(vendor))
            .map(|(k, _)| *k)
            .collect()
    }

    /// Iterate over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&OuiKey, &str)> {
        self.entries.iter().map(|(k, v)| (k, v.as_str()))
    }

    /// Number of cached vendors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes accumulated since the last flush.
    #[must_use]
    pub fn pending_writes(&self) -> usize {
        self.pending_writes
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// One `manuf` row as a cache entry. `None` for masked or malformed rows.
fn parse_manuf_line(line: &str) -> Option<(OuiKey, String)> {
    let mut columns = line.split('\t').map(str::trim);
    let prefix = columns.next()?;
    if prefix.contains('/') {
        return None;
    }
    let key = prefix.parse::<OuiKey>().ok()?;
    let short = columns.next().filter(|s| !s.is_empty())?;
    let long = columns
        .next()
        .map(|s| s.trim_start_matches('#').trim())
        .filter(|s| !s.is_empty());
    let vendor = sanitize_vendor(long.unwrap_or(short));
    (!vendor.is_empty()).then_some((key, vendor))
}

/// Normalize whitespace and punctuation noise in a vendor name.
fn sanitize_vendor(name: &str) -> String {
    let collapsed = name.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_matches(|c: char| matches!(c, ',' | ';' | ':' | '-' | '"' | '\'') || c.is_whitespace())
        .to_string()
}
