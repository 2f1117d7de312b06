//! Single-MAC vendor resolution.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::config::Config;
use crate::error::{OpenError, StoreError, StoreResult};
use crate::lookup::{LookupOutcome, LookupServicePool};
use crate::oui::OuiKey;
use crate::store::{CacheStore, CleanupStats, FailedLookupSet};
use crate::UNKNOWN_VENDOR;

/// What local state alone says about an OUI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalAnswer<'a> {
    /// The cache holds a vendor.
    Known(&'a str),
    /// The OUI is recorded as unresolvable.
    Failed,
    /// Nothing is known; a remote lookup would be needed.
    Miss,
}

/// Owns the cache, the failed-lookup set and the service pool.
///
/// Resolution order is cache, then failed set, then remote services. Remote
/// outcomes are written back: vendors into the cache, 404s and exhausted
/// lookups into the failed set.
#[derive(Debug)]
pub struct VendorResolver {
    cache: CacheStore,
    failed: FailedLookupSet,
    pool: LookupServicePool,
    offline: bool,
}

impl VendorResolver {
    /// Assemble a resolver from its parts.
    ///
    /// Failed entries that also have a cached vendor are dropped from the
    /// failed set; the cache wins. Nothing is written here; see
    /// [`VendorResolver::open`].
    #[must_use]
    pub fn new(
        cache: CacheStore,
        mut failed: FailedLookupSet,
        pool: LookupServicePool,
        offline: bool,
    ) -> Self {
        drop_known_failures(&cache, &mut failed);
        Self {
            cache,
            failed,
            pool,
            offline,
        }
    }

    /// Load state from `config.data_dir` and build an HTTP-backed pool.
    ///
    /// Failed entries dropped because the cache knows them are saved right
    /// away, so the files on disk agree again.
    ///
    /// # Errors
    ///
    /// Fails if a state file exists but cannot be read, or if the HTTP
    /// client cannot be created.
    pub fn open(config: &Config) -> Result<Self, OpenError> {
        let cache = CacheStore::load(config.cache_path(), config.flush_threshold)?;
        let failed = FailedLookupSet::load(config.failed_path())?;
        let pool = LookupServicePool::with_http(config.services.clone(), config.pool_settings())?;

        let loaded_failed = failed.len();
        let resolver = Self::new(cache, failed, pool, config.offline);
        if resolver.failed.len() < loaded_failed {
            resolver.failed.save()?;
        }

        log::info!(
            "Vendor resolver ready: {} cached, {} failed, {} services{}",
            resolver.cache.len(),
            resolver.failed.len(),
            resolver.pool.len(),
            if config.offline { " (offline)" } else { "" }
        );
        Ok(resolver)
    }

    /// Resolve a MAC address to a vendor name or [`UNKNOWN_VENDOR`].
    ///
    /// Malformed MACs resolve to [`UNKNOWN_VENDOR`] without any network use.
    ///
    /// # Errors
    ///
    /// Only persisting the outcome can fail.
    pub fn resolve_one(&mut self, mac: &str) -> StoreResult<String> {
        match OuiKey::from_mac(mac) {
            Ok(key) => self.resolve_key(&key),
            Err(e) => {
                log::debug!("{}", e);
                Ok(UNKNOWN_VENDOR.to_string())
            }
        }
    }

    /// Resolve an already normalized OUI.
    ///
    /// # Errors
    ///
    /// Only persisting the outcome can fail.
    pub fn resolve_key(&mut self, key: &OuiKey) -> StoreResult<String> {
        match self.lookup_local(key) {
            LocalAnswer::Known(vendor) => return Ok(vendor.to_string()),
            LocalAnswer::Failed => return Ok(UNKNOWN_VENDOR.to_string()),
            LocalAnswer::Miss => {}
        }

        if self.offline || self.pool.is_empty() {
            log::trace!("No remote lookup for {} (offline or no services)", key);
            return Ok(UNKNOWN_VENDOR.to_string());
        }

        match self.pool.resolve(key) {
            LookupOutcome::Found(vendor) => {
                self.remember(*key, &vendor)?;
                Ok(vendor)
            }
            LookupOutcome::NotFound | LookupOutcome::Exhausted => {
                self.mark_failed(*key)?;
                Ok(UNKNOWN_VENDOR.to_string())
            }
        }
    }

    /// Answer from local state only.
    #[must_use]
    pub fn lookup_local(&self, key: &OuiKey) -> LocalAnswer<'_> {
        if let Some(vendor) = self.cache.get(key) {
            LocalAnswer::Known(vendor)
        } else if self.failed.contains(key) {
            LocalAnswer::Failed
        } else {
            LocalAnswer::Miss
        }
    }

    /// Resolve a MAC from local state only.
    ///
    /// Returns `None` when a remote lookup would be required.
    #[must_use]
    pub fn resolve_local(&self, mac: &str) -> Option<String> {
        let Ok(key) = OuiKey::from_mac(mac) else {
            return Some(UNKNOWN_VENDOR.to_string());
        };
        match self.lookup_local(&key) {
            LocalAnswer::Known(vendor) => Some(vendor.to_string()),
            LocalAnswer::Failed => Some(UNKNOWN_VENDOR.to_string()),
            LocalAnswer::Miss => None,
        }
    }

    fn remember(&mut self, key: OuiKey, vendor: &str) -> StoreResult<()> {
        self.cache.put(key, vendor);
        if self.failed.remove(&key) {
            self.failed.save()?;
        }
        self.cache.flush(false)?;
        Ok(())
    }

    fn mark_failed(&mut self, key: OuiKey) -> StoreResult<()> {
        if self.failed.add(key) {
            self.failed.save()?;
        }
        Ok(())
    }

    /// Seed the cache from a Wireshark `manuf` file and save both stores.
    ///
    /// Existing cache entries win over the file. OUIs the import makes known
    /// are dropped from the failed set.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` cannot be read or state cannot be saved.
    pub fn import_manuf(&mut self, path: &Path) -> StoreResult<usize> {
        let file = File::open(path).map_err(|e| StoreError::io(path, e))?;
        let added = self
            .cache
            .import_manuf(BufReader::new(file))
            .map_err(|e| StoreError::io(path, e))?;
        if drop_known_failures(&self.cache, &mut self.failed) > 0 {
            self.failed.save()?;
        }
        self.flush()?;
        Ok(added)
    }

    /// Force the cache to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache file cannot be written.
    pub fn flush(&mut self) -> StoreResult<()> {
        self.cache.flush(true).map(|_| ())
    }

    /// Tidy vendor names in the cache and save it.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache file cannot be written.
    pub fn cleanup_cache(&mut self) -> StoreResult<CleanupStats> {
        let stats = self.cache.sanitize();
        self.cache.flush(true)?;
        log::info!(
            "Cache cleanup: {} entries, {} renamed, {} dropped",
            stats.entries_before,
            stats.rewritten,
            stats.dropped
        );
        Ok(stats)
    }

    /// The vendor cache.
    #[must_use]
    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// The failed-lookup set.
    #[must_use]
    pub fn failed(&self) -> &FailedLookupSet {
        &self.failed
    }

    /// The remote service pool.
    #[must_use]
    pub fn pool(&self) -> &LookupServicePool {
        &self.pool
    }

    /// Whether remote lookups are disabled.
    #[must_use]
    pub fn is_offline(&self) -> bool {
        self.offline
    }
}

/// Remove failed entries the cache has a vendor for. Returns how many.
fn drop_known_failures(cache: &CacheStore, failed: &mut FailedLookupSet) -> usize {
    let stale: Vec<OuiKey> = failed
        .iter()
        .filter(|key| cache.contains(key))
        .copied()
        .collect();
    for key in &stale {
        failed.remove(key);
    }
    if !stale.is_empty() {
        log::debug!(
            "Dropped {} failed-lookup entries that have cached vendors",
            stale.len()
        );
    }
    stale.len()
}
