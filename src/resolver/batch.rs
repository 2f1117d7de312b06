//! Resolving many MACs at once.
//!
//! Local answers (cache, failed set, malformed input) are settled first.
//! The remaining OUIs are grouped so each one costs at most one remote
//! resolution, then looked up one at a time so the per-service spacing
//! holds across the whole batch.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::error::StoreResult;
use crate::oui::OuiKey;
use crate::progress::{ProgressCallback, PHASE_LOOKUP};
use crate::UNKNOWN_VENDOR;

use super::vendor::{LocalAnswer, VendorResolver};

/// Where the answers in a batch came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Distinct MAC strings in the batch.
    pub total: usize,
    /// MACs answered from the cache.
    pub cache_hits: usize,
    /// MACs answered from the failed-lookup set.
    pub failed_hits: usize,
    /// MACs that could not be normalized.
    pub invalid: usize,
    /// Distinct OUIs that needed a remote resolution.
    pub remote_lookups: usize,
    /// Of those, how many produced a vendor.
    pub remote_found: usize,
}

/// Vendors for a batch, keyed by the MAC strings as given.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub vendors: BTreeMap<String, String>,
    pub stats: BatchStats,
}

impl BatchResult {
    /// Vendor for `mac`, if it was part of the batch.
    #[must_use]
    pub fn vendor(&self, mac: &str) -> Option<&str> {
        self.vendors.get(mac).map(String::as_str)
    }
}

/// Batch front-end over a [`VendorResolver`].
pub struct BatchResolver<'a> {
    resolver: &'a mut VendorResolver,
    progress: Option<Arc<dyn ProgressCallback>>,
}

impl<'a> BatchResolver<'a> {
    #[must_use]
    pub fn new(resolver: &'a mut VendorResolver) -> Self {
        Self {
            resolver,
            progress: None,
        }
    }

    /// Report lookup progress to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Resolve every MAC, using remote services for local misses.
    ///
    /// The cache is flushed (subject to its threshold) as vendors arrive;
    /// call [`VendorResolver::flush`] afterwards to force the remainder out.
    ///
    /// # Errors
    ///
    /// Only persisting an outcome can fail.
    pub fn resolve_batch<S: AsRef<str>>(&mut self, macs: &[S]) -> StoreResult<BatchResult> {
        let (mut result, pending) = self.partition(macs);
        if pending.is_empty() {
            return Ok(result);
        }

        log::info!(
            "{} of {} OUIs need remote lookup",
            pending.len(),
            result.stats.total
        );
        if let Some(ref progress) = self.progress {
            progress.on_phase_start(PHASE_LOOKUP, pending.len());
        }

        for (index, (key, members)) in pending.into_iter().enumerate() {
            if let Some(ref progress) = self.progress {
                progress.on_progress(index + 1, key.as_str());
            }

            let vendor = self.resolver.resolve_key(&key)?;
            result.stats.remote_lookups += 1;
            if vendor != UNKNOWN_VENDOR {
                result.stats.remote_found += 1;
            }
            for mac in members {
                result.vendors.insert(mac, vendor.clone());
            }
        }

        if let Some(ref progress) = self.progress {
            progress.on_phase_end(PHASE_LOOKUP);
        }
        Ok(result)
    }

    /// Resolve from local state only; misses become [`UNKNOWN_VENDOR`].
    #[must_use]
    pub fn resolve_known_only<S: AsRef<str>>(&self, macs: &[S]) -> BatchResult {
        let (mut result, pending) = self.partition(macs);
        for mac in pending.into_values().flatten() {
            result.vendors.insert(mac, UNKNOWN_VENDOR.to_string());
        }
        result
    }

    /// Settle everything local state can answer; group the rest by OUI.
    fn partition<S: AsRef<str>>(
        &self,
        macs: &[S],
    ) -> (BatchResult, BTreeMap<OuiKey, Vec<String>>) {
        let mut result = BatchResult::default();
        let mut pending: BTreeMap<OuiKey, Vec<String>> = BTreeMap::new();
        let mut seen = HashSet::new();

        for mac in macs {
            let mac = mac.as_ref();
            if !seen.insert(mac) {
                continue;
            }
            result.stats.total += 1;

            let key = match OuiKey::from_mac(mac) {
                Ok(key) => key,
                Err(e) => {
                    log::debug!("{}", e);
                    result.stats.invalid += 1;
                    result
                        .vendors
                        .insert(mac.to_string(), UNKNOWN_VENDOR.to_string());
                    continue;
                }
            };

            match self.resolver.lookup_local(&key) {
                LocalAnswer::Known(vendor) => {
                    result.stats.cache_hits += 1;
                    result.vendors.insert(mac.to_string(), vendor.to_string());
                }
                LocalAnswer::Failed => {
                    result.stats.failed_hits += 1;
                    result
                        .vendors
                        .insert(mac.to_string(), UNKNOWN_VENDOR.to_string());
                }
                LocalAnswer::Miss => pending.entry(key).or_default().push(mac.to_string()),
            }
        }

        (result, pending)
    }
}
