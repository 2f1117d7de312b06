//! One end-to-end pass over an input dump.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::InventoryError;
use crate::fingerprint::{FileFingerprint, ProcessedFiles};
use crate::progress::{ProgressCallback, PHASE_PARSE};
use crate::resolver::{BatchResolver, BatchStats, VendorResolver};
use crate::UNKNOWN_VENDOR;

use super::parser::{parse_dump, DumpFormat};

/// A parsed device together with its resolved vendor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDevice {
    pub mac: String,
    pub vlan: Option<String>,
    pub port: Option<String>,
    pub vendor: String,
}

/// Everything learned from one input file.
#[derive(Debug, Clone)]
pub struct InventoryReport {
    pub input: PathBuf,
    pub format: DumpFormat,
    /// Devices in input order.
    pub devices: Vec<ResolvedDevice>,
    /// Devices per vendor; [`UNKNOWN_VENDOR`] is not counted.
    pub vendor_counts: BTreeMap<String, usize>,
    /// False when the input matched its recorded fingerprint and was
    /// resolved from local state only.
    pub file_changed: bool,
    pub stats: BatchStats,
}

impl InventoryReport {
    /// Devices whose vendor stayed unknown.
    #[must_use]
    pub fn unknown_count(&self) -> usize {
        self.devices
            .iter()
            .filter(|d| d.vendor == UNKNOWN_VENDOR)
            .count()
    }

    /// Distinct switch ports seen (MAC tables only).
    #[must_use]
    pub fn unique_ports(&self) -> usize {
        let mut ports: Vec<&str> = self.devices.iter().filter_map(|d| d.port.as_deref()).collect();
        ports.sort_unstable();
        ports.dedup();
        ports.len()
    }
}

/// Tally vendors, skipping [`UNKNOWN_VENDOR`].
pub fn count_vendors<'a>(vendors: impl IntoIterator<Item = &'a str>) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for vendor in vendors.into_iter().filter(|v| *v != UNKNOWN_VENDOR) {
        *counts.entry(vendor.to_string()).or_insert(0) += 1;
    }
    counts
}

/// Processes input dumps against a resolver and the processed-file records.
pub struct Inventory<'a> {
    resolver: &'a mut VendorResolver,
    processed: &'a mut ProcessedFiles,
    progress: Option<Arc<dyn ProgressCallback>>,
}

impl<'a> Inventory<'a> {
    #[must_use]
    pub fn new(resolver: &'a mut VendorResolver, processed: &'a mut ProcessedFiles) -> Self {
        Self {
            resolver,
            processed,
            progress: None,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Parse `input`, resolve every device and tally vendors.
    ///
    /// An input whose fingerprint matches the recorded one is resolved from
    /// local state only. The cache is flushed before returning. The
    /// fingerprint taken before parsing is recorded only after everything
    /// else succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::Input`] if `input` cannot be read and
    /// [`InventoryError::Store`] if resolver state cannot be persisted.
    pub fn process(&mut self, input: &Path) -> Result<InventoryReport, InventoryError> {
        let input_err = |source| InventoryError::Input {
            path: input.to_path_buf(),
            source,
        };

        // Taken before reading so that bytes appended during the run are
        // not recorded as processed.
        let fingerprint = FileFingerprint::compute(input).map_err(input_err)?;
        let file_changed = !self.processed.is_recorded(input, &fingerprint);
        if !file_changed {
            log::info!(
                "{} unchanged since last run, resolving from cache only",
                input.display()
            );
        }

        if let Some(ref progress) = self.progress {
            progress.on_phase_start(PHASE_PARSE, 0);
        }
        let file = File::open(input).map_err(input_err)?;
        let dump = parse_dump(BufReader::new(file)).map_err(input_err)?;
        if let Some(ref progress) = self.progress {
            progress.on_progress(dump.lines_read, &input.display().to_string());
            progress.on_phase_end(PHASE_PARSE);
        }

        if dump.devices.is_empty() {
            log::warn!("No MAC addresses found in {}", input.display());
        }

        let macs: Vec<&str> = dump.devices.iter().map(|d| d.mac.as_str()).collect();
        let mut batch = BatchResolver::new(&mut *self.resolver);
        if let Some(ref progress) = self.progress {
            batch = batch.with_progress(Arc::clone(progress));
        }
        let resolved = if file_changed {
            batch.resolve_batch(&macs)?
        } else {
            batch.resolve_known_only(&macs)
        };

        let devices: Vec<ResolvedDevice> = dump
            .devices
            .into_iter()
            .map(|d| {
                let vendor = resolved
                    .vendor(&d.mac)
                    .unwrap_or(UNKNOWN_VENDOR)
                    .to_string();
                ResolvedDevice {
                    mac: d.mac,
                    vlan: d.vlan,
                    port: d.port,
                    vendor,
                }
            })
            .collect();
        let vendor_counts = count_vendors(devices.iter().map(|d| d.vendor.as_str()));

        self.resolver.flush()?;
        if file_changed {
            self.processed.record_fingerprint(input, fingerprint)?;
        }

        log::info!(
            "{}: {} devices, {} vendors, {} unknown",
            input.display(),
            devices.len(),
            vendor_counts.len(),
            devices.iter().filter(|d| d.vendor == UNKNOWN_VENDOR).count()
        );

        Ok(InventoryReport {
            input: input.to_path_buf(),
            format: dump.format,
            devices,
            vendor_counts,
            file_changed,
            stats: resolved.stats,
        })
    }
}
