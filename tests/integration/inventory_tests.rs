use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use netvendor::error::InventoryError;
use netvendor::fingerprint::ProcessedFiles;
use netvendor::inventory::{DumpFormat, Inventory};
use netvendor::lookup::{HttpReply, ManualClock};
use netvendor::progress::ProgressCallback;
use netvendor::store::PROCESSED_FILE;
use netvendor::UNKNOWN_VENDOR;
use tempfile::tempdir;

use super::common::{oui_of, open_resolver, seed_cache, Reply, ScriptedTransport};

const MAC_TABLE: &str = "\
Vlan    Mac Address       Type        Ports
----    -----------       --------    -----
  10    001b.63aa.bb01    DYNAMIC     Gi1/0/1
  10    001b.63aa.bb02    DYNAMIC     Gi1/0/2
  20    0014.6c00.0001    DYNAMIC     Gi1/0/3
  20    aabb.cc00.0001    DYNAMIC     Gi1/0/4
";

fn directory(url: &str) -> Reply {
    match oui_of(url) {
        "00146C" => Ok(HttpReply::new(200, "Netgear")),
        _ => Ok(HttpReply::new(404, "")),
    }
}

#[derive(Default)]
struct Phases(Mutex<Vec<String>>);

impl ProgressCallback for Phases {
    fn on_phase_start(&self, phase: &str, _total: usize) {
        self.0.lock().unwrap().push(phase.to_string());
    }
    fn on_progress(&self, _current: usize, _item: &str) {}
    fn on_phase_end(&self, _phase: &str) {}
}

#[test]
fn test_first_run_resolves_and_records_fingerprint() {
    let dir = tempdir().unwrap();
    seed_cache(dir.path(), &[("001B63", "Apple, Inc.")]);
    let input = dir.path().join("mac_table.txt");
    fs::write(&input, MAC_TABLE).unwrap();

    let transport = ScriptedTransport::new().with_fallback(directory);
    let clock = ManualClock::new();
    let mut resolver = open_resolver(dir.path(), &transport, &clock, false);
    let mut processed = ProcessedFiles::new(dir.path().join(PROCESSED_FILE));
    let phases = Arc::new(Phases::default());

    let report = Inventory::new(&mut resolver, &mut processed)
        .with_progress(phases.clone())
        .process(&input)
        .unwrap();

    assert!(report.file_changed);
    assert_eq!(report.format, DumpFormat::MacTable);
    assert_eq!(report.devices.len(), 4);
    assert_eq!(report.vendor_counts.get("Apple, Inc."), Some(&2));
    assert_eq!(report.vendor_counts.get("Netgear"), Some(&1));
    assert!(!report.vendor_counts.contains_key(UNKNOWN_VENDOR));
    assert_eq!(report.unknown_count(), 1);
    assert_eq!(report.unique_ports(), 4);
    assert_eq!(report.stats.cache_hits, 2);
    assert_eq!(report.stats.remote_lookups, 2);
    assert_eq!(transport.calls().len(), 2);
    assert_eq!(*phases.0.lock().unwrap(), vec!["parse", "lookup"]);

    assert!(!processed.has_changed(&input));
    assert!(dir.path().join(PROCESSED_FILE).exists());
}

#[test]
fn test_unchanged_input_skips_network() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("macs.txt");
    fs::write(&input, "00:14:6c:00:00:01\n00:14:6c:00:00:02\n").unwrap();

    let transport = ScriptedTransport::new().with_fallback(directory);
    let clock = ManualClock::new();
    let mut resolver = open_resolver(dir.path(), &transport, &clock, false);
    let mut processed = ProcessedFiles::new(dir.path().join(PROCESSED_FILE));

    let first = Inventory::new(&mut resolver, &mut processed)
        .process(&input)
        .unwrap();
    assert_eq!(first.vendor_counts.get("Netgear"), Some(&2));
    assert_eq!(transport.calls().len(), 1);

    let second = Inventory::new(&mut resolver, &mut processed)
        .process(&input)
        .unwrap();
    assert!(!second.file_changed);
    assert_eq!(second.vendor_counts, first.vendor_counts);
    assert_eq!(transport.calls().len(), 1);
}

#[test]
fn test_unchanged_input_leaves_misses_unknown() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("macs.txt");
    fs::write(&input, "00:14:6c:00:00:01\n").unwrap();

    let transport = ScriptedTransport::new().with_fallback(directory);
    let clock = ManualClock::new();
    let mut processed = ProcessedFiles::new(dir.path().join(PROCESSED_FILE));
    processed.record(&input).unwrap();

    let mut resolver = open_resolver(dir.path(), &transport, &clock, false);
    let report = Inventory::new(&mut resolver, &mut processed)
        .process(&input)
        .unwrap();

    assert!(!report.file_changed);
    assert_eq!(report.devices[0].vendor, UNKNOWN_VENDOR);
    assert!(transport.calls().is_empty());
    assert!(resolver.failed().is_empty());
}

#[test]
fn test_appended_line_triggers_reprocessing() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("arp.txt");
    fs::write(
        &input,
        "Protocol  Address      Age (min)  Hardware Addr   Type   Interface\n\
         Internet  10.0.59.1        -   0014.6c00.0001  ARPA   Vlan59\n",
    )
    .unwrap();

    let transport = ScriptedTransport::new().with_fallback(directory);
    let clock = ManualClock::new();
    let mut resolver = open_resolver(dir.path(), &transport, &clock, false);
    let mut processed = ProcessedFiles::new(dir.path().join(PROCESSED_FILE));

    let first = Inventory::new(&mut resolver, &mut processed)
        .process(&input)
        .unwrap();
    assert_eq!(first.format, DumpFormat::ArpTable);
    assert_eq!(first.devices[0].vlan.as_deref(), Some("59"));

    let mut file = fs::OpenOptions::new().append(true).open(&input).unwrap();
    writeln!(file, "Internet  10.0.59.2        3   dead.be00.0001  ARPA   Vlan59").unwrap();
    drop(file);

    let second = Inventory::new(&mut resolver, &mut processed)
        .process(&input)
        .unwrap();
    assert!(second.file_changed);
    assert_eq!(second.devices.len(), 2);
    assert_eq!(second.stats.cache_hits, 1);
    assert_eq!(second.stats.remote_lookups, 1);
    assert!(resolver.failed().contains(&"DEADBE".parse().unwrap()));
}

/// Appends one more MAC to the input the first time lookups start.
struct GrowDuringLookup {
    input: PathBuf,
    appended: AtomicBool,
}

impl ProgressCallback for GrowDuringLookup {
    fn on_phase_start(&self, phase: &str, _total: usize) {
        if phase == "lookup" && !self.appended.swap(true, Ordering::SeqCst) {
            let mut file = fs::OpenOptions::new().append(true).open(&self.input).unwrap();
            writeln!(file, "3c:5a:b4:00:00:01").unwrap();
        }
    }
    fn on_progress(&self, _current: usize, _item: &str) {}
    fn on_phase_end(&self, _phase: &str) {}
}

#[test]
fn test_lines_appended_mid_run_are_processed_next_time() {
    fn vendors(url: &str) -> Reply {
        match oui_of(url) {
            "00146C" => Ok(HttpReply::new(200, "Netgear")),
            "3C5AB4" => Ok(HttpReply::new(200, "Google, Inc.")),
            _ => Ok(HttpReply::new(404, "")),
        }
    }

    let dir = tempdir().unwrap();
    let input = dir.path().join("macs.txt");
    fs::write(&input, "00:14:6c:00:00:01\n").unwrap();

    let transport = ScriptedTransport::new().with_fallback(vendors);
    let clock = ManualClock::new();
    let mut resolver = open_resolver(dir.path(), &transport, &clock, false);
    let mut processed = ProcessedFiles::new(dir.path().join(PROCESSED_FILE));
    let grow = Arc::new(GrowDuringLookup {
        input: input.clone(),
        appended: AtomicBool::new(false),
    });

    let first = Inventory::new(&mut resolver, &mut processed)
        .with_progress(grow.clone())
        .process(&input)
        .unwrap();
    assert_eq!(first.devices.len(), 1);
    assert!(processed.has_changed(&input));

    let second = Inventory::new(&mut resolver, &mut processed)
        .with_progress(grow)
        .process(&input)
        .unwrap();
    assert!(second.file_changed);
    assert_eq!(second.devices.len(), 2);
    assert_eq!(second.devices[1].vendor, "Google, Inc.");
    assert_eq!(transport.calls().len(), 2);
    assert!(!processed.has_changed(&input));
}

#[test]
fn test_missing_input_records_nothing() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("missing.txt");
    let transport = ScriptedTransport::new();
    let clock = ManualClock::new();
    let mut resolver = open_resolver(dir.path(), &transport, &clock, false);
    let mut processed = ProcessedFiles::new(dir.path().join(PROCESSED_FILE));

    let err = Inventory::new(&mut resolver, &mut processed)
        .process(&input)
        .unwrap_err();

    assert!(matches!(err, InventoryError::Input { .. }));
    assert!(processed.is_empty());
    assert!(!dir.path().join(PROCESSED_FILE).exists());
}
