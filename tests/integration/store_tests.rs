use std::fs;

use netvendor::config::Config;
use netvendor::oui::OuiKey;
use netvendor::resolver::VendorResolver;
use netvendor::store::{CacheStore, FailedLookupSet, CACHE_FILE, FAILED_FILE};
use tempfile::tempdir;

fn key(s: &str) -> OuiKey {
    s.parse().unwrap()
}

#[test]
fn test_cache_file_is_sorted_uppercase_object() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(CACHE_FILE);
    let mut cache = CacheStore::new(&path, 50);
    cache.put(key("3c:07:54"), "Apple, Inc.");
    cache.put(key("00-14-22"), "Dell Inc.");
    cache.flush(true).unwrap();

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["001422", "3C0754"]);
    assert_eq!(json["3C0754"], "Apple, Inc.");
}

#[test]
fn test_cache_round_trip_with_legacy_keys() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(CACHE_FILE);
    fs::write(
        &path,
        r#"{"00:1b:63": "Apple, Inc.", "001422": "Dell Inc.", "bogus": "X", "3C0754": ""}"#,
    )
    .unwrap();

    let mut cache = CacheStore::load(&path, 50).unwrap();
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get(&key("001B63")), Some("Apple, Inc."));

    cache.put(key("F4F5D8"), "Google, Inc.");
    cache.flush(true).unwrap();
    let reloaded = CacheStore::load(&path, 50).unwrap();
    assert_eq!(reloaded.len(), 3);
    assert_eq!(reloaded.get(&key("F4F5D8")), Some("Google, Inc."));
}

#[test]
fn test_corrupt_state_files_do_not_stop_the_resolver() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join(CACHE_FILE), "{ not json").unwrap();
    fs::write(dir.path().join(FAILED_FILE), "[1, 2,").unwrap();

    let config = Config {
        data_dir: dir.path().to_path_buf(),
        offline: true,
        ..Config::default()
    };
    let mut resolver = VendorResolver::open(&config).unwrap();
    assert!(resolver.cache().is_empty());
    assert!(resolver.failed().is_empty());

    // The next flush replaces the corrupt file with a valid one.
    resolver.flush().unwrap();
    let reloaded = CacheStore::load(dir.path().join(CACHE_FILE), 50).unwrap();
    assert!(reloaded.is_empty());
}

#[test]
fn test_open_rewrites_failed_entries_the_cache_knows() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join(CACHE_FILE), r#"{"001B63": "Apple, Inc."}"#).unwrap();
    fs::write(dir.path().join(FAILED_FILE), r#"["001B63", "DEADBE"]"#).unwrap();

    let config = Config {
        data_dir: dir.path().to_path_buf(),
        offline: true,
        ..Config::default()
    };
    let resolver = VendorResolver::open(&config).unwrap();
    assert!(!resolver.failed().contains(&key("001B63")));

    let on_disk = FailedLookupSet::load(dir.path().join(FAILED_FILE)).unwrap();
    assert_eq!(on_disk.len(), 1);
    assert!(on_disk.contains(&key("DEADBE")));
}

#[test]
fn test_failed_set_file_is_sorted_array() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(FAILED_FILE);
    let mut failed = FailedLookupSet::new(&path);
    failed.add(key("DEADBE"));
    failed.add(key("AABBCC"));
    failed.add(key("aa:bb:cc"));
    failed.save().unwrap();

    let json: Vec<String> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json, vec!["AABBCC", "DEADBE"]);

    let reloaded = FailedLookupSet::load(&path).unwrap();
    assert_eq!(reloaded.len(), 2);
    assert!(reloaded.contains(&key("DEADBE")));
}

#[test]
fn test_save_creates_data_dir() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("output").join("data").join(FAILED_FILE);
    let mut failed = FailedLookupSet::new(&path);
    failed.add(key("001B63"));
    failed.save().unwrap();
    assert!(path.exists());
}
