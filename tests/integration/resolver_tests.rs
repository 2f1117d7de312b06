use std::time::Duration;

use netvendor::lookup::{Clock, HttpReply, ManualClock};
use netvendor::oui::OuiKey;
use netvendor::resolver::{BatchResolver, VendorResolver};
use netvendor::store::{CacheStore, FailedLookupSet, CACHE_FILE, FAILED_FILE};
use netvendor::UNKNOWN_VENDOR;
use tempfile::tempdir;

use super::common::{default_pool, oui_of, open_resolver, seed_cache, Reply, ScriptedTransport};

fn key(s: &str) -> OuiKey {
    s.parse().unwrap()
}

#[test]
fn test_cached_vendor_needs_no_network() {
    let dir = tempdir().unwrap();
    seed_cache(dir.path(), &[("001B63", "Apple, Inc.")]);
    let transport = ScriptedTransport::new();
    let clock = ManualClock::new();
    let mut resolver = open_resolver(dir.path(), &transport, &clock, false);

    let vendor = resolver.resolve_one("00:1B:63:AA:BB:CC").unwrap();

    assert_eq!(vendor, "Apple, Inc.");
    assert!(transport.calls().is_empty());
}

#[test]
fn test_transport_errors_exhaust_and_record_failure() {
    let dir = tempdir().unwrap();
    let transport = ScriptedTransport::new();
    let clock = ManualClock::new();
    let mut resolver = open_resolver(dir.path(), &transport, &clock, false);

    let vendor = resolver.resolve_one("AA:BB:CC:00:11:22").unwrap();

    assert_eq!(vendor, UNKNOWN_VENDOR);
    assert_eq!(transport.calls().len(), 4);
    assert!(resolver.failed().contains(&key("AABBCC")));

    // The record survives a restart.
    let reloaded = FailedLookupSet::load(dir.path().join(FAILED_FILE)).unwrap();
    assert!(reloaded.contains(&key("AABBCC")));
}

#[test]
fn test_not_found_stops_after_one_service() {
    let dir = tempdir().unwrap();
    let transport = ScriptedTransport::new();
    transport.reply(404, "");
    let clock = ManualClock::new();
    let mut resolver = open_resolver(dir.path(), &transport, &clock, false);

    let vendor = resolver.resolve_one("DE:AD:BE:EF:00:01").unwrap();

    assert_eq!(vendor, UNKNOWN_VENDOR);
    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].starts_with("https://api.macvendors.com/"));
    assert!(resolver.failed().contains(&key("DEADBE")));
}

#[test]
fn test_failed_key_is_never_retried() {
    let dir = tempdir().unwrap();
    let mut failed = FailedLookupSet::new(dir.path().join(FAILED_FILE));
    failed.add(key("DEADBE"));
    failed.save().unwrap();

    let transport = ScriptedTransport::new().with_fallback(|_| Ok(HttpReply::new(200, "Surprise")));
    let clock = ManualClock::new();
    let mut resolver = open_resolver(dir.path(), &transport, &clock, false);

    for _ in 0..3 {
        assert_eq!(resolver.resolve_one("de:ad:be:00:00:01").unwrap(), UNKNOWN_VENDOR);
    }
    assert!(transport.calls().is_empty());
}

#[test]
fn test_rate_limited_twice_backs_off_squared() {
    let dir = tempdir().unwrap();
    let transport = ScriptedTransport::new();
    // macvendors 429, maclookup 429, macvendors 429 again; the last attempt
    // then fails at the transport level.
    transport.reply(429, "").reply(429, "").reply(429, "");
    let clock = ManualClock::new();
    let mut resolver = open_resolver(dir.path(), &transport, &clock, false);

    let vendor = resolver.resolve_one("00:14:22:01:02:03").unwrap();

    assert_eq!(vendor, UNKNOWN_VENDOR);
    let macvendors = &resolver.pool().services()[0];
    let expected = Duration::from_secs_f64(2.0 * 1.5 * 1.5);
    assert!((macvendors.interval().as_secs_f64() - expected.as_secs_f64()).abs() < 1e-9);
}

#[test]
fn test_found_vendor_persists_across_restart() {
    let dir = tempdir().unwrap();
    let transport = ScriptedTransport::new();
    transport.reply(200, "Cisco Systems, Inc");
    let clock = ManualClock::new();
    {
        let mut resolver = open_resolver(dir.path(), &transport, &clock, false);
        assert_eq!(
            resolver.resolve_one("00-1E-14-AA-BB-CC").unwrap(),
            "Cisco Systems, Inc"
        );
        resolver.flush().unwrap();
    }

    let cache = CacheStore::load(dir.path().join(CACHE_FILE), 50).unwrap();
    assert_eq!(cache.get(&key("001E14")), Some("Cisco Systems, Inc"));

    let mut resolver = open_resolver(dir.path(), &transport, &clock, false);
    assert_eq!(
        resolver.resolve_one("001e.14aa.0001").unwrap(),
        "Cisco Systems, Inc"
    );
    assert_eq!(transport.calls().len(), 1);
}

#[test]
fn test_offline_resolver_uses_cache_only() {
    let dir = tempdir().unwrap();
    seed_cache(dir.path(), &[("001B63", "Apple, Inc.")]);
    let transport = ScriptedTransport::new();
    let clock = ManualClock::new();
    let mut resolver = open_resolver(dir.path(), &transport, &clock, true);

    assert_eq!(resolver.resolve_one("00:1b:63:00:00:01").unwrap(), "Apple, Inc.");
    assert_eq!(resolver.resolve_one("aa:bb:cc:00:00:01").unwrap(), UNKNOWN_VENDOR);
    assert!(transport.calls().is_empty());
    assert!(resolver.failed().is_empty());
}

#[test]
fn test_malformed_macs_resolve_unknown_without_network() {
    let dir = tempdir().unwrap();
    let transport = ScriptedTransport::new();
    let clock = ManualClock::new();
    let mut resolver = open_resolver(dir.path(), &transport, &clock, false);

    for mac in ["", "00:1B:63", "ZZ:ZZ:ZZ:ZZ:ZZ:ZZ", "00:1B:63:AA:BB:CC:DD"] {
        assert_eq!(resolver.resolve_one(mac).unwrap(), UNKNOWN_VENDOR);
    }
    assert!(transport.calls().is_empty());
    assert!(resolver.failed().is_empty());
}

#[test]
fn test_batch_spaces_requests_per_service() {
    fn table(url: &str) -> Reply {
        match oui_of(url) {
            "00146C" => Ok(HttpReply::new(200, "Netgear")),
            "3C5AB4" => Ok(HttpReply::new(200, "Google, Inc.")),
            "F4F5D8" => Ok(HttpReply::new(200, "Google, Inc.")),
            _ => Ok(HttpReply::new(404, "")),
        }
    }

    let dir = tempdir().unwrap();
    let transport = ScriptedTransport::new().with_fallback(table);
    let clock = ManualClock::new();
    let cache = CacheStore::new(dir.path().join(CACHE_FILE), 50);
    let failed = FailedLookupSet::new(dir.path().join(FAILED_FILE));
    let mut resolver = VendorResolver::new(cache, failed, default_pool(&transport, &clock), false);

    let start = clock.now();
    let result = BatchResolver::new(&mut resolver)
        .resolve_batch(&["00:14:6c:00:00:01", "3c:5a:b4:00:00:01", "f4:f5:d8:00:00:01"])
        .unwrap();

    assert_eq!(result.stats.remote_found, 3);
    assert_eq!(transport.calls().len(), 3);
    // Every lookup lands on macvendors (2s interval): two waits between three calls.
    assert_eq!(clock.now() - start, Duration::from_secs(4));
}
