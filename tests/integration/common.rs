//! Scripted transport and resolver builders shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use netvendor::error::LookupError;
use netvendor::lookup::{
    Clock, HttpReply, LookupServicePool, ManualClock, PoolSettings, ServiceConfig, Transport,
};
use netvendor::resolver::VendorResolver;
use netvendor::store::{CacheStore, FailedLookupSet, CACHE_FILE, FAILED_FILE};

pub type Reply = Result<HttpReply, LookupError>;

#[derive(Default)]
struct Script {
    queue: VecDeque<Reply>,
    fallback: Option<fn(&str) -> Reply>,
    calls: Vec<String>,
}

/// Replays queued replies in order, then the fallback, then transport errors.
///
/// Clones share the script, so a test can keep a handle after handing one
/// to the pool.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Rc<RefCell<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every unscripted request with `fallback(url)`.
    pub fn with_fallback(self, fallback: fn(&str) -> Reply) -> Self {
        self.script.borrow_mut().fallback = Some(fallback);
        self
    }

    pub fn reply(&self, status: u16, body: &str) -> &Self {
        self.script
            .borrow_mut()
            .queue
            .push_back(Ok(HttpReply::new(status, body)));
        self
    }

    pub fn fail(&self, message: &str) -> &Self {
        self.script
            .borrow_mut()
            .queue
            .push_back(Err(LookupError::Transport(message.to_string())));
        self
    }

    /// Every URL requested so far.
    pub fn calls(&self) -> Vec<String> {
        self.script.borrow().calls.clone()
    }
}

impl Transport for ScriptedTransport {
    fn get(&self, url: &str, _timeout: Duration) -> Result<HttpReply, LookupError> {
        let mut script = self.script.borrow_mut();
        script.calls.push(url.to_string());
        if let Some(reply) = script.queue.pop_front() {
            return reply;
        }
        match script.fallback {
            Some(fallback) => fallback(url),
            None => Err(LookupError::Transport("connection refused".to_string())),
        }
    }
}

/// The OUI at the end of a lookup URL.
pub fn oui_of(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or_default()
}

pub fn default_pool(transport: &ScriptedTransport, clock: &ManualClock) -> LookupServicePool {
    pool_with(ServiceConfig::defaults(), transport, clock.clone())
}

pub fn pool_with(
    services: Vec<ServiceConfig>,
    transport: &ScriptedTransport,
    clock: impl Clock + 'static,
) -> LookupServicePool {
    LookupServicePool::new(
        services,
        PoolSettings::default(),
        Box::new(transport.clone()),
        Box::new(clock),
    )
}

/// A resolver over the state files in `dir` and the default services.
pub fn open_resolver(
    dir: &Path,
    transport: &ScriptedTransport,
    clock: &ManualClock,
    offline: bool,
) -> VendorResolver {
    let cache = CacheStore::load(dir.join(CACHE_FILE), 50).unwrap();
    let failed = FailedLookupSet::load(dir.join(FAILED_FILE)).unwrap();
    VendorResolver::new(cache, failed, default_pool(transport, clock), offline)
}

/// Write a cache file containing `entries`.
pub fn seed_cache(dir: &Path, entries: &[(&str, &str)]) {
    let mut cache = CacheStore::new(dir.join(CACHE_FILE), 50);
    for (oui, vendor) in entries {
        cache.put(oui.parse().unwrap(), *vendor);
    }
    cache.flush(true).unwrap();
}
