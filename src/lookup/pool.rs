//! Rotation of rate-limited lookup services.
//!
//! # Overview
//!
//! [`LookupServicePool::resolve`] walks the services starting at a cursor that
//! persists between calls, giving each OUI at most `2 x service_count`
//! attempts:
//!
//! ```text
//! Start -> TryService(i) -> Found                       (terminal)
//!                        -> NotFound (404)              (terminal)
//!                        -> RateLimited (429): backoff, TryService(i+1)
//!                        -> Transient:                  TryService(i+1)
//!       -> budget spent -> Exhausted                    (terminal)
//! ```
//!
//! Before each call the pool blocks until the service's interval has passed
//! since its previous call. Completing a full lap without success costs an
//! extra pause so failing services are not hammered in a tight loop.

use std::time::Duration;

use crate::error::LookupError;
use crate::lookup::clock::{Clock, SystemClock};
use crate::lookup::service::{LookupService, ServiceConfig};
use crate::lookup::transport::{HttpTransport, Transport};
use crate::oui::OuiKey;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Default pause after a full lap of failures.
pub const DEFAULT_LAP_PAUSE: Duration = Duration::from_secs(1);

/// Default interval multiplier applied on HTTP 429.
pub const DEFAULT_BACKOFF_FACTOR: f64 = 1.5;

/// Tunables shared by every service in the pool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolSettings {
    /// Timeout for a single HTTP request.
    pub request_timeout: Duration,
    /// Pause after the cursor wraps back to where the lookup started.
    pub lap_pause: Duration,
    /// Interval multiplier on HTTP 429.
    pub backoff_factor: f64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            lap_pause: DEFAULT_LAP_PAUSE,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
        }
    }
}

/// Terminal result of resolving one OUI against the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// A service returned a vendor name.
    Found(String),
    /// A service answered 404; no other service was asked.
    NotFound,
    /// Every attempt in the budget failed.
    Exhausted,
}

/// Ordered set of lookup services with a rotating cursor.
pub struct LookupServicePool {
    services: Vec<LookupService>,
    cursor: usize,
    settings: PoolSettings,
    transport: Box<dyn Transport>,
    clock: Box<dyn Clock>,
    requests: u64,
}

impl std::fmt::Debug for LookupServicePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupServicePool")
            .field("services", &self.services)
            .field("cursor", &self.cursor)
            .field("settings", &self.settings)
            .field("requests", &self.requests)
            .finish_non_exhaustive()
    }
}

impl LookupServicePool {
    /// Build a pool over `services` with explicit transport and clock.
    #[must_use]
    pub fn new(
        services: Vec<ServiceConfig>,
        settings: PoolSettings,
        transport: Box<dyn Transport>,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            services: services.into_iter().map(LookupService::new).collect(),
            cursor: 0,
            settings,
            transport,
            clock,
            requests: 0,
        }
    }

    /// Build a pool that talks HTTP and sleeps on the wall clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_http(
        services: Vec<ServiceConfig>,
        settings: PoolSettings,
    ) -> Result<Self, LookupError> {
        Ok(Self::new(
            services,
            settings,
            Box::new(HttpTransport::new()?),
            Box::new(SystemClock),
        ))
    }

    /// Resolve `oui`, rotating through services as described in the module docs.
    pub fn resolve(&mut self, oui: &OuiKey) -> LookupOutcome {
        let count = self.services.len();
        if count == 0 {
            return LookupOutcome::Exhausted;
        }

        let budget = 2 * count;
        let lap_start = self.cursor;

        for attempt in 1..=budget {
            let index = self.cursor;
            match self.call_service(index, oui) {
                Ok(vendor) => {
                    log::debug!(
                        "Resolved {} via {}: {}",
                        oui,
                        self.services[index].name(),
                        vendor
                    );
                    return LookupOutcome::Found(vendor);
                }
                Err(LookupError::NotFound) => {
                    log::debug!("{} reports {} as unknown", self.services[index].name(), oui);
                    return LookupOutcome::NotFound;
                }
                Err(LookupError::RateLimited) => {
                    self.services[index].apply_backoff(self.settings.backoff_factor);
                }
                Err(e) => {
                    log::trace!(
                        "Attempt {}/{} for {} via {} failed: {}",
                        attempt,
                        budget,
                        oui,
                        self.services[index].name(),
                        e
                    );
                }
            }

            self.cursor = (self.cursor + 1) % count;
            if self.cursor == lap_start && attempt < budget {
                self.clock.sleep(self.settings.lap_pause);
            }
        }

        log::debug!("All {} attempts for {} failed", budget, oui);
        LookupOutcome::Exhausted
    }

    /// One rate-limited request against the service at `index`.
    fn call_service(&mut self, index: usize, oui: &OuiKey) -> Result<String, LookupError> {
        let service = &mut self.services[index];

        let wait = service.wait_needed(self.clock.now());
        if !wait.is_zero() {
            log::trace!("Waiting {:?} before calling {}", wait, service.name());
            self.clock.sleep(wait);
        }
        service.mark_called(self.clock.now());

        let url = service.url_for(oui);
        self.requests += 1;
        let reply = self.transport.get(&url, self.settings.request_timeout)?;

        match reply.status {
            200 => service.parse_mode().extract(&reply.body),
            404 => Err(LookupError::NotFound),
            429 => Err(LookupError::RateLimited),
            status => Err(LookupError::Status(status)),
        }
    }

    /// Services in rotation order.
    #[must_use]
    pub fn services(&self) -> &[LookupService] {
        &self.services
    }

    /// Index of the service the next lookup starts with.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// HTTP requests issued so far.
    #[must_use]
    pub fn request_count(&self) -> u64 {
        self.requests
    }

    /// Number of services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Whether the pool has no services at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
