//! Typed configuration and runtime state of one lookup service.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::LookupError;
use crate::oui::OuiKey;
use crate::UNKNOWN_VENDOR;

/// Placeholder substituted with the OUI in URL templates.
pub const OUI_PLACEHOLDER: &str = "{oui}";

/// How a 200 response body carries the vendor name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    /// The whole body is the vendor name.
    #[default]
    PlainText,
    /// A JSON object whose `company` field is the vendor name.
    JsonCompany,
}

impl ParseMode {
    /// Extract a vendor name from a successful response body.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::MalformedBody`] when the body is not the
    /// expected shape, or when it holds no usable vendor (blank or the
    /// literal `Unknown`).
    pub fn extract(self, body: &str) -> Result<String, LookupError> {
        let vendor = match self {
            Self::PlainText => body.trim().to_string(),
            Self::JsonCompany => {
                let value: serde_json::Value = serde_json::from_str(body)
                    .map_err(|e| LookupError::MalformedBody(e.to_string()))?;
                value
                    .get("company")
                    .and_then(serde_json::Value::as_str)
                    .map(|s| s.trim().to_string())
                    .ok_or_else(|| LookupError::MalformedBody("missing 'company' field".into()))?
            }
        };

        if vendor.is_empty() || vendor == UNKNOWN_VENDOR {
            return Err(LookupError::MalformedBody(format!(
                "no vendor in response ({:?})",
                vendor
            )));
        }
        Ok(vendor)
    }
}

/// Static description of a lookup service, as found in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Short name used in logs.
    pub name: String,
    /// URL with an `{oui}` placeholder.
    pub url_template: String,
    /// How to read the vendor from a 200 response.
    #[serde(default)]
    pub parse_mode: ParseMode,
    /// Minimum seconds between two calls to this service.
    pub rate_limit_secs: f64,
}

impl ServiceConfig {
    /// The macvendors.com plain-text API, 2s between calls.
    #[must_use]
    pub fn macvendors() -> Self {
        Self {
            name: "macvendors".to_string(),
            url_template: "https://api.macvendors.com/{oui}".to_string(),
            parse_mode: ParseMode::PlainText,
            rate_limit_secs: 2.0,
        }
    }

    /// The maclookup.app JSON API, 1s between calls.
    #[must_use]
    pub fn maclookup() -> Self {
        Self {
            name: "maclookup".to_string(),
            url_template: "https://api.maclookup.app/v2/macs/{oui}".to_string(),
            parse_mode: ParseMode::JsonCompany,
            rate_limit_secs: 1.0,
        }
    }

    /// The services used when configuration names none.
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        vec![Self::macvendors(), Self::maclookup()]
    }
}

/// A service plus its mutable per-run rate-limit state.
#[derive(Debug, Clone)]
pub struct LookupService {
    config: ServiceConfig,
    interval: Duration,
    last_call: Option<Instant>,
}

impl LookupService {
    /// Wrap a configuration with fresh rate-limit state.
    #[must_use]
    pub fn new(config: ServiceConfig) -> Self {
        let interval =
            Duration::try_from_secs_f64(config.rate_limit_secs.max(0.0)).unwrap_or(Duration::ZERO);
        Self {
            config,
            interval,
            last_call: None,
        }
    }

    /// Service name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Response parse mode.
    #[must_use]
    pub fn parse_mode(&self) -> ParseMode {
        self.config.parse_mode
    }

    /// Current minimum spacing between calls.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// When this service was last called, if ever.
    #[must_use]
    pub fn last_call(&self) -> Option<Instant> {
        self.last_call
    }

    /// Request URL for `oui`.
    #[must_use]
    pub fn url_for(&self, oui: &OuiKey) -> String {
        self.config
            .url_template
            .replace(OUI_PLACEHOLDER, oui.as_str())
    }

    /// How long to wait at `now` before the next call is allowed.
    #[must_use]
    pub fn wait_needed(&self, now: Instant) -> Duration {
        match self.last_call {
            Some(last) => self.interval.saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }

    /// Note that a call is being made at `now`.
    pub fn mark_called(&mut self, now: Instant) {
        self.last_call = Some(now);
    }

    /// Grow the interval after a 429. Factors below 1 are treated as 1.
    pub fn apply_backoff(&mut self, factor: f64) {
        let previous = self.interval;
        self.interval =
            Duration::try_from_secs_f64(previous.as_secs_f64() * factor.max(1.0))
                .unwrap_or(Duration::MAX);
        log::debug!(
            "Service {} rate limited, interval {:.2}s -> {:.2}s",
            self.config.name,
            previous.as_secs_f64(),
            self.interval.as_secs_f64()
        );
    }
}
