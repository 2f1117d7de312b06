//! Layered configuration.
//!
//! Sources, lowest priority first:
//!
//! 1. Built-in defaults
//! 2. `config.toml` in the platform config directory
//! 3. `netvendor.toml` in the working directory (or an explicit path)
//! 4. `NETVENDOR_*` environment variables, e.g. `NETVENDOR_DATA_DIR`
//!
//! Lookup services are configured as an array of tables:
//!
//! ```toml
//! data_dir = "output/data"
//!
//! [[services]]
//! name = "macvendors"
//! url_template = "https://api.macvendors.com/{oui}"
//! parse_mode = "plain_text"
//! rate_limit_secs = 2.0
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::lookup::service::OUI_PLACEHOLDER;
use crate::lookup::{PoolSettings, ServiceConfig};
use crate::store::{CACHE_FILE, DEFAULT_FLUSH_THRESHOLD, FAILED_FILE, PROCESSED_FILE};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "NETVENDOR_";

/// File name looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "netvendor.toml";

/// Default location of the state files.
pub const DEFAULT_DATA_DIR: &str = "output/data";

/// Resolver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the cache, failed set and fingerprint records.
    pub data_dir: PathBuf,
    /// Never contact remote services.
    pub offline: bool,
    /// Pending cache writes that trigger a save.
    pub flush_threshold: usize,
    /// Per-request HTTP timeout.
    pub request_timeout_secs: f64,
    /// Pause after a full lap of failed services.
    pub lap_pause_secs: f64,
    /// Interval multiplier applied on HTTP 429.
    pub backoff_factor: f64,
    /// Services in rotation order.
    pub services: Vec<ServiceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let pool = PoolSettings::default();
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            offline: false,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            request_timeout_secs: pool.request_timeout.as_secs_f64(),
            lap_pause_secs: pool.lap_pause.as_secs_f64(),
            backoff_factor: pool.backoff_factor,
            services: ServiceConfig::defaults(),
        }
    }
}

impl Config {
    /// Load from the default locations.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on malformed TOML, mistyped values, or values
    /// rejected by [`Config::validate`].
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(None)
    }

    /// Load with `path` standing in for `./netvendor.toml`.
    ///
    /// A missing file is not an error; its layer is simply empty.
    ///
    /// # Errors
    ///
    /// See [`Config::load`].
    pub fn load_from_path(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config: Self = Self::figment(path)
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))?;
        config.validate()?;
        log::debug!("Configuration loaded: data_dir={}", config.data_dir.display());
        Ok(config)
    }

    /// Like [`Config::load`], but falls back to defaults on error.
    #[must_use]
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to load config, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// The merged provider stack, before extraction.
    #[must_use]
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(user) = Self::default_config_path() {
            figment = figment.merge(Toml::file(user));
        }
        let local = path.map_or_else(|| PathBuf::from(LOCAL_CONFIG_FILE), Path::to_path_buf);
        figment
            .merge(Toml::file(local))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Platform config file, e.g. `~/.config/netvendor/config.toml`.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "netvendor").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flush_threshold == 0 {
            return Err(ConfigError::invalid("flush_threshold", "must be at least 1"));
        }
        if !(self.request_timeout_secs.is_finite() && self.request_timeout_secs > 0.0) {
            return Err(ConfigError::invalid(
                "request_timeout_secs",
                "must be a positive number of seconds",
            ));
        }
        if !(self.lap_pause_secs.is_finite() && self.lap_pause_secs >= 0.0) {
            return Err(ConfigError::invalid("lap_pause_secs", "must not be negative"));
        }
        if !(self.backoff_factor.is_finite() && self.backoff_factor >= 1.0) {
            return Err(ConfigError::invalid("backoff_factor", "must be at least 1.0"));
        }
        for service in &self.services {
            if service.name.trim().is_empty() {
                return Err(ConfigError::invalid("services.name", "must not be empty"));
            }
            if !service.url_template.contains(OUI_PLACEHOLDER) {
                return Err(ConfigError::invalid(
                    "services.url_template",
                    format!("'{}' has no {} placeholder", service.name, OUI_PLACEHOLDER),
                ));
            }
            if !(service.rate_limit_secs.is_finite() && service.rate_limit_secs >= 0.0) {
                return Err(ConfigError::invalid(
                    "services.rate_limit_secs",
                    format!("'{}' has a negative interval", service.name),
                ));
            }
        }
        Ok(())
    }

    /// Write as TOML, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Save`] if encoding or writing fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let save_err = |message: String| ConfigError::Save {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_err(e.to_string()))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| save_err(e.to_string()))?;
        }
        fs::write(path, content).map_err(|e| save_err(e.to_string()))
    }

    /// Pool tunables derived from this configuration.
    #[must_use]
    pub fn pool_settings(&self) -> PoolSettings {
        let defaults = PoolSettings::default();
        let secs = |value: f64, fallback: Duration| {
            Duration::try_from_secs_f64(value).unwrap_or(fallback)
        };
        PoolSettings {
            request_timeout: secs(self.request_timeout_secs, defaults.request_timeout),
            lap_pause: secs(self.lap_pause_secs, defaults.lap_pause),
            backoff_factor: self.backoff_factor,
        }
    }

    #[must_use]
    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join(CACHE_FILE)
    }

    #[must_use]
    pub fn failed_path(&self) -> PathBuf {
        self.data_dir.join(FAILED_FILE)
    }

    #[must_use]
    pub fn processed_path(&self) -> PathBuf {
        self.data_dir.join(PROCESSED_FILE)
    }
}
