//! Error types shared across the resolution engine.
//!
//! Only [`StoreError`] is meant to stop a run: it signals that the data
//! directory cannot be read or written. Everything that goes wrong while
//! talking to remote services is recovered inside the lookup pool, and a
//! malformed MAC simply resolves to [`crate::UNKNOWN_VENDOR`].

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A MAC address string that could not be normalized into an OUI key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid MAC address format: '{input}'")]
pub struct InvalidMacFormat {
    /// The offending input, as given.
    pub input: String,
}

impl InvalidMacFormat {
    pub(crate) fn new(input: &str) -> Self {
        Self {
            input: input.to_string(),
        }
    }
}

/// Failure to read or write one of the persisted state files.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading the file or creating its directory failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The in-memory state could not be encoded as JSON.
    #[error("failed to serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The temp file could not be renamed over the destination.
    #[error("failed to replace {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Path of the state file involved.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Io { path, .. } | Self::Serialize { path, .. } | Self::Persist { path, .. } => {
                path
            }
        }
    }
}

/// Result alias for state-file operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Failure of a single call against one lookup service.
///
/// These never escape the pool: each variant maps to a rotation decision.
#[derive(Debug, Error)]
pub enum LookupError {
    /// Connection failure, timeout, or other transport-level problem.
    #[error("transport error: {0}")]
    Transport(String),

    /// HTTP 429. The service's interval is backed off before rotating.
    #[error("rate limited")]
    RateLimited,

    /// HTTP 404. The OUI is permanently unknown to the service.
    #[error("not found")]
    NotFound,

    /// Any status other than 200, 404 or 429.
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// A 200 response whose body held no usable vendor name.
    #[error("malformed response body: {0}")]
    MalformedBody(String),
}

/// Configuration could not be loaded or is inconsistent.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Extracting the merged figment failed (bad TOML, wrong types).
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// A value is outside its accepted range.
    #[error("invalid configuration value for '{field}': {message}")]
    Invalid { field: String, message: String },

    /// Writing the configuration file failed.
    #[error("failed to save configuration to {path}: {message}")]
    Save { path: PathBuf, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Building a resolver from configuration failed.
#[derive(Debug, Error)]
pub enum OpenError {
    /// A state file in the data directory could not be read.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The HTTP client could not be created.
    #[error("failed to initialize HTTP client: {0}")]
    Http(#[from] LookupError),
}

/// Processing an input dump failed.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// The input file could not be opened or read.
    #[error("failed to read input {path}: {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Persisting resolver or fingerprint state failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
