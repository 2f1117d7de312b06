//! Persistent resolver state.
//!
//! Two JSON files live in the data directory:
//!
//! * [`cache`]: `oui_cache.json`, OUI -> vendor name, flushed lazily.
//! * [`failed`]: `failed_lookups.json`, OUIs no service could resolve.
//!
//! Both are loaded once when the resolver is built and rewritten in full on
//! save. A corrupt file is never fatal: it is logged and replaced by empty
//! state. An unreadable data directory is.

pub mod cache;
pub mod failed;
pub(crate) mod persist;

pub use cache::{CacheStore, CleanupStats, DEFAULT_FLUSH_THRESHOLD};
pub use failed::FailedLookupSet;

/// File name of the vendor cache inside the data directory.
pub const CACHE_FILE: &str = "oui_cache.json";

/// File name of the failed-lookup set inside the data directory.
pub const FAILED_FILE: &str = "failed_lookups.json";

/// File name of the processed-file fingerprints inside the data directory.
pub const PROCESSED_FILE: &str = "processed_files.json";
