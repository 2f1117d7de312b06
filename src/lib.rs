//! netvendor - MAC vendor resolution for network inventories
//!
//! Resolves the vendor behind each MAC address in switch and router dumps.
//! Answers come from a persistent OUI cache first and from a rotating pool of
//! rate-limited public lookup services otherwise. OUIs no service knows are
//! remembered so they are never asked for again, and input files that have
//! not changed since their last run are resolved without touching the network.
//!
//! ```rust,no_run
//! use netvendor::config::Config;
//! use netvendor::resolver::VendorResolver;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let mut resolver = VendorResolver::open(&config)?;
//! let vendor = resolver.resolve_one("00:1b:63:84:45:e6")?;
//! resolver.flush()?;
//! println!("{vendor}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod inventory;
pub mod logging;
pub mod lookup;
pub mod oui;
pub mod progress;
pub mod resolver;
pub mod store;

/// Vendor reported for anything that could not be resolved.
pub const UNKNOWN_VENDOR: &str = "Unknown";
