//! Logging setup for embedding applications and tests.
//!
//! The library itself only emits through the `log` facade. Applications that
//! want output call [`init_logging`] once at startup.
//!
//! Level selection, in priority order:
//!
//! 1. `RUST_LOG` environment variable (if set)
//! 2. `quiet` (errors only) or `verbose` (debug/trace)
//! 3. Default: info level
//!
//! The HTTP stack (`reqwest`, `hyper`, `rustls`) is capped at `warn` below
//! trace level, so `-v` shows lookup decisions without connection chatter.
//!
//! # Example
//!
//! ```rust,no_run
//! use netvendor::logging::init_logging;
//!
//! init_logging(1, false);
//! log::debug!("resolver starting");
//! ```

use env_logger::Builder;
use log::LevelFilter;
use std::env;
use std::io::Write;

/// Crates whose logs are capped unless tracing.
const NOISY_CRATES: &[&str] = &["reqwest", "hyper", "hyper_util", "rustls"];

/// Initialize `env_logger`.
///
/// Safe to call more than once; later calls are ignored.
///
/// # Arguments
///
/// * `verbose` - Verbosity count (0=info, 1=debug, 2+=trace)
/// * `quiet` - If true, only show errors (overridden by `RUST_LOG`)
pub fn init_logging(verbose: u8, quiet: bool) {
    let mut builder = Builder::new();
    let use_env = env::var("RUST_LOG").is_ok();
    let level = determine_level(verbose, quiet);

    if use_env {
        builder.parse_default_env();
    } else {
        builder.filter_level(level);
        if level < LevelFilter::Trace {
            for name in NOISY_CRATES {
                builder.filter_module(name, level.min(LevelFilter::Warn));
            }
        }
    }

    configure_format(&mut builder, verbose);

    if builder.try_init().is_ok() {
        if use_env {
            log::debug!(
                "Logging initialized from RUST_LOG: {:?}",
                env::var("RUST_LOG").ok()
            );
        } else {
            log::debug!("Logging initialized at level: {:?}", level);
        }
    }
}

/// Determine the log level from verbosity flags.
fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

/// Timestamped lines; module path appears once verbose.
fn configure_format(builder: &mut Builder, verbose: u8) {
    builder.format(move |buf, record| {
        let timestamp = buf.timestamp_seconds();
        let level = record.level();
        let level_style = buf.default_level_style(level);

        if verbose >= 1 {
            writeln!(
                buf,
                "{} {level_style}{:<5}{level_style:#} [{}] {}",
                timestamp,
                level,
                record.module_path().unwrap_or("unknown"),
                record.args()
            )
        } else {
            writeln!(
                buf,
                "{} {level_style}{:<5}{level_style:#} {}",
                timestamp,
                level,
                record.args()
            )
        }
    });
}

/// Name of the currently active maximum level.
#[must_use]
pub fn current_level_name() -> &'static str {
    match log::max_level() {
        LevelFilter::Off => "off",
        LevelFilter::Error => "error",
        LevelFilter::Warn => "warn",
        LevelFilter::Info => "info",
        LevelFilter::Debug => "debug",
        LevelFilter::Trace => "trace",
    }
}
