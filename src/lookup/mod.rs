//! Remote vendor lookup.
//!
//! # Architecture
//!
//! * [`service`]: typed per-service configuration, response parsing, and
//!   rate-limit/backoff state.
//! * [`transport`]: the blocking HTTP seam and its `reqwest` implementation.
//! * [`clock`]: time source used for rate-limit sleeps.
//! * [`pool`]: the rotation state machine that ties them together.
//!
//! The pool never touches the cache or the failed-lookup set. It reports a
//! [`LookupOutcome`] and the resolver decides what to persist.

pub mod clock;
pub mod pool;
pub mod service;
pub mod transport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use pool::{LookupOutcome, LookupServicePool, PoolSettings};
pub use service::{LookupService, ParseMode, ServiceConfig};
pub use transport::{HttpReply, HttpTransport, Transport};
