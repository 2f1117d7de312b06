//! MAC-to-vendor resolution over the local stores and the service pool.

pub mod batch;
pub mod vendor;

pub use batch::{BatchResolver, BatchResult, BatchStats};
pub use vendor::{LocalAnswer, VendorResolver};
