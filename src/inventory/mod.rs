//! Device inventories from switch and router dumps.
//!
//! [`parser`] turns raw `show` output into devices; [`process`] resolves
//! their vendors, skipping the network for inputs already processed.

pub mod parser;
pub mod process;

pub use parser::{detect_format, parse_dump, Device, DumpFormat, ParsedDump};
pub use process::{count_vendors, Inventory, InventoryReport, ResolvedDevice};
