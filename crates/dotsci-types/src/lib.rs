//! Common types module for the dotsci publication pipeline.
//!
//! This module defines the data model shared by the session, storage, ledger and
//! orchestration crates. Keeping these types in one place means every component
//! agrees on what an address, a locator or a publication record looks like.

/// Identity types: addresses and signatures.
pub mod account;
/// Asset input and derived metadata document.
pub mod asset;
/// Ledger-side types: transaction receipts, publication records, grant proposals.
pub mod ledger;
/// Publication pipeline stages, events and results.
pub mod publication;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Storage-side types: containers, objects and locators.
pub mod storage;
/// Utility functions for hex formatting, unit conversion and naming.
pub mod utils;
/// Configuration validation types for implementation-specific TOML tables.
pub mod validation;

pub use account::*;
pub use asset::*;
pub use ledger::*;
pub use publication::*;
pub use registry::ImplementationRegistry;
pub use storage::*;
pub use utils::{
	current_timestamp_millis, format_units, pack_bytes32, parse_address, parse_units,
	sanitize_file_name, truncate_id, with_0x_prefix, without_0x_prefix, PackedBytes32,
	UnitsError,
};
pub use validation::*;
