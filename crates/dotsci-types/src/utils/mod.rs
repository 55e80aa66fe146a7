//! Utility functions for common type conversions and formatting.
//!
//! This module provides helpers for hex prefix handling, decimal/fixed-point unit
//! conversion, fixed-width packing of ledger arguments, and object naming.

pub mod builders;
pub mod conversion;
pub mod formatting;
pub mod naming;

pub use conversion::{
	format_units, pack_bytes32, parse_address, parse_units, PackedBytes32, UnitsError,
};
pub use formatting::{truncate_id, with_0x_prefix, without_0x_prefix};
pub use naming::{current_timestamp_millis, sanitize_file_name};
