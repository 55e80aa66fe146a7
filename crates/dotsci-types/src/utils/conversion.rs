//! Conversion utilities between human input and ledger encodings.
//!
//! Amounts are entered as decimal strings ("0.1") and submitted as fixed-point
//! integers scaled by the ledger's declared decimal precision. Fixed-width byte
//! arguments are packed into exactly 32 bytes with the truncation reported back
//! to the caller.

use super::formatting::without_0x_prefix;
use crate::Address;
use alloy_primitives::{
	utils::{self as alloy_units, ParseUnits},
	B256, U256,
};
use thiserror::Error;

/// Width of the ledger's fixed-size hash argument.
const BYTES32_WIDTH: usize = 32;

/// Maximum payload of a packed short string; the final byte stays zero as terminator.
const SHORT_STRING_MAX: usize = BYTES32_WIDTH - 1;

/// Errors from decimal/fixed-point conversion.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnitsError {
	/// The amount could not be parsed at the requested precision.
	#[error("Invalid amount '{amount}': {reason}")]
	InvalidAmount { amount: String, reason: String },
	/// Ledger amounts are unsigned.
	#[error("Negative amount not allowed: {0}")]
	Negative(String),
}

/// Parses a hex string address (with or without "0x" prefix) into an [`Address`].
pub fn parse_address(hex_str: &str) -> Result<Address, String> {
	let hex = without_0x_prefix(hex_str.trim());
	hex::decode(hex)
		.map_err(|e| format!("Invalid hex address: {}", e))
		.and_then(|bytes| {
			if bytes.len() != 20 {
				Err(format!(
					"Invalid address length: expected 20 bytes, got {}",
					bytes.len()
				))
			} else {
				Ok(Address(bytes))
			}
		})
}

/// Converts a human decimal amount into the ledger's fixed-point integer unit.
///
/// `decimals` is the ledger's declared precision (18 for the native coin).
pub fn parse_units(amount: &str, decimals: u8) -> Result<U256, UnitsError> {
	let trimmed = amount.trim();
	if trimmed.is_empty() {
		return Err(UnitsError::InvalidAmount {
			amount: String::new(),
			reason: "empty amount".to_string(),
		});
	}
	// Excess precision is rejected rather than rounded away.
	if let Some((_, fraction)) = trimmed.split_once('.') {
		if fraction.len() > decimals as usize {
			return Err(UnitsError::InvalidAmount {
				amount: trimmed.to_string(),
				reason: format!("more than {} fractional digits", decimals),
			});
		}
	}
	match alloy_units::parse_units(trimmed, decimals) {
		Ok(ParseUnits::U256(value)) => Ok(value),
		Ok(ParseUnits::I256(_)) => Err(UnitsError::Negative(trimmed.to_string())),
		Err(e) => Err(UnitsError::InvalidAmount {
			amount: trimmed.to_string(),
			reason: e.to_string(),
		}),
	}
}

/// Converts a ledger fixed-point integer back into a decimal string for display.
///
/// Trailing zeros in the fractional part are removed ("1.5", "0.0001", "2").
pub fn format_units(value: U256, decimals: u8) -> Result<String, UnitsError> {
	let formatted =
		alloy_units::format_units(value, decimals).map_err(|e| UnitsError::InvalidAmount {
			amount: value.to_string(),
			reason: e.to_string(),
		})?;

	if !formatted.contains('.') {
		return Ok(formatted);
	}
	let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
	Ok(if trimmed.is_empty() {
		"0".to_string()
	} else {
		trimmed.to_string()
	})
}

/// Result of packing a caller value into a 32-byte ledger argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedBytes32 {
	/// The exact bytes submitted to the ledger.
	pub value: B256,
	/// True when part of the input did not fit and was dropped.
	pub truncated: bool,
}

/// Packs a caller-supplied value into the ledger's `bytes32` argument.
///
/// Two encodings are recognised:
/// - a `0x`-prefixed string of exactly 64 hex digits is already a 32-byte value
///   and is decoded verbatim;
/// - anything else is treated as text: its UTF-8 bytes are cut at a character
///   boundary to at most 31 bytes and right-padded with zeros, which keeps a
///   terminating zero byte (the ledger's short-string convention).
///
/// Truncation never happens silently; it is reported through
/// [`PackedBytes32::truncated`].
pub fn pack_bytes32(input: &str) -> PackedBytes32 {
	let digits = without_0x_prefix(input);
	if digits.len() != input.len() && digits.len() == BYTES32_WIDTH * 2 {
		if let Ok(bytes) = hex::decode(digits) {
			return PackedBytes32 {
				value: B256::from_slice(&bytes),
				truncated: false,
			};
		}
	}

	let mut end = input.len().min(SHORT_STRING_MAX);
	while !input.is_char_boundary(end) {
		end -= 1;
	}

	let mut packed = [0u8; BYTES32_WIDTH];
	packed[..end].copy_from_slice(&input.as_bytes()[..end]);

	PackedBytes32 {
		value: B256::from(packed),
		truncated: end < input.len(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_address() {
		let addr = parse_address("0x5FbDB2315678afecb367f032d93F642f64180aa3").unwrap();
		assert_eq!(addr.0.len(), 20);
		assert!(parse_address("0x1234").is_err());
		assert!(parse_address("not-hex").is_err());
	}

	#[test]
	fn test_parse_units_native_precision() {
		assert_eq!(
			parse_units("0.1", 18).unwrap(),
			U256::from(100_000_000_000_000_000u64)
		);
		assert_eq!(parse_units("0", 18).unwrap(), U256::ZERO);
		assert_eq!(
			parse_units("0.0001", 18).unwrap(),
			U256::from(100_000_000_000_000u64)
		);
		assert_eq!(parse_units("2", 6).unwrap(), U256::from(2_000_000u64));
	}

	#[test]
	fn test_parse_units_rejects_bad_input() {
		assert!(matches!(
			parse_units("abc", 18),
			Err(UnitsError::InvalidAmount { .. })
		));
		assert!(matches!(parse_units("-1", 18), Err(UnitsError::Negative(_))));
		// More fractional digits than the ledger supports
		assert!(parse_units("0.1234567", 6).is_err());
	}

	#[test]
	fn test_format_units_trims() {
		let wei = U256::from(1_500_000_000_000_000_000u64);
		assert_eq!(format_units(wei, 18).unwrap(), "1.5");
		assert_eq!(format_units(U256::ZERO, 18).unwrap(), "0");
		assert_eq!(
			format_units(U256::from(2_000_000_000_000_000_000u64), 18).unwrap(),
			"2"
		);
		assert_eq!(
			format_units(U256::from(100_000_000_000_000u64), 18).unwrap(),
			"0.0001"
		);
	}

	#[test]
	fn test_decimal_round_trip() {
		let amount = parse_units("12.345", 18).unwrap();
		assert_eq!(format_units(amount, 18).unwrap(), "12.345");
	}

	#[test]
	fn test_pack_short_text() {
		let packed = pack_bytes32("abc");
		assert!(!packed.truncated);
		assert_eq!(&packed.value[..3], b"abc");
		assert!(packed.value[3..].iter().all(|b| *b == 0));
	}

	#[test]
	fn test_pack_long_text_truncates_to_31_bytes() {
		let input = "a".repeat(40);
		let packed = pack_bytes32(&input);
		assert!(packed.truncated);
		assert_eq!(&packed.value[..31], "a".repeat(31).as_bytes());
		assert_eq!(packed.value[31], 0);
	}

	#[test]
	fn test_pack_truncation_respects_char_boundaries() {
		// 30 ASCII bytes followed by a 2-byte character that would straddle byte 31
		let input = format!("{}é", "x".repeat(30));
		let packed = pack_bytes32(&input);
		assert!(packed.truncated);
		assert_eq!(&packed.value[..30], "x".repeat(30).as_bytes());
		assert_eq!(packed.value[30], 0);
	}

	#[test]
	fn test_pack_full_width_hex_is_verbatim() {
		let hex_hash = format!("0x{}", "ab".repeat(32));
		let packed = pack_bytes32(&hex_hash);
		assert!(!packed.truncated);
		assert_eq!(packed.value, B256::repeat_byte(0xab));
	}

	#[test]
	fn test_pack_unprefixed_hex_is_text() {
		let digits = "ab".repeat(32);
		let packed = pack_bytes32(&digits);
		assert!(packed.truncated);
		assert_eq!(&packed.value[..31], &digits.as_bytes()[..31]);
	}
}
