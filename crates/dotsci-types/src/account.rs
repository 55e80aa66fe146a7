//! Identity types for the publication pipeline.
//!
//! Addresses are stored as raw bytes and rendered as `0x`-prefixed hex. Signatures
//! are kept in the 65-byte `r || s || v` layout that signing agents return.

use crate::with_0x_prefix;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Ledger identity (20-byte account address).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(pub Vec<u8>);

impl Address {
	/// Lower-cased `0x` hex rendering, used wherever a name must be derived
	/// deterministically from the identity.
	pub fn to_lowercase_hex(&self) -> String {
		with_0x_prefix(&hex::encode(&self.0))
	}

	/// Returns true when every byte is zero (the ledger's "no account" value).
	pub fn is_zero(&self) -> bool {
		self.0.iter().all(|b| *b == 0)
	}
}

impl Serialize for Address {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&self.to_lowercase_hex())
	}
}

impl<'de> Deserialize<'de> for Address {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let s = String::deserialize(deserializer)?;
		crate::parse_address(&s).map_err(serde::de::Error::custom)
	}
}

impl fmt::Display for Address {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "0x{}", hex::encode(&self.0))
	}
}

impl From<alloy_primitives::Address> for Address {
	fn from(addr: alloy_primitives::Address) -> Self {
		Address(addr.as_slice().to_vec())
	}
}

impl TryFrom<&Address> for alloy_primitives::Address {
	type Error = String;

	fn try_from(addr: &Address) -> Result<Self, Self::Error> {
		if addr.0.len() != 20 {
			return Err(format!(
				"Invalid address length: expected 20 bytes, got {}",
				addr.0.len()
			));
		}
		Ok(alloy_primitives::Address::from_slice(&addr.0))
	}
}

/// Signature bytes as produced by a signing agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature(pub Vec<u8>);

impl Signature {
	pub fn to_hex(&self) -> String {
		with_0x_prefix(&hex::encode(&self.0))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::parse_address;

	#[test]
	fn test_address_display_is_lowercase_hex() {
		let address = parse_address("0xABCDEF0123456789abcdef0123456789ABCDEF01").unwrap();
		assert_eq!(
			address.to_string(),
			"0xabcdef0123456789abcdef0123456789abcdef01"
		);
		assert_eq!(address.to_lowercase_hex(), address.to_string());
	}

	#[test]
	fn test_address_serde() {
		let address = parse_address("0x1111111111111111111111111111111111111111").unwrap();
		let json = serde_json::to_string(&address).unwrap();
		assert_eq!(json, "\"0x1111111111111111111111111111111111111111\"");

		let back: Address = serde_json::from_str(&json).unwrap();
		assert_eq!(back, address);

		let too_short: Result<Address, _> = serde_json::from_str("\"0x1234\"");
		assert!(too_short.is_err());
	}

	#[test]
	fn test_zero_address() {
		assert!(Address(vec![0u8; 20]).is_zero());
		assert!(!Address(vec![1u8; 20]).is_zero());
	}

	#[test]
	fn test_alloy_address_conversion() {
		let alloy = alloy_primitives::Address::repeat_byte(0x42);
		let ours = Address::from(alloy);
		let back = alloy_primitives::Address::try_from(&ours).unwrap();
		assert_eq!(alloy, back);

		let bad = Address(vec![1, 2, 3]);
		assert!(alloy_primitives::Address::try_from(&bad).is_err());
	}
}
