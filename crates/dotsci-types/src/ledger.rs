//! Ledger-side types.
//!
//! Receipts for finalized transactions, publication records and grant proposals
//! as read back from the registry contract.

use crate::{format_units, with_0x_prefix, Address};
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction hash stored as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionHash(pub Vec<u8>);

impl fmt::Display for TransactionHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", with_0x_prefix(&hex::encode(&self.0)))
	}
}

/// Receipt of a transaction that reached the configured finality depth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
	pub hash: TransactionHash,
	pub block_number: u64,
	/// False when the transaction was included but its execution reverted.
	pub success: bool,
}

/// Access status of a publication record, derived from its price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordStatus {
	/// Free to read.
	Open,
	/// Reading requires a payment.
	Priced,
}

/// A publication record as observed through the ledger read path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationRecord {
	/// Monotonically assigned by the ledger, starting at 1.
	pub id: u64,
	pub author: Address,
	pub metadata_uri: String,
	/// Only filled by backends whose contract exposes the field.
	pub content_uri: Option<String>,
	pub content_hash: Option<String>,
	pub price: Option<U256>,
}

impl PublicationRecord {
	pub fn status(&self) -> RecordStatus {
		match self.price {
			Some(price) if !price.is_zero() => RecordStatus::Priced,
			_ => RecordStatus::Open,
		}
	}

	/// True when this record was registered by `author` for `metadata_uri`.
	pub fn matches(&self, author: &Address, metadata_uri: &str) -> bool {
		&self.author == author && self.metadata_uri == metadata_uri
	}
}

/// Lifecycle of a grant proposal; the ledger encodes it as a `uint8` index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalStatus {
	Pending,
	AiApproved,
	Rejected,
	Funded,
}

impl TryFrom<u8> for ProposalStatus {
	type Error = String;

	fn try_from(value: u8) -> Result<Self, Self::Error> {
		match value {
			0 => Ok(ProposalStatus::Pending),
			1 => Ok(ProposalStatus::AiApproved),
			2 => Ok(ProposalStatus::Rejected),
			3 => Ok(ProposalStatus::Funded),
			other => Err(format!("Unknown proposal status index: {}", other)),
		}
	}
}

impl fmt::Display for ProposalStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let label = match self {
			ProposalStatus::Pending => "Pending",
			ProposalStatus::AiApproved => "AI_Approved",
			ProposalStatus::Rejected => "Rejected",
			ProposalStatus::Funded => "Funded",
		};
		f.write_str(label)
	}
}

/// A funding proposal registered with the DAO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantProposal {
	pub id: u64,
	pub proposer: Address,
	pub description: String,
	pub requested_amount: U256,
	pub for_votes: U256,
	pub against_votes: U256,
	pub executed: bool,
	pub status: ProposalStatus,
}

impl GrantProposal {
	pub fn matches(&self, proposer: &Address, description: &str) -> bool {
		&self.proposer == proposer && self.description == description
	}

	/// Requested amount rendered in the native coin.
	pub fn requested_display(&self, decimals: u8) -> String {
		format_units(self.requested_amount, decimals)
			.unwrap_or_else(|_| self.requested_amount.to_string())
	}
}
