//! Registry contract bindings and prepared calls.
//!
//! Every mutating call is turned into a [`PreparedCall`] before it reaches a
//! backend. A prepared call is a plain value: encoded once, never mutated, and
//! discarded if estimation fails. Whether a payment is attached is decided at
//! preparation time, so a payable call can never go out without its value.

use crate::LedgerError;
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{sol, SolCall};

sol! {
	interface IDotSciRegistry {
		struct Proposal {
			uint256 id;
			address proposer;
			string description;
			uint256 requestedAmount;
			uint256 forVotes;
			uint256 againstVotes;
			bool executed;
			uint8 status;
		}

		struct Paper {
			string tokenUri;
			string contentUri;
			bytes32 expectedHash;
			uint256 price;
		}

		function submitPaper(
			string memory tokenUri,
			string memory contentUri,
			bytes32 expectedHash,
			uint256 price,
			bool createDao
		) external;

		function createGrantProposal(string memory description, uint256 amount) external;

		function voteOnProposal(uint256 proposalId, bool supports) external payable;

		function paperCounter() external view returns (uint256);

		function tokenURI(uint256 tokenId) external view returns (string memory);

		function ownerOf(uint256 tokenId) external view returns (address);

		// Not every deployment exposes this; a revert means "no details".
		function getPaper(uint256 tokenId) external view returns (Paper memory);

		function getProposalCounter() external view returns (uint256);

		function getProposal(uint256 proposalId) external view returns (Proposal memory);
	}
}

/// A state-mutating registry call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCall {
	SubmitPaper {
		metadata_uri: String,
		content_uri: String,
		content_hash: B256,
		price: U256,
		create_dao: bool,
	},
	CreateGrantProposal {
		description: String,
		amount: U256,
	},
	VoteOnProposal {
		proposal_id: U256,
		supports: bool,
	},
}

impl LedgerCall {
	pub fn method(&self) -> &'static str {
		match self {
			LedgerCall::SubmitPaper { .. } => "submitPaper",
			LedgerCall::CreateGrantProposal { .. } => "createGrantProposal",
			LedgerCall::VoteOnProposal { .. } => "voteOnProposal",
		}
	}

	/// Whether the contract expects a payment with this call.
	pub fn is_payable(&self) -> bool {
		matches!(self, LedgerCall::VoteOnProposal { .. })
	}

	fn encode(&self) -> Vec<u8> {
		match self {
			LedgerCall::SubmitPaper {
				metadata_uri,
				content_uri,
				content_hash,
				price,
				create_dao,
			} => IDotSciRegistry::submitPaperCall {
				tokenUri: metadata_uri.clone(),
				contentUri: content_uri.clone(),
				expectedHash: *content_hash,
				price: *price,
				createDao: *create_dao,
			}
			.abi_encode(),
			LedgerCall::CreateGrantProposal {
				description,
				amount,
			} => IDotSciRegistry::createGrantProposalCall {
				description: description.clone(),
				amount: *amount,
			}
			.abi_encode(),
			LedgerCall::VoteOnProposal {
				proposal_id,
				supports,
			} => IDotSciRegistry::voteOnProposalCall {
				proposalId: *proposal_id,
				supports: *supports,
			}
			.abi_encode(),
		}
	}

	/// Encodes the call for `to` on `chain_id`.
	///
	/// A payable call must carry an explicit `value` (zero included); a
	/// non-payable call must not carry one.
	pub fn prepare(
		self,
		to: Address,
		chain_id: u64,
		value: Option<U256>,
	) -> Result<PreparedCall, LedgerError> {
		match (self.is_payable(), value) {
			(true, None) => {
				return Err(LedgerError::InvalidArgument(format!(
					"{} requires an explicit value",
					self.method()
				)))
			},
			(false, Some(_)) => {
				return Err(LedgerError::InvalidArgument(format!(
					"{} does not accept a value",
					self.method()
				)))
			},
			_ => {},
		}

		Ok(PreparedCall {
			method: self.method(),
			to,
			data: self.encode().into(),
			value,
			chain_id,
		})
	}
}

/// A read-only registry query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerQuery {
	PaperCounter,
	TokenUri(u64),
	OwnerOf(u64),
	Paper(u64),
	ProposalCounter,
	Proposal(u64),
}

impl LedgerQuery {
	pub fn method(&self) -> &'static str {
		match self {
			LedgerQuery::PaperCounter => "paperCounter",
			LedgerQuery::TokenUri(_) => "tokenURI",
			LedgerQuery::OwnerOf(_) => "ownerOf",
			LedgerQuery::Paper(_) => "getPaper",
			LedgerQuery::ProposalCounter => "getProposalCounter",
			LedgerQuery::Proposal(_) => "getProposal",
		}
	}

	pub fn prepare(self, to: Address, chain_id: u64) -> PreparedCall {
		let data = match self {
			LedgerQuery::PaperCounter => IDotSciRegistry::paperCounterCall {}.abi_encode(),
			LedgerQuery::TokenUri(id) => IDotSciRegistry::tokenURICall {
				tokenId: U256::from(id),
			}
			.abi_encode(),
			LedgerQuery::OwnerOf(id) => IDotSciRegistry::ownerOfCall {
				tokenId: U256::from(id),
			}
			.abi_encode(),
			LedgerQuery::Paper(id) => IDotSciRegistry::getPaperCall {
				tokenId: U256::from(id),
			}
			.abi_encode(),
			LedgerQuery::ProposalCounter => {
				IDotSciRegistry::getProposalCounterCall {}.abi_encode()
			},
			LedgerQuery::Proposal(id) => IDotSciRegistry::getProposalCall {
				proposalId: U256::from(id),
			}
			.abi_encode(),
		};

		PreparedCall {
			method: self.method(),
			to,
			data: data.into(),
			value: None,
			chain_id,
		}
	}
}

/// An encoded call, ready for estimation and submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedCall {
	method: &'static str,
	to: Address,
	data: Bytes,
	value: Option<U256>,
	chain_id: u64,
}

impl PreparedCall {
	pub fn method(&self) -> &'static str {
		self.method
	}

	pub fn to(&self) -> Address {
		self.to
	}

	pub fn data(&self) -> &Bytes {
		&self.data
	}

	/// Attached payment; `None` for non-payable calls.
	pub fn value(&self) -> Option<U256> {
		self.value
	}

	pub fn chain_id(&self) -> u64 {
		self.chain_id
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn registry() -> Address {
		"0xa7234f78c1fBD8b7d048c8aFF132fbefB28D9672"
			.parse()
			.unwrap()
	}

	#[test]
	fn test_vote_requires_explicit_value() {
		let call = LedgerCall::VoteOnProposal {
			proposal_id: U256::from(1u8),
			supports: true,
		};
		let result = call.clone().prepare(registry(), 5611, None);
		assert!(matches!(result, Err(LedgerError::InvalidArgument(_))));

		let prepared = call.prepare(registry(), 5611, Some(U256::ZERO)).unwrap();
		assert_eq!(prepared.value(), Some(U256::ZERO));
		assert_eq!(prepared.method(), "voteOnProposal");
	}

	#[test]
	fn test_non_payable_call_rejects_value() {
		let call = LedgerCall::CreateGrantProposal {
			description: "Fund replication study".to_string(),
			amount: U256::from(10u8),
		};
		assert!(matches!(
			call.prepare(registry(), 5611, Some(U256::from(1u8))),
			Err(LedgerError::InvalidArgument(_))
		));
	}

	#[test]
	fn test_submit_paper_encoding_uses_selector() {
		let prepared = LedgerCall::SubmitPaper {
			metadata_uri: "gnfd://0xab/1-metadata.json".to_string(),
			content_uri: "gnfd://0xab/1-paper.pdf".to_string(),
			content_hash: B256::ZERO,
			price: U256::ZERO,
			create_dao: false,
		}
		.prepare(registry(), 5611, None)
		.unwrap();

		assert_eq!(
			&prepared.data()[..4],
			IDotSciRegistry::submitPaperCall::SELECTOR.as_slice()
		);
		assert_eq!(prepared.to(), registry());
		assert_eq!(prepared.chain_id(), 5611);
		assert_eq!(prepared.value(), None);
	}

	#[test]
	fn test_query_encoding() {
		let prepared = LedgerQuery::TokenUri(7).prepare(registry(), 5611);
		assert_eq!(prepared.method(), "tokenURI");
		let decoded = IDotSciRegistry::tokenURICall::abi_decode(prepared.data()).unwrap();
		assert_eq!(decoded.tokenId, U256::from(7u8));
	}
}
