//! In-memory ledger backend.
//!
//! Decodes registry calldata and applies it to an in-process contract model.
//! Writes become visible to readers only after a configurable number of
//! counter reads, which reproduces the read-after-write lag of a real node.

use crate::{
	contract::IDotSciRegistry::{self, IDotSciRegistryCalls},
	registrar::encode_return,
	LedgerError, LedgerInterface, PreparedCall,
};
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::SolInterface;
use async_trait::async_trait;
use dotsci_account::AccountSigner;
use dotsci_config::NetworkConfig;
use dotsci_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, TransactionHash,
	TransactionReceipt, ValidationError,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

const BASE_GAS: u64 = 21_000;
const CALLDATA_GAS_PER_BYTE: u64 = 16;

/// A one-shot failure consumed by the next matching call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerFailure {
	/// The next estimate reverts with this reason.
	EstimateRevert(String),
	/// The signer declines the next send.
	SendRejected(String),
	/// The next sent transaction is mined but its execution fails.
	MinedReverted,
	/// The next confirmation wait gives up.
	ConfirmationTimeout,
}

/// Snapshot of call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerCounters {
	pub estimates: usize,
	pub sends: usize,
	pub confirmations: usize,
	pub reads: usize,
}

#[derive(Debug, Clone)]
struct Paper {
	owner: Address,
	token_uri: String,
	content_uri: String,
	expected_hash: B256,
	price: U256,
	visible_at: u64,
}

#[derive(Debug, Clone)]
struct Proposal {
	proposer: Address,
	description: String,
	requested_amount: U256,
	for_votes: U256,
	against_votes: U256,
	visible_at: u64,
}

#[derive(Debug, Default)]
struct ContractState {
	papers: Vec<Paper>,
	proposals: Vec<Proposal>,
	votes: HashSet<(u64, Address)>,
	receipts: HashMap<B256, TransactionReceipt>,
	/// Counter reads served so far; drives visibility of new writes.
	counter_reads: u64,
	block_number: u64,
	nonce: u64,
}

impl ContractState {
	fn visible_papers(&self) -> usize {
		self.papers
			.iter()
			.take_while(|p| p.visible_at <= self.counter_reads)
			.count()
	}

	fn visible_proposals(&self) -> usize {
		self.proposals
			.iter()
			.take_while(|p| p.visible_at <= self.counter_reads)
			.count()
	}

	/// Checks `call` against contract rules without changing state.
	fn check(&self, from: Address, call: &IDotSciRegistryCalls, value: U256) -> Result<(), String> {
		match call {
			IDotSciRegistryCalls::submitPaper(c) if c.tokenUri.is_empty() => {
				Err("Token URI required".to_string())
			},
			IDotSciRegistryCalls::createGrantProposal(c) if c.description.is_empty() => {
				Err("Description required".to_string())
			},
			IDotSciRegistryCalls::voteOnProposal(c) => {
				let id = slot_index(c.proposalId, self.proposals.len())
					.ok_or_else(|| "Proposal does not exist".to_string())?;
				if value.is_zero() {
					return Err("Voting fee required".to_string());
				}
				if self.votes.contains(&(id as u64 + 1, from)) {
					return Err("Already voted".to_string());
				}
				Ok(())
			},
			IDotSciRegistryCalls::submitPaper(_) | IDotSciRegistryCalls::createGrantProposal(_) => {
				Ok(())
			},
			_ => Err("Not a state-changing function".to_string()),
		}
	}

	fn apply(&mut self, from: Address, call: IDotSciRegistryCalls, visible_at: u64) {
		match call {
			IDotSciRegistryCalls::submitPaper(c) => self.papers.push(Paper {
				owner: from,
				token_uri: c.tokenUri,
				content_uri: c.contentUri,
				expected_hash: c.expectedHash,
				price: c.price,
				visible_at,
			}),
			IDotSciRegistryCalls::createGrantProposal(c) => self.proposals.push(Proposal {
				proposer: from,
				description: c.description,
				requested_amount: c.amount,
				for_votes: U256::ZERO,
				against_votes: U256::ZERO,
				visible_at,
			}),
			IDotSciRegistryCalls::voteOnProposal(c) => {
				if let Some(index) = slot_index(c.proposalId, self.proposals.len()) {
					let proposal = &mut self.proposals[index];
					if c.supports {
						proposal.for_votes += U256::from(1u8);
					} else {
						proposal.against_votes += U256::from(1u8);
					}
					self.votes.insert((index as u64 + 1, from));
				}
			},
			_ => {},
		}
	}

	fn read(&mut self, call: IDotSciRegistryCalls) -> Result<Vec<u8>, LedgerError> {
		let encoded = match call {
			IDotSciRegistryCalls::paperCounter(_) => {
				self.counter_reads += 1;
				encode_return(&U256::from(self.visible_papers()))
			},
			IDotSciRegistryCalls::getProposalCounter(_) => {
				self.counter_reads += 1;
				encode_return(&U256::from(self.visible_proposals()))
			},
			IDotSciRegistryCalls::tokenURI(c) => {
				encode_return(&self.visible_paper(c.tokenId)?.token_uri)
			},
			IDotSciRegistryCalls::ownerOf(c) => encode_return(&self.visible_paper(c.tokenId)?.owner),
			IDotSciRegistryCalls::getPaper(c) => {
				let paper = self.visible_paper(c.tokenId)?;
				encode_return(&IDotSciRegistry::Paper {
					tokenUri: paper.token_uri.clone(),
					contentUri: paper.content_uri.clone(),
					expectedHash: paper.expected_hash,
					price: paper.price,
				})
			},
			IDotSciRegistryCalls::getProposal(c) => {
				let visible = self.visible_proposals();
				// Unknown ids read as an empty slot, like a default mapping entry.
				let proposal = match slot_index(c.proposalId, visible) {
					Some(index) => {
						let p = &self.proposals[index];
						IDotSciRegistry::Proposal {
							id: c.proposalId,
							proposer: p.proposer,
							description: p.description.clone(),
							requestedAmount: p.requested_amount,
							forVotes: p.for_votes,
							againstVotes: p.against_votes,
							executed: false,
							status: 0,
						}
					},
					None => IDotSciRegistry::Proposal {
						id: U256::ZERO,
						proposer: Address::ZERO,
						description: String::new(),
						requestedAmount: U256::ZERO,
						forVotes: U256::ZERO,
						againstVotes: U256::ZERO,
						executed: false,
						status: 0,
					},
				};
				encode_return(&proposal)
			},
			_ => {
				return Err(LedgerError::InvalidArgument(
					"Not a view function".to_string(),
				))
			},
		};
		Ok(encoded)
	}

	fn visible_paper(&self, token_id: U256) -> Result<&Paper, LedgerError> {
		slot_index(token_id, self.visible_papers())
			.map(|index| &self.papers[index])
			.ok_or_else(|| LedgerError::ExecutionReverted("ERC721: invalid token ID".to_string()))
	}
}

/// Zero-based index of a one-based id, if it is below `len`.
fn slot_index(id: U256, len: usize) -> Option<usize> {
	let id = u64::try_from(id).ok()? as usize;
	(id >= 1 && id <= len).then(|| id - 1)
}

/// In-memory implementation of [`LedgerInterface`].
pub struct MemoryLedger {
	chain_id: u64,
	/// Counter reads a write stays hidden for.
	read_lag: u64,
	/// Whether the modelled registry answers `getPaper`.
	paper_details: bool,
	state: Mutex<ContractState>,
	failures: Mutex<Vec<LedgerFailure>>,
	estimates: AtomicUsize,
	sends: AtomicUsize,
	confirmations: AtomicUsize,
	reads: AtomicUsize,
}

impl MemoryLedger {
	pub fn new(chain_id: u64) -> Self {
		Self::with_read_lag(chain_id, 0)
	}

	pub fn with_read_lag(chain_id: u64, read_lag: u64) -> Self {
		Self {
			chain_id,
			read_lag,
			paper_details: true,
			state: Mutex::new(ContractState::default()),
			failures: Mutex::new(Vec::new()),
			estimates: AtomicUsize::new(0),
			sends: AtomicUsize::new(0),
			confirmations: AtomicUsize::new(0),
			reads: AtomicUsize::new(0),
		}
	}

	/// Models a deployment without the `getPaper` view.
	pub fn without_paper_details(mut self) -> Self {
		self.paper_details = false;
		self
	}

	/// Queues a one-shot failure.
	pub async fn inject(&self, failure: LedgerFailure) {
		self.failures.lock().await.push(failure);
	}

	pub fn counters(&self) -> LedgerCounters {
		LedgerCounters {
			estimates: self.estimates.load(Ordering::SeqCst),
			sends: self.sends.load(Ordering::SeqCst),
			confirmations: self.confirmations.load(Ordering::SeqCst),
			reads: self.reads.load(Ordering::SeqCst),
		}
	}

	async fn take_failure(&self, pick: impl Fn(&LedgerFailure) -> bool) -> Option<LedgerFailure> {
		let mut failures = self.failures.lock().await;
		let index = failures.iter().position(pick)?;
		Some(failures.remove(index))
	}

	fn decode(&self, call: &PreparedCall) -> Result<IDotSciRegistryCalls, LedgerError> {
		if call.chain_id() != self.chain_id {
			return Err(LedgerError::NetworkMismatch {
				expected: self.chain_id,
				actual: call.chain_id(),
			});
		}
		IDotSciRegistryCalls::abi_decode(call.data())
			.map_err(|e| LedgerError::InvalidArgument(format!("Unknown calldata: {}", e)))
	}
}

/// Configuration schema for [`MemoryLedger`].
pub struct MemoryLedgerSchema;

impl ConfigSchema for MemoryLedgerSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![Field::new(
				"read_lag",
				FieldType::Integer {
					min: Some(0),
					max: Some(1_000),
				},
			)],
		);
		schema.validate(config)
	}
}

#[async_trait]
impl LedgerInterface for MemoryLedger {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryLedgerSchema)
	}

	fn chain_id(&self) -> u64 {
		self.chain_id
	}

	async fn estimate_gas(&self, from: Address, call: &PreparedCall) -> Result<u64, LedgerError> {
		self.estimates.fetch_add(1, Ordering::SeqCst);
		let decoded = self.decode(call)?;

		if let Some(LedgerFailure::EstimateRevert(reason)) = self
			.take_failure(|f| matches!(f, LedgerFailure::EstimateRevert(_)))
			.await
		{
			return Err(LedgerError::ExecutionReverted(reason));
		}

		let state = self.state.lock().await;
		state
			.check(from, &decoded, call.value().unwrap_or_default())
			.map_err(LedgerError::ExecutionReverted)?;

		Ok(BASE_GAS + CALLDATA_GAS_PER_BYTE * call.data().len() as u64)
	}

	async fn send(
		&self,
		signer: &AccountSigner,
		call: &PreparedCall,
		_gas_limit: u64,
	) -> Result<TransactionHash, LedgerError> {
		self.sends.fetch_add(1, Ordering::SeqCst);
		let decoded = self.decode(call)?;

		if let Some(LedgerFailure::SendRejected(reason)) = self
			.take_failure(|f| matches!(f, LedgerFailure::SendRejected(_)))
			.await
		{
			return Err(LedgerError::SubmissionRejected(reason));
		}
		let forced_revert = self
			.take_failure(|f| matches!(f, LedgerFailure::MinedReverted))
			.await
			.is_some();

		let from = signer.address();
		let mut state = self.state.lock().await;
		state.nonce += 1;
		state.block_number += 1;

		let mut preimage = state.nonce.to_be_bytes().to_vec();
		preimage.extend_from_slice(call.data());
		let hash = keccak256(&preimage);

		// A transaction that fails on chain is still mined; only its effects are dropped.
		let success =
			!forced_revert && state.check(from, &decoded, call.value().unwrap_or_default()).is_ok();
		if success {
			let visible_at = state.counter_reads + self.read_lag;
			state.apply(from, decoded, visible_at);
		}

		let receipt = TransactionReceipt {
			hash: TransactionHash(hash.to_vec()),
			block_number: state.block_number,
			success,
		};
		state.receipts.insert(hash, receipt);
		tracing::debug!(tx_hash = %hash, method = call.method(), success, "Mined transaction");

		Ok(TransactionHash(hash.to_vec()))
	}

	async fn wait_for_confirmation(
		&self,
		hash: &TransactionHash,
		_confirmations: u64,
		timeout: Duration,
	) -> Result<TransactionReceipt, LedgerError> {
		self.confirmations.fetch_add(1, Ordering::SeqCst);

		if self
			.take_failure(|f| matches!(f, LedgerFailure::ConfirmationTimeout))
			.await
			.is_some()
		{
			return Err(LedgerError::Network(format!(
				"Transaction {} not confirmed within {}s",
				hash,
				timeout.as_secs()
			)));
		}

		let key = B256::try_from(hash.0.as_slice())
			.map_err(|_| LedgerError::InvalidArgument(format!("Invalid transaction hash {}", hash)))?;
		self.state
			.lock()
			.await
			.receipts
			.get(&key)
			.cloned()
			.ok_or_else(|| LedgerError::Network(format!("Transaction {} not found", hash)))
	}

	async fn call(&self, call: &PreparedCall) -> Result<Bytes, LedgerError> {
		self.reads.fetch_add(1, Ordering::SeqCst);
		let decoded = self.decode(call)?;
		if !self.paper_details && matches!(decoded, IDotSciRegistryCalls::getPaper(_)) {
			return Err(LedgerError::ExecutionReverted(
				"function selector was not recognized".to_string(),
			));
		}
		self.state.lock().await.read(decoded).map(Bytes::from)
	}
}

/// Factory function for the in-memory ledger.
pub fn create_ledger(
	config: &toml::Value,
	network: &NetworkConfig,
) -> Result<Box<dyn LedgerInterface>, LedgerError> {
	MemoryLedgerSchema
		.validate(config)
		.map_err(|e| LedgerError::Configuration(e.to_string()))?;

	let read_lag = config
		.get("read_lag")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64)
		.unwrap_or(0);

	Ok(Box::new(MemoryLedger::with_read_lag(network.chain_id, read_lag)))
}

/// Registry for the in-memory ledger.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = crate::LedgerFactory;

	fn factory() -> Self::Factory {
		create_ledger
	}
}

impl crate::LedgerRegistry for Registry {}
