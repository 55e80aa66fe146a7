//! Domain operations on the publication registry.
//!
//! [`LedgerRegistrar::submit`] is the single write path: it checks the
//! session's chain, estimates (so a revert is caught before anything is
//! broadcast), sends through the session's signer and waits for the configured
//! number of confirmations. The typed operations and reads are built on it.

use crate::{
	contract::IDotSciRegistry, LedgerCall, LedgerError, LedgerInterface, LedgerQuery, PreparedCall,
};
use alloy_primitives::{hex, Address as EvmAddress, U256};
use alloy_sol_types::{SolCall, SolValue};
use dotsci_account::Session;
use dotsci_types::{
	format_units, pack_bytes32, parse_units, Address, GrantProposal, ProposalStatus,
	PublicationRecord, TransactionReceipt,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Chain and finality settings for a registrar.
#[derive(Debug, Clone)]
pub struct RegistrarSettings {
	pub contract_address: EvmAddress,
	/// Decimal precision of the native coin.
	pub native_decimals: u8,
	pub min_confirmations: u64,
	pub confirmation_timeout: Duration,
}

/// Outcome of a finalized `submitPaper` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperSubmission {
	pub receipt: TransactionReceipt,
	/// True when the content hash did not fit the ledger's hash field and was cut.
	pub hash_truncated: bool,
}

/// Submits registry calls and reads registry state.
pub struct LedgerRegistrar {
	backend: Arc<dyn LedgerInterface>,
	settings: RegistrarSettings,
	/// Cleared the first time the registry rejects `getPaper`.
	paper_details: AtomicBool,
}

impl LedgerRegistrar {
	pub fn new(backend: Arc<dyn LedgerInterface>, settings: RegistrarSettings) -> Self {
		Self {
			backend,
			settings,
			paper_details: AtomicBool::new(true),
		}
	}

	pub fn chain_id(&self) -> u64 {
		self.backend.chain_id()
	}

	pub fn contract_address(&self) -> EvmAddress {
		self.settings.contract_address
	}

	/// Converts a human decimal amount to the ledger's fixed-point unit.
	pub fn to_units(&self, amount: &str) -> Result<U256, LedgerError> {
		parse_units(amount, self.settings.native_decimals)
			.map_err(|e| LedgerError::InvalidArgument(e.to_string()))
	}

	/// Renders a ledger amount as a decimal string.
	pub fn format_amount(&self, value: U256) -> String {
		format_units(value, self.settings.native_decimals).unwrap_or_else(|_| value.to_string())
	}

	/// Encodes `call` for the registry on this registrar's chain.
	pub fn prepare(&self, call: LedgerCall, value: Option<U256>) -> Result<PreparedCall, LedgerError> {
		call.prepare(self.settings.contract_address, self.chain_id(), value)
	}

	/// Estimates, sends and waits for finality of a prepared call.
	#[instrument(skip_all, fields(method = call.method(), chain_id = call.chain_id()))]
	pub async fn submit(
		&self,
		session: &Session,
		call: PreparedCall,
	) -> Result<TransactionReceipt, LedgerError> {
		let expected = self.chain_id();
		if session.chain_id() != expected {
			return Err(LedgerError::NetworkMismatch {
				expected,
				actual: session.chain_id(),
			});
		}
		if call.chain_id() != expected {
			return Err(LedgerError::NetworkMismatch {
				expected,
				actual: call.chain_id(),
			});
		}

		let signer = session.signer();
		let gas_limit = self
			.backend
			.estimate_gas(signer.address(), &call)
			.await
			.inspect_err(|e| warn!(error = %e, "Estimation failed; nothing was broadcast"))?;
		debug!(gas_limit, "Estimated call");

		let hash = self.backend.send(&signer, &call, gas_limit).await?;
		info!(tx_hash = %hash, "Transaction broadcast, waiting for finality");

		let receipt = self
			.backend
			.wait_for_confirmation(
				&hash,
				self.settings.min_confirmations,
				self.settings.confirmation_timeout,
			)
			.await?;

		if !receipt.success {
			warn!(tx_hash = %hash, block = receipt.block_number, "Transaction reverted");
			return Err(LedgerError::ExecutionReverted(format!(
				"transaction {} reverted in block {}",
				hash, receipt.block_number
			)));
		}

		info!(tx_hash = %hash, block = receipt.block_number, "Transaction final");
		Ok(receipt)
	}

	/// Registers a paper. An empty price means free.
	pub async fn submit_paper(
		&self,
		session: &Session,
		metadata_uri: &str,
		content_uri: &str,
		content_hash: &str,
		price: &str,
		create_dao: bool,
	) -> Result<PaperSubmission, LedgerError> {
		let packed = pack_bytes32(content_hash);
		if packed.truncated {
			warn!(
				content_hash,
				"Content hash longer than the ledger field; submitting a truncated value"
			);
		}
		let price = if price.trim().is_empty() { "0" } else { price };

		let call = self.prepare(
			LedgerCall::SubmitPaper {
				metadata_uri: metadata_uri.to_string(),
				content_uri: content_uri.to_string(),
				content_hash: packed.value,
				price: self.to_units(price)?,
				create_dao,
			},
			None,
		)?;

		let receipt = self.submit(session, call).await?;
		Ok(PaperSubmission {
			receipt,
			hash_truncated: packed.truncated,
		})
	}

	pub async fn create_grant_proposal(
		&self,
		session: &Session,
		description: &str,
		amount: &str,
	) -> Result<TransactionReceipt, LedgerError> {
		if description.trim().is_empty() {
			return Err(LedgerError::InvalidArgument(
				"proposal description is empty".to_string(),
			));
		}
		let call = self.prepare(
			LedgerCall::CreateGrantProposal {
				description: description.to_string(),
				amount: self.to_units(amount)?,
			},
			None,
		)?;
		self.submit(session, call).await
	}

	/// Votes on a proposal, attaching `fee` (decimal native coin) as payment.
	pub async fn vote(
		&self,
		session: &Session,
		proposal_id: u64,
		supports: bool,
		fee: &str,
	) -> Result<TransactionReceipt, LedgerError> {
		let call = self.prepare(
			LedgerCall::VoteOnProposal {
				proposal_id: U256::from(proposal_id),
				supports,
			},
			Some(self.to_units(fee)?),
		)?;
		self.submit(session, call).await
	}

	async fn query<C: SolCall>(&self, query: LedgerQuery) -> Result<C::Return, LedgerError> {
		let call = query.prepare(self.settings.contract_address, self.chain_id());
		let data = self.backend.call(&call).await?;
		C::abi_decode_returns(&data).map_err(|e| {
			LedgerError::InvalidResponse(format!("Failed to decode {}: {}", query.method(), e))
		})
	}

	pub async fn paper_count(&self) -> Result<u64, LedgerError> {
		let count = self
			.query::<IDotSciRegistry::paperCounterCall>(LedgerQuery::PaperCounter)
			.await?;
		to_u64(count, "paperCounter")
	}

	/// Author and metadata URI of a paper: the fields every deployment exposes.
	async fn paper_summary(&self, id: u64) -> Result<PublicationRecord, LedgerError> {
		let metadata_uri = self
			.query::<IDotSciRegistry::tokenURICall>(LedgerQuery::TokenUri(id))
			.await?;
		let owner = self
			.query::<IDotSciRegistry::ownerOfCall>(LedgerQuery::OwnerOf(id))
			.await?;

		Ok(PublicationRecord {
			id,
			author: Address::from(owner),
			metadata_uri,
			content_uri: None,
			content_hash: None,
			price: None,
		})
	}

	/// Fills content URI, hash and price when the registry exposes `getPaper`.
	async fn with_details(
		&self,
		mut record: PublicationRecord,
	) -> Result<PublicationRecord, LedgerError> {
		if !self.paper_details.load(Ordering::Relaxed) {
			return Ok(record);
		}

		match self
			.query::<IDotSciRegistry::getPaperCall>(LedgerQuery::Paper(record.id))
			.await
		{
			Ok(paper) => {
				record.content_uri = Some(paper.contentUri);
				record.content_hash = Some(hex::encode_prefixed(paper.expectedHash));
				record.price = Some(paper.price);
			},
			Err(LedgerError::ExecutionReverted(reason))
			| Err(LedgerError::InvalidResponse(reason)) => {
				debug!(reason = %reason, "Registry has no getPaper view, reading summaries only");
				self.paper_details.store(false, Ordering::Relaxed);
			},
			Err(e) => return Err(e),
		}
		Ok(record)
	}

	pub async fn paper(&self, id: u64) -> Result<PublicationRecord, LedgerError> {
		let record = self.paper_summary(id).await?;
		self.with_details(record).await
	}

	/// All papers in id order; an empty registry yields an empty list.
	pub async fn list_papers(&self) -> Result<Vec<PublicationRecord>, LedgerError> {
		let count = self.paper_count().await?;
		// The count comes from the contract; grow as records are read.
		let mut papers = Vec::new();
		for id in 1..=count {
			papers.push(self.paper(id).await?);
		}
		Ok(papers)
	}

	/// Newest paper with an id above `after` registered by `author` for
	/// `metadata_uri`, if visible yet.
	///
	/// `after` is a count read before the paper was submitted, so only records
	/// created since are scanned. Zero scans the whole registry.
	pub async fn find_paper(
		&self,
		author: &Address,
		metadata_uri: &str,
		after: u64,
	) -> Result<Option<PublicationRecord>, LedgerError> {
		let count = self.paper_count().await?;
		for id in (after.saturating_add(1)..=count).rev() {
			let record = self.paper_summary(id).await?;
			if record.matches(author, metadata_uri) {
				return self.with_details(record).await.map(Some);
			}
		}
		Ok(None)
	}

	pub async fn proposal_count(&self) -> Result<u64, LedgerError> {
		let count = self
			.query::<IDotSciRegistry::getProposalCounterCall>(LedgerQuery::ProposalCounter)
			.await?;
		to_u64(count, "getProposalCounter")
	}

	/// A proposal by id; `None` for empty slots (zero proposer).
	pub async fn proposal(&self, id: u64) -> Result<Option<GrantProposal>, LedgerError> {
		let raw = self
			.query::<IDotSciRegistry::getProposalCall>(LedgerQuery::Proposal(id))
			.await?;
		if raw.proposer == EvmAddress::ZERO {
			return Ok(None);
		}

		let status = ProposalStatus::try_from(raw.status).map_err(LedgerError::InvalidResponse)?;
		Ok(Some(GrantProposal {
			id: to_u64(raw.id, "proposal id")?,
			proposer: Address::from(raw.proposer),
			description: raw.description,
			requested_amount: raw.requestedAmount,
			for_votes: raw.forVotes,
			against_votes: raw.againstVotes,
			executed: raw.executed,
			status,
		}))
	}

	pub async fn list_proposals(&self) -> Result<Vec<GrantProposal>, LedgerError> {
		let count = self.proposal_count().await?;
		let mut proposals = Vec::new();
		for id in 1..=count {
			match self.proposal(id).await? {
				Some(proposal) => proposals.push(proposal),
				None => debug!(id, "Skipping empty proposal slot"),
			}
		}
		Ok(proposals)
	}

	/// Newest proposal with an id above `after` matching proposer and description.
	pub async fn find_proposal(
		&self,
		proposer: &Address,
		description: &str,
		after: u64,
	) -> Result<Option<GrantProposal>, LedgerError> {
		let count = self.proposal_count().await?;
		for id in (after.saturating_add(1)..=count).rev() {
			if let Some(proposal) = self.proposal(id).await? {
				if proposal.matches(proposer, description) {
					return Ok(Some(proposal));
				}
			}
		}
		Ok(None)
	}
}

fn to_u64(value: U256, what: &str) -> Result<u64, LedgerError> {
	u64::try_from(value)
		.map_err(|_| LedgerError::InvalidResponse(format!("{} out of range: {}", what, value)))
}

/// ABI-encodes a single return value the way the registry returns it.
pub(crate) fn encode_return<T: SolValue>(value: &T) -> Vec<u8> {
	value.abi_encode()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::MockLedgerInterface;
	use alloy_primitives::Bytes;
	use dotsci_account::{implementations::local::LocalAgent, AgentKind, SigningAgent};
	use dotsci_types::{utils::builders::TransactionReceiptBuilder, Signature, TransactionHash};
	use mockall::predicate::eq;
	use std::sync::atomic::AtomicUsize;

	const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

	fn settings() -> RegistrarSettings {
		RegistrarSettings {
			contract_address: "0xa7234f78c1fBD8b7d048c8aFF132fbefB28D9672"
				.parse()
				.unwrap(),
			native_decimals: 18,
			min_confirmations: 1,
			confirmation_timeout: Duration::from_secs(30),
		}
	}

	async fn session(chain_id: u64) -> Session {
		let agent: Arc<dyn SigningAgent> = Arc::new(LocalAgent::new(KEY, chain_id).unwrap());
		let address = agent.request_accounts().await.unwrap().remove(0);
		Session::new(address, chain_id, AgentKind::MetaMask, agent, Signature(vec![0; 65]))
	}

	fn mock_on_chain(chain_id: u64) -> MockLedgerInterface {
		let mut backend = MockLedgerInterface::new();
		backend.expect_chain_id().return_const(chain_id);
		backend
	}

	#[tokio::test]
	async fn test_submit_waits_for_configured_finality() {
		let mut backend = mock_on_chain(5611);
		backend.expect_estimate_gas().times(1).returning(|_, _| Ok(90_000));
		backend
			.expect_send()
			.withf(|_, _, gas| *gas == 90_000)
			.times(1)
			.returning(|_, _, _| Ok(TransactionHash(vec![0xab; 32])));
		backend
			.expect_wait_for_confirmation()
			.withf(|_, confirmations, _| *confirmations == 1)
			.times(1)
			.returning(|hash, _, _| {
				Ok(TransactionReceiptBuilder::new()
					.with_hash(hash.clone())
					.with_block_number(12)
					.build())
			});

		let registrar = LedgerRegistrar::new(Arc::new(backend), settings());
		let session = session(5611).await;
		let submission = registrar
			.submit_paper(&session, "gnfd://a/1-m.json", "gnfd://a/1-p.pdf", "QmHash", "", false)
			.await
			.unwrap();

		assert_eq!(submission.receipt.block_number, 12);
		assert!(!submission.hash_truncated);
	}

	#[tokio::test]
	async fn test_estimation_revert_prevents_broadcast() {
		let mut backend = mock_on_chain(5611);
		backend
			.expect_estimate_gas()
			.returning(|_, _| Err(LedgerError::ExecutionReverted("Already voted".to_string())));
		backend.expect_send().never();

		let registrar = LedgerRegistrar::new(Arc::new(backend), settings());
		let session = session(5611).await;
		let result = registrar.vote(&session, 1, true, "0.0001").await;

		match result {
			Err(LedgerError::ExecutionReverted(reason)) => assert_eq!(reason, "Already voted"),
			other => panic!("expected revert, got {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_wrong_chain_is_detected_before_any_call() {
		let mut backend = mock_on_chain(5611);
		backend.expect_estimate_gas().never();

		let registrar = LedgerRegistrar::new(Arc::new(backend), settings());
		let session = session(1).await;
		let result = registrar
			.create_grant_proposal(&session, "Fund a replication", "1")
			.await;

		assert!(matches!(
			result,
			Err(LedgerError::NetworkMismatch {
				expected: 5611,
				actual: 1
			})
		));
	}

	#[tokio::test]
	async fn test_failed_receipt_is_reverted() {
		let mut backend = mock_on_chain(5611);
		backend.expect_estimate_gas().returning(|_, _| Ok(21_000));
		backend
			.expect_send()
			.returning(|_, _, _| Ok(TransactionHash(vec![1; 32])));
		backend
			.expect_wait_for_confirmation()
			.returning(|_, _, _| Ok(TransactionReceiptBuilder::new().reverted().build()));

		let registrar = LedgerRegistrar::new(Arc::new(backend), settings());
		let session = session(5611).await;
		let result = registrar
			.create_grant_proposal(&session, "Fund a replication", "1")
			.await;
		assert!(matches!(result, Err(LedgerError::ExecutionReverted(_))));
	}

	#[tokio::test]
	async fn test_invalid_amount_is_rejected_locally() {
		let mut backend = mock_on_chain(5611);
		backend.expect_estimate_gas().never();

		let registrar = LedgerRegistrar::new(Arc::new(backend), settings());
		let session = session(5611).await;
		let result = registrar
			.create_grant_proposal(&session, "Fund a replication", "ten")
			.await;
		assert!(matches!(result, Err(LedgerError::InvalidArgument(_))));
	}

	#[tokio::test]
	async fn test_empty_registry_lists_nothing() {
		let mut backend = mock_on_chain(5611);
		backend
			.expect_call()
			.times(1)
			.returning(|_| Ok(Bytes::from(encode_return(&U256::ZERO))));

		let registrar = LedgerRegistrar::new(Arc::new(backend), settings());
		assert!(registrar.list_papers().await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_absurd_paper_count_fails_on_first_read() {
		let mut backend = mock_on_chain(5611);
		backend.expect_call().returning(|call| match call.method() {
			"paperCounter" => Ok(Bytes::from(encode_return(&U256::from(u64::MAX)))),
			_ => Err(LedgerError::ExecutionReverted(
				"ERC721: invalid token ID".to_string(),
			)),
		});

		let registrar = LedgerRegistrar::new(Arc::new(backend), settings());
		assert!(matches!(
			registrar.list_papers().await,
			Err(LedgerError::ExecutionReverted(_))
		));
	}

	#[tokio::test]
	async fn test_find_paper_scans_only_records_after_baseline() {
		let author = EvmAddress::repeat_byte(0x33);
		let calls = Arc::new(AtomicUsize::new(0));
		let seen = calls.clone();

		let mut backend = mock_on_chain(5611);
		backend.expect_call().returning(move |call| {
			seen.fetch_add(1, Ordering::SeqCst);
			let data = match call.method() {
				"paperCounter" => encode_return(&U256::from(501u64)),
				"tokenURI" => {
					let decoded = IDotSciRegistry::tokenURICall::abi_decode(call.data()).unwrap();
					encode_return(&format!("gnfd://a/{}-m.json", decoded.tokenId))
				},
				"ownerOf" => encode_return(&author),
				"getPaper" => {
					return Err(LedgerError::ExecutionReverted(
						"function selector was not recognized".to_string(),
					))
				},
				other => panic!("unexpected query {}", other),
			};
			Ok(Bytes::from(data))
		});

		let registrar = LedgerRegistrar::new(Arc::new(backend), settings());
		let record = registrar
			.find_paper(&Address::from(author), "gnfd://a/501-m.json", 500)
			.await
			.unwrap()
			.unwrap();
		assert_eq!(record.id, 501);
		// Count, one summary, one details lookup.
		assert_eq!(calls.load(Ordering::SeqCst), 4);

		let missing = registrar
			.find_paper(&Address::from(author), "gnfd://a/7-m.json", 500)
			.await
			.unwrap();
		assert!(missing.is_none());
		assert_eq!(calls.load(Ordering::SeqCst), 4 + 3);
	}

	#[tokio::test]
	async fn test_zero_proposer_slots_are_skipped() {
		let mut backend = mock_on_chain(5611);
		backend.expect_call().returning(|call| {
			let data = match call.method() {
				"getProposalCounter" => encode_return(&U256::from(2u8)),
				"getProposal" => {
					let decoded = IDotSciRegistry::getProposalCall::abi_decode(call.data()).unwrap();
					let proposer = if decoded.proposalId == U256::from(1u8) {
						EvmAddress::ZERO
					} else {
						EvmAddress::repeat_byte(0x11)
					};
					encode_return(&IDotSciRegistry::Proposal {
						id: decoded.proposalId,
						proposer,
						description: "Lab equipment".to_string(),
						requestedAmount: U256::from(10u64).pow(U256::from(18u8)),
						forVotes: U256::from(3u8),
						againstVotes: U256::ZERO,
						executed: false,
						status: 1,
					})
				},
				other => panic!("unexpected query {}", other),
			};
			Ok(Bytes::from(data))
		});

		let registrar = LedgerRegistrar::new(Arc::new(backend), settings());
		let proposals = registrar.list_proposals().await.unwrap();
		assert_eq!(proposals.len(), 1);
		assert_eq!(proposals[0].id, 2);
		assert_eq!(proposals[0].status, ProposalStatus::AiApproved);
		assert_eq!(registrar.format_amount(proposals[0].requested_amount), "1");
	}

	#[tokio::test]
	async fn test_unknown_proposal_status_is_rejected() {
		let mut backend = mock_on_chain(5611);
		backend
			.expect_call()
			.with(eq(LedgerQuery::Proposal(4).prepare(settings().contract_address, 5611)))
			.returning(|_| {
				Ok(Bytes::from(encode_return(&IDotSciRegistry::Proposal {
					id: U256::from(4u8),
					proposer: EvmAddress::repeat_byte(0x22),
					description: String::new(),
					requestedAmount: U256::ZERO,
					forVotes: U256::ZERO,
					againstVotes: U256::ZERO,
					executed: false,
					status: 9,
				})))
			});

		let registrar = LedgerRegistrar::new(Arc::new(backend), settings());
		assert!(matches!(
			registrar.proposal(4).await,
			Err(LedgerError::InvalidResponse(_))
		));
	}
}
