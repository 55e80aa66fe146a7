//! Publication orchestrator.
//!
//! Drives one asset from an active session to a reconciled ledger record:
//! container, content upload, metadata upload, `submitPaper`, then a bounded
//! poll of the read path. Stages are strictly sequential per call; concurrent
//! calls from one session are safe because object names are unique, container
//! creation is idempotent and reconciliation matches on author plus metadata
//! locator rather than on recency.

pub mod event_bus;

use self::event_bus::EventBus;
use crate::monitoring::{PollOutcome, ReconciliationPoller};
use crate::state::PublicationStateMachine;
use crate::PublishError;
use dotsci_account::{AgentKind, Session, SessionManager};
use dotsci_ledger::LedgerRegistrar;
use dotsci_storage::ContentStore;
use dotsci_types::{
	Asset, GrantProposal, PublicationEvent, PublicationRecord, PublicationResult,
	PublicationStage, ReconciliationOutcome, TransactionReceipt, METADATA_FILE_NAME,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, instrument, warn};

/// Outcome of a finalized grant proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalSubmission {
	pub receipt: TransactionReceipt,
	/// `Confirmed` carries the proposal id.
	pub reconciliation: ReconciliationOutcome,
}

/// Composes session, storage, ledger and reconciliation into the publish flow.
pub struct PublicationOrchestrator {
	sessions: Arc<SessionManager>,
	store: Arc<ContentStore>,
	ledger: Arc<LedgerRegistrar>,
	poller: ReconciliationPoller,
	events: EventBus,
	/// Decimal native-coin fee attached to every vote.
	voting_fee: String,
	next_publication: AtomicU64,
}

impl PublicationOrchestrator {
	pub fn new(
		sessions: Arc<SessionManager>,
		store: Arc<ContentStore>,
		ledger: Arc<LedgerRegistrar>,
		poller: ReconciliationPoller,
		events: EventBus,
		voting_fee: impl Into<String>,
	) -> Self {
		Self {
			sessions,
			store,
			ledger,
			poller,
			events,
			voting_fee: voting_fee.into(),
			next_publication: AtomicU64::new(1),
		}
	}

	pub fn sessions(&self) -> &Arc<SessionManager> {
		&self.sessions
	}

	pub fn store(&self) -> &Arc<ContentStore> {
		&self.store
	}

	pub fn ledger(&self) -> &Arc<LedgerRegistrar> {
		&self.ledger
	}

	/// Progress events of every publish started after this call.
	pub fn subscribe(&self) -> broadcast::Receiver<PublicationEvent> {
		self.events.subscribe()
	}

	pub async fn connect(&self, kind: AgentKind) -> Result<Arc<Session>, PublishError> {
		Ok(self.sessions.connect(kind).await?)
	}

	pub fn disconnect(&self) {
		self.sessions.disconnect();
	}

	/// Cancels in-flight reconciliation. Affected publications end as pending.
	pub fn shutdown(&self) {
		info!("Shutting down orchestrator");
		self.poller.stop();
	}

	fn active_session(&self) -> Result<Arc<Session>, PublishError> {
		self.sessions.session().ok_or(PublishError::NoSession)
	}

	/// Paper count before a submission; reconciliation only scans newer ids.
	async fn paper_baseline(&self) -> u64 {
		self.ledger.paper_count().await.unwrap_or_else(|e| {
			warn!(error = %e, "Could not read paper count, reconciliation scans every record");
			0
		})
	}

	/// Publishes `asset` and waits until its record is readable.
	///
	/// A record that stays invisible past the poll budget is returned as
	/// [`ReconciliationOutcome::TimedOut`] with stage `PendingConfirmation`;
	/// the transaction behind it is already final. Every error leaves the
	/// publication in `Failed` and nothing already uploaded is rolled back.
	#[instrument(skip_all, fields(title = %asset.title, file_name = %asset.file_name))]
	pub async fn publish(&self, asset: Asset) -> Result<PublicationResult, PublishError> {
		let id = self.next_publication.fetch_add(1, Ordering::Relaxed);
		let mut machine = PublicationStateMachine::new(id, self.events.clone());

		match self.run_publish(&mut machine, asset).await {
			Ok(result) => Ok(result),
			Err(e) => {
				error!(
					publication_id = id,
					stage = %machine.stage(),
					error = %e,
					"Publication failed"
				);
				machine.fail(e.to_string());
				Err(e)
			},
		}
	}

	async fn run_publish(
		&self,
		machine: &mut PublicationStateMachine,
		mut asset: Asset,
	) -> Result<PublicationResult, PublishError> {
		asset.validate()?;
		let session = self.active_session()?;
		machine.advance(
			PublicationStage::SessionEstablished,
			format!("Publishing as {}", session.address()),
		)?;

		let container = self.store.ensure_container(&session).await?;
		machine.advance(
			PublicationStage::ContainerEnsured,
			format!("Container {} ready", container.name),
		)?;

		let payload = std::mem::take(&mut asset.payload);
		let content = self
			.store
			.upload(
				&session,
				&container.name,
				payload,
				&asset.file_name,
				&asset.content_type,
			)
			.await?;
		let content_uri = content.uri();
		machine.advance(
			PublicationStage::ContentUploaded,
			format!("Uploaded {} ({} bytes)", content_uri, content.payload_size),
		)?;

		let metadata = asset.metadata(&content_uri);
		let metadata_object = self
			.store
			.upload_json(&session, &container.name, &metadata, METADATA_FILE_NAME)
			.await?;
		let metadata_uri = metadata_object.uri();
		machine.advance(
			PublicationStage::MetadataUploaded,
			format!("Uploaded metadata {}", metadata_uri),
		)?;

		let baseline = self.paper_baseline().await;
		let submission = self
			.ledger
			.submit_paper(
				&session,
				&metadata_uri,
				&content_uri,
				&asset.output_hash,
				asset.effective_price(),
				asset.create_dao,
			)
			.await?;
		machine.advance(
			PublicationStage::TransactionSubmitted,
			format!("Transaction {} is final", submission.receipt.hash),
		)?;

		machine.advance(
			PublicationStage::Reconciling,
			"Waiting for the record to become visible",
		)?;
		let ledger = &*self.ledger;
		let author = session.address();
		let uri = metadata_uri.as_str();
		let outcome = self
			.poller
			.poll_until(move || ledger.find_paper(author, uri, baseline))
			.await;

		let reconciliation = match outcome {
			PollOutcome::Found(record) => {
				machine.advance(
					PublicationStage::Confirmed,
					format!("Record #{} is visible", record.id),
				)?;
				ReconciliationOutcome::Confirmed {
					record_id: record.id,
				}
			},
			PollOutcome::TimedOut { attempts } => {
				warn!(attempts, metadata_uri = %metadata_uri, "Record not visible yet");
				machine.advance(
					PublicationStage::PendingConfirmation,
					format!(
						"Transaction is final but the record was not visible after {} checks; check again later",
						attempts
					),
				)?;
				ReconciliationOutcome::TimedOut { attempts }
			},
			PollOutcome::Cancelled => {
				machine.advance(
					PublicationStage::PendingConfirmation,
					"Reconciliation stopped; transaction is final, confirmation pending",
				)?;
				ReconciliationOutcome::Cancelled
			},
		};

		Ok(PublicationResult {
			publication_id: machine.id(),
			content,
			metadata_object,
			metadata,
			receipt: submission.receipt,
			reconciliation,
			hash_truncated: submission.hash_truncated,
		})
	}

	/// Opens a grant proposal and waits until it is readable.
	#[instrument(skip_all, fields(amount = %amount))]
	pub async fn propose_grant(
		&self,
		description: &str,
		amount: &str,
	) -> Result<ProposalSubmission, PublishError> {
		let session = self.active_session()?;
		let baseline = self.ledger.proposal_count().await.unwrap_or_else(|e| {
			warn!(error = %e, "Could not read proposal count, reconciliation scans every proposal");
			0
		});
		let receipt = self
			.ledger
			.create_grant_proposal(&session, description, amount)
			.await?;
		info!(tx_hash = %receipt.hash, "Grant proposal final, reconciling");

		let ledger = &*self.ledger;
		let proposer = session.address();
		let outcome = self
			.poller
			.poll_until(move || ledger.find_proposal(proposer, description, baseline))
			.await;

		let reconciliation = match outcome {
			PollOutcome::Found(proposal) => ReconciliationOutcome::Confirmed {
				record_id: proposal.id,
			},
			PollOutcome::TimedOut { attempts } => {
				warn!(attempts, "Proposal not visible yet");
				ReconciliationOutcome::TimedOut { attempts }
			},
			PollOutcome::Cancelled => ReconciliationOutcome::Cancelled,
		};
		Ok(ProposalSubmission {
			receipt,
			reconciliation,
		})
	}

	/// Votes on a proposal, paying the configured voting fee.
	#[instrument(skip(self))]
	pub async fn vote(
		&self,
		proposal_id: u64,
		supports: bool,
	) -> Result<TransactionReceipt, PublishError> {
		let session = self.active_session()?;
		let receipt = self
			.ledger
			.vote(&session, proposal_id, supports, &self.voting_fee)
			.await?;
		info!(tx_hash = %receipt.hash, fee = %self.voting_fee, "Vote final");
		Ok(receipt)
	}

	/// Published records, newest first. An empty registry is an empty list.
	pub async fn explore(&self) -> Result<Vec<PublicationRecord>, PublishError> {
		let mut records = self.ledger.list_papers().await?;
		records.reverse();
		Ok(records)
	}

	/// Grant proposals in id order.
	pub async fn proposals(&self) -> Result<Vec<GrantProposal>, PublishError> {
		Ok(self.ledger.list_proposals().await?)
	}
}
