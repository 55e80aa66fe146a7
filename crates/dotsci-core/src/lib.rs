//! Publication orchestration for dotsci.
//!
//! Composes the session, content store and ledger registrar into the publish
//! pipeline, tracks each publication through a validated state machine and
//! reconciles finalized writes against the eventually consistent read path.

pub mod engine;
pub mod monitoring;
pub mod state;

pub use engine::{event_bus::EventBus, ProposalSubmission, PublicationOrchestrator};
pub use monitoring::{Backoff, PollOutcome, PollSettings, ReconciliationPoller};
pub use state::{PublicationStateMachine, StateError};

use dotsci_account::SessionError;
use dotsci_ledger::LedgerError;
use dotsci_storage::ContentStoreError;
use dotsci_types::{AssetError, PublicationResult, ReconciliationOutcome};
use thiserror::Error;

/// Caller-facing failure of a pipeline operation.
///
/// Remote diagnostics are carried in the message so the caller can show them.
#[derive(Debug, Error)]
pub enum PublishError {
	#[error("No signing agent available: {0}")]
	ProviderUnavailable(String),
	#[error("Rejected by user: {0}")]
	UserRejected(String),
	#[error("Network mismatch: expected chain {expected}, got {actual}")]
	NetworkMismatch { expected: u64, actual: u64 },
	#[error("Storage query failed: {0}")]
	StorageQueryFailed(String),
	#[error("Container creation failed: {0}")]
	ContainerCreationFailed(String),
	#[error("Upload failed: {0}")]
	UploadFailed(String),
	#[error("Submission rejected: {0}")]
	SubmissionRejected(String),
	#[error("Execution reverted: {0}")]
	ExecutionReverted(String),
	/// The transaction is final but the record was not observed in time.
	#[error("Reconciliation timed out: {0}")]
	ReconciliationTimedOut(String),
	#[error("No active session")]
	NoSession,
	#[error("Invalid asset: {0}")]
	InvalidAsset(String),
	#[error("Internal error: {0}")]
	Internal(String),
}

impl From<SessionError> for PublishError {
	fn from(err: SessionError) -> Self {
		match err {
			SessionError::ProviderUnavailable(kind) => PublishError::ProviderUnavailable(kind),
			SessionError::UserRejected(reason) => PublishError::UserRejected(reason),
			SessionError::NetworkMismatch { expected, actual } => {
				PublishError::NetworkMismatch { expected, actual }
			},
			other => PublishError::Internal(other.to_string()),
		}
	}
}

impl From<ContentStoreError> for PublishError {
	fn from(err: ContentStoreError) -> Self {
		match err {
			ContentStoreError::QueryFailed(diag) => PublishError::StorageQueryFailed(diag),
			ContentStoreError::ContainerCreationFailed(diag) => {
				PublishError::ContainerCreationFailed(diag)
			},
			ContentStoreError::UploadFailed(diag) => PublishError::UploadFailed(diag),
			ContentStoreError::SigningRejected(reason) => PublishError::UserRejected(reason),
			other => PublishError::Internal(other.to_string()),
		}
	}
}

impl From<LedgerError> for PublishError {
	fn from(err: LedgerError) -> Self {
		match err {
			LedgerError::SubmissionRejected(reason) => PublishError::SubmissionRejected(reason),
			LedgerError::ExecutionReverted(reason) => PublishError::ExecutionReverted(reason),
			LedgerError::NetworkMismatch { expected, actual } => {
				PublishError::NetworkMismatch { expected, actual }
			},
			LedgerError::InvalidArgument(reason) => PublishError::InvalidAsset(reason),
			other => PublishError::Internal(other.to_string()),
		}
	}
}

impl From<AssetError> for PublishError {
	fn from(err: AssetError) -> Self {
		PublishError::InvalidAsset(err.to_string())
	}
}

impl From<StateError> for PublishError {
	fn from(err: StateError) -> Self {
		PublishError::Internal(err.to_string())
	}
}

/// Turns a pending publication into a hard error for callers that need one.
pub trait RequireConfirmed: Sized {
	fn require_confirmed(self) -> Result<Self, PublishError>;
}

impl RequireConfirmed for PublicationResult {
	fn require_confirmed(self) -> Result<Self, PublishError> {
		match self.reconciliation {
			ReconciliationOutcome::Confirmed { .. } => Ok(self),
			ReconciliationOutcome::TimedOut { attempts } => {
				Err(PublishError::ReconciliationTimedOut(format!(
					"record for {} not visible after {} attempts; transaction {} is final",
					self.metadata_object.uri(),
					attempts,
					self.receipt.hash
				)))
			},
			ReconciliationOutcome::Cancelled => Err(PublishError::ReconciliationTimedOut(format!(
				"reconciliation of {} was cancelled; transaction {} is final",
				self.metadata_object.uri(),
				self.receipt.hash
			))),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use dotsci_types::{
		utils::builders::TransactionReceiptBuilder, AssetMetadata, ObjectLocator, StoredObject,
	};

	fn object(name: &str) -> StoredObject {
		let locator = ObjectLocator::new("0xabc", name);
		StoredObject {
			view_url: locator.view_url("https://sp.example"),
			locator,
			content_type: "application/json".to_string(),
			payload_size: 64,
		}
	}

	fn result(reconciliation: ReconciliationOutcome) -> PublicationResult {
		PublicationResult {
			publication_id: 1,
			content: object("1-paper.pdf"),
			metadata_object: object("2-metadata.json"),
			metadata: AssetMetadata {
				name: "Paper".to_string(),
				description: "A research paper.".to_string(),
				pdf_url: "gnfd://0xabc/1-paper.pdf".to_string(),
			},
			receipt: TransactionReceiptBuilder::new().build(),
			reconciliation,
			hash_truncated: false,
		}
	}

	#[test]
	fn test_require_confirmed() {
		assert!(result(ReconciliationOutcome::Confirmed { record_id: 4 })
			.require_confirmed()
			.is_ok());

		let err = result(ReconciliationOutcome::TimedOut { attempts: 15 })
			.require_confirmed()
			.unwrap_err();
		assert!(matches!(err, PublishError::ReconciliationTimedOut(ref m) if m.contains("15 attempts")));

		assert!(matches!(
			result(ReconciliationOutcome::Cancelled).require_confirmed(),
			Err(PublishError::ReconciliationTimedOut(_))
		));
	}

	#[test]
	fn test_error_taxonomy_mapping() {
		assert!(matches!(
			PublishError::from(ContentStoreError::SigningRejected("denied".into())),
			PublishError::UserRejected(_)
		));
		assert!(matches!(
			PublishError::from(ContentStoreError::QueryFailed("503".into())),
			PublishError::StorageQueryFailed(_)
		));
		assert!(matches!(
			PublishError::from(LedgerError::ExecutionReverted("Already voted".into())),
			PublishError::ExecutionReverted(ref m) if m == "Already voted"
		));
		assert!(matches!(
			PublishError::from(LedgerError::Network("timeout".into())),
			PublishError::Internal(_)
		));
		assert!(matches!(
			PublishError::from(SessionError::NetworkMismatch {
				expected: 5611,
				actual: 56
			}),
			PublishError::NetworkMismatch {
				expected: 5611,
				actual: 56
			}
		));
		assert!(matches!(
			PublishError::from(SessionError::ConnectionInProgress),
			PublishError::Internal(_)
		));
	}
}
