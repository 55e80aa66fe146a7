//! Publication pipeline stages, status events and results.

use crate::{AssetMetadata, StoredObject, TransactionReceipt};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage of a single publication attempt.
///
/// Stages advance linearly; `Confirmed`, `PendingConfirmation` and `Failed` are
/// terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublicationStage {
	Idle,
	SessionEstablished,
	ContainerEnsured,
	ContentUploaded,
	MetadataUploaded,
	TransactionSubmitted,
	Reconciling,
	Confirmed,
	/// The transaction is final but the record was not yet observed.
	PendingConfirmation,
	Failed(String),
}

impl PublicationStage {
	pub fn is_terminal(&self) -> bool {
		matches!(
			self,
			PublicationStage::Confirmed
				| PublicationStage::PendingConfirmation
				| PublicationStage::Failed(_)
		)
	}
}

impl fmt::Display for PublicationStage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PublicationStage::Idle => write!(f, "Idle"),
			PublicationStage::SessionEstablished => write!(f, "SessionEstablished"),
			PublicationStage::ContainerEnsured => write!(f, "ContainerEnsured"),
			PublicationStage::ContentUploaded => write!(f, "ContentUploaded"),
			PublicationStage::MetadataUploaded => write!(f, "MetadataUploaded"),
			PublicationStage::TransactionSubmitted => write!(f, "TransactionSubmitted"),
			PublicationStage::Reconciling => write!(f, "Reconciling"),
			PublicationStage::Confirmed => write!(f, "Confirmed"),
			PublicationStage::PendingConfirmation => write!(f, "PendingConfirmation"),
			PublicationStage::Failed(reason) => write!(f, "Failed: {}", reason),
		}
	}
}

/// Caller-visible progress notification.
///
/// Every publish call shares one event channel; `publication_id` tells
/// concurrent publications apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationEvent {
	pub publication_id: u64,
	pub stage: PublicationStage,
	pub message: String,
}

/// How reconciliation of a finalized write ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconciliationOutcome {
	Confirmed { record_id: u64 },
	/// Every attempt ran without observing the write.
	TimedOut { attempts: u32 },
	/// The poll was stopped by shutdown before it finished.
	Cancelled,
}

impl ReconciliationOutcome {
	pub fn is_confirmed(&self) -> bool {
		matches!(self, ReconciliationOutcome::Confirmed { .. })
	}
}

/// Outcome of a publish call that got past transaction finality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationResult {
	/// Same id as on the progress events of this publication.
	pub publication_id: u64,
	pub content: StoredObject,
	pub metadata_object: StoredObject,
	pub metadata: AssetMetadata,
	pub receipt: TransactionReceipt,
	pub reconciliation: ReconciliationOutcome,
	/// True when the content hash had to be truncated to fit the ledger field.
	pub hash_truncated: bool,
}

impl PublicationResult {
	pub fn record_id(&self) -> Option<u64> {
		match self.reconciliation {
			ReconciliationOutcome::Confirmed { record_id } => Some(record_id),
			_ => None,
		}
	}

	pub fn stage(&self) -> PublicationStage {
		if self.reconciliation.is_confirmed() {
			PublicationStage::Confirmed
		} else {
			PublicationStage::PendingConfirmation
		}
	}
}
