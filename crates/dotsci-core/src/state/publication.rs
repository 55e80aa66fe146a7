//! Publication state machine.
//!
//! A publication moves linearly:
//! Idle -> SessionEstablished -> ContainerEnsured -> ContentUploaded ->
//! MetadataUploaded -> TransactionSubmitted -> Reconciling ->
//! Confirmed | PendingConfirmation. Any non-terminal stage may fail. There are
//! no backward transitions and no rollback of completed steps.

use crate::engine::event_bus::EventBus;
use dotsci_types::{PublicationEvent, PublicationStage};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
	#[error("Invalid state transition from {from} to {to}")]
	InvalidTransition {
		from: PublicationStage,
		to: PublicationStage,
	},
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum StageKind {
	Idle,
	SessionEstablished,
	ContainerEnsured,
	ContentUploaded,
	MetadataUploaded,
	TransactionSubmitted,
	Reconciling,
	Confirmed,
	PendingConfirmation,
	Failed,
}

impl From<&PublicationStage> for StageKind {
	fn from(stage: &PublicationStage) -> Self {
		match stage {
			PublicationStage::Idle => StageKind::Idle,
			PublicationStage::SessionEstablished => StageKind::SessionEstablished,
			PublicationStage::ContainerEnsured => StageKind::ContainerEnsured,
			PublicationStage::ContentUploaded => StageKind::ContentUploaded,
			PublicationStage::MetadataUploaded => StageKind::MetadataUploaded,
			PublicationStage::TransactionSubmitted => StageKind::TransactionSubmitted,
			PublicationStage::Reconciling => StageKind::Reconciling,
			PublicationStage::Confirmed => StageKind::Confirmed,
			PublicationStage::PendingConfirmation => StageKind::PendingConfirmation,
			PublicationStage::Failed(_) => StageKind::Failed,
		}
	}
}

static TRANSITIONS: Lazy<HashMap<StageKind, HashSet<StageKind>>> = Lazy::new(|| {
	use StageKind::*;

	let mut m = HashMap::new();
	m.insert(Idle, HashSet::from([SessionEstablished, Failed]));
	m.insert(SessionEstablished, HashSet::from([ContainerEnsured, Failed]));
	m.insert(ContainerEnsured, HashSet::from([ContentUploaded, Failed]));
	m.insert(ContentUploaded, HashSet::from([MetadataUploaded, Failed]));
	m.insert(MetadataUploaded, HashSet::from([TransactionSubmitted, Failed]));
	m.insert(TransactionSubmitted, HashSet::from([Reconciling, Failed]));
	m.insert(
		Reconciling,
		HashSet::from([Confirmed, PendingConfirmation, Failed]),
	);
	m.insert(Confirmed, HashSet::new()); // terminal
	m.insert(PendingConfirmation, HashSet::new()); // terminal
	m.insert(Failed, HashSet::new()); // terminal
	m
});

fn is_valid_transition(from: &PublicationStage, to: &PublicationStage) -> bool {
	TRANSITIONS
		.get(&StageKind::from(from))
		.is_some_and(|allowed| allowed.contains(&StageKind::from(to)))
}

/// Stage of one publish call, announced on an [`EventBus`] at every change.
pub struct PublicationStateMachine {
	id: u64,
	stage: PublicationStage,
	events: EventBus,
}

impl PublicationStateMachine {
	pub fn new(id: u64, events: EventBus) -> Self {
		Self {
			id,
			stage: PublicationStage::Idle,
			events,
		}
	}

	/// Publication id stamped on every event.
	pub fn id(&self) -> u64 {
		self.id
	}

	pub fn stage(&self) -> &PublicationStage {
		&self.stage
	}

	/// Moves to `to` and emits a status event carrying `message`.
	pub fn advance(
		&mut self,
		to: PublicationStage,
		message: impl Into<String>,
	) -> Result<(), StateError> {
		if !is_valid_transition(&self.stage, &to) {
			return Err(StateError::InvalidTransition {
				from: self.stage.clone(),
				to,
			});
		}

		let message = message.into();
		info!(
			publication_id = self.id,
			from = %self.stage,
			to = %to,
			message = %message,
			"Publication stage changed"
		);
		self.stage = to.clone();

		if self
			.events
			.publish(PublicationEvent {
				publication_id: self.id,
				stage: to,
				message,
			})
			.is_err()
		{
			debug!("No subscribers for publication events");
		}
		Ok(())
	}

	/// Moves to `Failed(reason)`. A publication that already ended keeps its
	/// terminal stage.
	pub fn fail(&mut self, reason: impl Into<String>) {
		let reason = reason.into();
		let failed = PublicationStage::Failed(reason.clone());
		if let Err(e) = self.advance(failed, reason) {
			warn!(error = %e, "Ignoring failure after the publication ended");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const HAPPY_PATH: [PublicationStage; 7] = [
		PublicationStage::SessionEstablished,
		PublicationStage::ContainerEnsured,
		PublicationStage::ContentUploaded,
		PublicationStage::MetadataUploaded,
		PublicationStage::TransactionSubmitted,
		PublicationStage::Reconciling,
		PublicationStage::Confirmed,
	];

	#[test]
	fn test_linear_path_emits_one_event_per_stage() {
		let events = EventBus::new(16);
		let mut receiver = events.subscribe();
		let mut machine = PublicationStateMachine::new(7, events);

		for stage in HAPPY_PATH.iter() {
			machine.advance(stage.clone(), stage.to_string()).unwrap();
		}
		assert_eq!(machine.stage(), &PublicationStage::Confirmed);

		let mut seen = Vec::new();
		while let Ok(event) = receiver.try_recv() {
			assert_eq!(event.publication_id, 7);
			seen.push(event.stage);
		}
		assert_eq!(seen, HAPPY_PATH.to_vec());
	}

	#[test]
	fn test_stages_cannot_be_skipped_or_repeated() {
		let mut machine = PublicationStateMachine::new(1, EventBus::new(4));

		assert_eq!(
			machine.advance(PublicationStage::ContentUploaded, "skip"),
			Err(StateError::InvalidTransition {
				from: PublicationStage::Idle,
				to: PublicationStage::ContentUploaded,
			})
		);

		machine
			.advance(PublicationStage::SessionEstablished, "ok")
			.unwrap();
		assert!(machine
			.advance(PublicationStage::SessionEstablished, "again")
			.is_err());
		assert!(machine.advance(PublicationStage::Idle, "back").is_err());
	}

	#[test]
	fn test_only_reconciling_reaches_pending_confirmation() {
		let mut machine = PublicationStateMachine::new(1, EventBus::new(4));
		machine
			.advance(PublicationStage::SessionEstablished, "ok")
			.unwrap();
		assert!(machine
			.advance(PublicationStage::PendingConfirmation, "early")
			.is_err());
	}

	#[test]
	fn test_failure_is_terminal() {
		let events = EventBus::new(4);
		let mut receiver = events.subscribe();
		let mut machine = PublicationStateMachine::new(1, events);

		machine.fail("no session");
		assert_eq!(
			machine.stage(),
			&PublicationStage::Failed("no session".to_string())
		);
		assert_eq!(receiver.try_recv().unwrap().message, "no session");

		machine.fail("second failure");
		assert_eq!(
			machine.stage(),
			&PublicationStage::Failed("no session".to_string())
		);
		assert!(machine
			.advance(PublicationStage::SessionEstablished, "resume")
			.is_err());
	}
}
