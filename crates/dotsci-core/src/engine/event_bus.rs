//! Broadcast channel for publication progress.
//!
//! Every stage change of a publication is published here so that a caller can
//! report progress on a long-running publish without polling the orchestrator.

use dotsci_types::PublicationEvent;
use tokio::sync::broadcast;

/// Fan-out of [`PublicationEvent`]s to any number of subscribers.
///
/// Clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<PublicationEvent>,
}

impl EventBus {
	/// Creates a bus buffering up to `capacity` events per lagging subscriber.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Receives every event published after this call.
	pub fn subscribe(&self) -> broadcast::Receiver<PublicationEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event to all current subscribers.
	///
	/// Fails only when nobody is listening.
	pub fn publish(
		&self,
		event: PublicationEvent,
	) -> Result<(), broadcast::error::SendError<PublicationEvent>> {
		self.sender.send(event)?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use dotsci_types::PublicationStage;

	fn event(stage: PublicationStage, message: &str) -> PublicationEvent {
		PublicationEvent {
			publication_id: 1,
			stage,
			message: message.to_string(),
		}
	}

	#[test]
	fn test_subscribe_creates_receiver() {
		let event_bus = EventBus::new(10);
		assert_eq!(event_bus.sender.receiver_count(), 0);

		let _receiver1 = event_bus.subscribe();
		let _receiver2 = event_bus.subscribe();
		assert_eq!(event_bus.sender.receiver_count(), 2);
	}

	#[tokio::test]
	async fn test_all_subscribers_receive_event() {
		let event_bus = EventBus::new(10);
		let mut receiver1 = event_bus.subscribe();
		let mut receiver2 = event_bus.clone().subscribe();

		let sent = event(PublicationStage::ContainerEnsured, "Container 0xabc ready");
		event_bus.publish(sent.clone()).unwrap();

		assert_eq!(receiver1.recv().await.unwrap(), sent);
		assert_eq!(receiver2.recv().await.unwrap(), sent);
	}

	#[test]
	fn test_publish_with_no_subscribers() {
		let event_bus = EventBus::new(10);
		{
			let _receiver = event_bus.subscribe();
		}
		assert!(event_bus
			.publish(event(PublicationStage::Idle, "nobody listening"))
			.is_err());
	}

	#[tokio::test]
	async fn test_late_subscriber_only_sees_new_events() {
		let event_bus = EventBus::new(10);
		let mut early = event_bus.subscribe();

		event_bus
			.publish(event(PublicationStage::SessionEstablished, "first"))
			.unwrap();
		let mut late = event_bus.subscribe();
		event_bus
			.publish(event(PublicationStage::ContainerEnsured, "second"))
			.unwrap();

		assert_eq!(early.recv().await.unwrap().message, "first");
		assert_eq!(early.recv().await.unwrap().message, "second");
		assert_eq!(late.recv().await.unwrap().message, "second");
		assert!(late.try_recv().is_err());
	}
}
