//! The content store: idempotent container provisioning and two-phase uploads.

use crate::{
	indicates_already_exists, BackendError, BroadcastResult, ContentStoreError, ObjectNamer,
	ObjectStoreInterface, PreparedStorageTx, StorageMsg,
};
use dotsci_account::{AgentError, Session};
use dotsci_types::{
	Address, ObjectLocator, RedundancyType, StorageContainer, StoredObject, Visibility,
	METADATA_CONTENT_TYPE,
};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// Parameters applied to every storage transaction.
#[derive(Debug, Clone)]
pub struct StoreSettings {
	/// Storage network identifier.
	pub chain_id: u64,
	/// Storage provider that hosts new containers.
	pub primary_sp_address: Address,
	/// Gateway base for human-viewable URLs.
	pub view_base_url: String,
	pub visibility: Visibility,
	pub charged_read_quota: u64,
	pub redundancy: RedundancyType,
}

/// Which protocol step failed, for error mapping.
#[derive(Clone, Copy)]
enum Step {
	Container,
	Object,
}

impl Step {
	fn failure(self, diagnostic: String) -> ContentStoreError {
		match self {
			Step::Container => ContentStoreError::ContainerCreationFailed(diagnostic),
			Step::Object => ContentStoreError::UploadFailed(diagnostic),
		}
	}
}

/// Uploads content on behalf of a session.
pub struct ContentStore {
	backend: Arc<dyn ObjectStoreInterface>,
	settings: StoreSettings,
	/// Containers known to exist; never shrinks because containers are never deleted.
	known_containers: RwLock<HashSet<String>>,
	namer: ObjectNamer,
}

impl ContentStore {
	pub fn new(backend: Arc<dyn ObjectStoreInterface>, settings: StoreSettings) -> Self {
		Self {
			backend,
			settings,
			known_containers: RwLock::new(HashSet::new()),
			namer: ObjectNamer::new(),
		}
	}

	pub fn settings(&self) -> &StoreSettings {
		&self.settings
	}

	/// Container name for an identity: its lower-cased `0x` address.
	pub fn container_name(address: &Address) -> String {
		address.to_lowercase_hex()
	}

	/// Makes sure the session's container exists, creating it if absent.
	///
	/// Only a not-found answer triggers creation. A creation that fails because
	/// a concurrent creator won counts as success.
	#[instrument(skip_all, fields(owner = %session.address()))]
	pub async fn ensure_container(
		&self,
		session: &Session,
	) -> Result<StorageContainer, ContentStoreError> {
		let name = Self::container_name(session.address());
		let container = StorageContainer {
			name: name.clone(),
			visibility: self.settings.visibility,
			owner: session.address().clone(),
		};

		if self.known_containers.read().await.contains(&name) {
			debug!(container = %name, "Container already known");
			return Ok(container);
		}

		match self.backend.head_container(&name).await {
			Ok(_) => {
				debug!(container = %name, "Container exists");
			},
			Err(BackendError::NotFound(_)) => {
				info!(container = %name, "Container not found, creating");
				let msg = StorageMsg::CreateContainer {
					creator: session.address().clone(),
					container: name.clone(),
					visibility: self.settings.visibility,
					charged_read_quota: self.settings.charged_read_quota,
					primary_sp_address: self.settings.primary_sp_address.clone(),
				};
				match self.commit(session, msg, Step::Container).await {
					Ok(result) => {
						info!(container = %name, tx_hash = %result.tx_hash, "Container created");
					},
					Err(ContentStoreError::ContainerCreationFailed(diag))
						if indicates_already_exists(&diag) =>
					{
						warn!(container = %name, "Container created concurrently, continuing");
					},
					Err(e) => return Err(e),
				}
			},
			Err(e) => return Err(ContentStoreError::QueryFailed(e.to_string())),
		}

		self.known_containers.write().await.insert(name);
		Ok(container)
	}

	/// Uploads `payload` as a new immutable object in `container`.
	#[instrument(skip_all, fields(container = %container, file_name = %file_name, size = payload.len()))]
	pub async fn upload(
		&self,
		session: &Session,
		container: &str,
		payload: Vec<u8>,
		file_name: &str,
		content_type: &str,
	) -> Result<StoredObject, ContentStoreError> {
		let object = self.namer.next_name(file_name);
		let payload_size = payload.len();
		let msg = StorageMsg::create_object(
			session.address().clone(),
			container,
			object.clone(),
			content_type,
			self.settings.visibility,
			self.settings.redundancy,
			payload,
		);

		let result = self.commit(session, msg, Step::Object).await?;

		let locator = ObjectLocator::new(container, object);
		let stored = StoredObject {
			view_url: locator.view_url(&self.settings.view_base_url),
			locator,
			content_type: content_type.to_string(),
			payload_size,
		};
		info!(locator = %stored.uri(), tx_hash = %result.tx_hash, "Object uploaded");
		Ok(stored)
	}

	/// Serializes `document` as JSON and uploads it.
	pub async fn upload_json<T: Serialize + Sync>(
		&self,
		session: &Session,
		container: &str,
		document: &T,
		file_name: &str,
	) -> Result<StoredObject, ContentStoreError> {
		let payload = serde_json::to_vec(document)
			.map_err(|e| ContentStoreError::UploadFailed(format!("Invalid JSON document: {}", e)))?;
		self.upload(session, container, payload, file_name, METADATA_CONTENT_TYPE)
			.await
	}

	/// Reads an object back by its canonical locator.
	pub async fn fetch(&self, locator: &str) -> Result<Vec<u8>, ContentStoreError> {
		let locator: ObjectLocator = locator
			.parse()
			.map_err(ContentStoreError::InvalidLocator)?;
		self.backend
			.fetch_object(&locator.container, &locator.object)
			.await
			.map_err(|e| ContentStoreError::FetchFailed(e.to_string()))
	}

	/// Estimate, sign, broadcast. Nothing is broadcast if any earlier step fails.
	async fn commit(
		&self,
		session: &Session,
		msg: StorageMsg,
		step: Step,
	) -> Result<BroadcastResult, ContentStoreError> {
		let prepared = PreparedStorageTx::new(msg, self.settings.chain_id, session.chain_id());

		let estimate = self.backend.estimate(&prepared).await.map_err(|e| {
			warn!(kind = prepared.msg().kind(), error = %e, "Estimate failed");
			step.failure(e.to_string())
		})?;
		debug!(
			kind = prepared.msg().kind(),
			gas_limit = estimate.gas_limit,
			gas_price = estimate.gas_price,
			"Estimated storage transaction"
		);

		let document = prepared
			.signing_bytes()
			.map_err(|e| step.failure(format!("Failed to encode transaction: {}", e)))?;
		let signature = session
			.sign_message(&document)
			.await
			.map_err(|e| match e {
				AgentError::Rejected(reason) => ContentStoreError::SigningRejected(reason),
				other => step.failure(other.to_string()),
			})?;

		let signed = prepared.into_signed(estimate, signature);
		let result = self
			.backend
			.broadcast(&signed)
			.await
			.map_err(|e| step.failure(e.to_string()))?;

		if !result.is_success() {
			return Err(step.failure(format!("code {}: {}", result.code, result.raw_log)));
		}
		Ok(result)
	}
}
