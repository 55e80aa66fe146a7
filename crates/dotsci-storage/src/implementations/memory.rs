//! In-memory object store.
//!
//! Models the remote store closely enough for pipeline tests and local runs:
//! containers and objects are kept in process, every remote call is counted,
//! and one-shot failures can be injected at each protocol step.

use crate::{
	BackendError, BroadcastResult, ContainerInfo, ObjectStoreInterface, PreparedStorageTx,
	SignedStorageTx, StorageMsg, TxEstimate,
};
use async_trait::async_trait;
use dotsci_types::{
	Address, ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError,
	Visibility,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{Mutex, RwLock};

const DEFAULT_GAS_PRICE: u64 = 5_000_000_000;
const BASE_GAS: u64 = 1_200;

/// Result code for an attempt to create something that exists.
pub const CODE_ALREADY_EXISTS: u32 = 18;
/// Result code for an object whose container is missing.
pub const CODE_NO_SUCH_CONTAINER: u32 = 5;

/// A one-shot failure consumed by the next matching call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreFailure {
	/// The next existence check reports not-found regardless of state.
	HeadNotFoundOnce,
	/// The next existence check fails with a transport error.
	HeadError(String),
	/// The next estimate is rejected with this diagnostic.
	Estimate(String),
	/// The next broadcast returns this non-zero code and diagnostic.
	BroadcastCode(u32, String),
}

/// Snapshot of call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounters {
	pub head_queries: usize,
	pub estimates: usize,
	pub broadcasts: usize,
	pub container_creations: usize,
	pub object_creations: usize,
}

#[derive(Debug, Clone)]
struct StoredBlob {
	content_type: String,
	data: Vec<u8>,
}

/// In-memory implementation of [`ObjectStoreInterface`].
pub struct MemoryObjectStore {
	containers: RwLock<HashMap<String, ContainerInfo>>,
	objects: RwLock<HashMap<(String, String), StoredBlob>>,
	failures: Mutex<Vec<StoreFailure>>,
	gas_price: u64,
	tx_seq: AtomicU64,
	head_queries: AtomicUsize,
	estimates: AtomicUsize,
	broadcasts: AtomicUsize,
	container_creations: AtomicUsize,
	object_creations: AtomicUsize,
}

impl MemoryObjectStore {
	pub fn new() -> Self {
		Self::with_gas_price(DEFAULT_GAS_PRICE)
	}

	pub fn with_gas_price(gas_price: u64) -> Self {
		Self {
			containers: RwLock::new(HashMap::new()),
			objects: RwLock::new(HashMap::new()),
			failures: Mutex::new(Vec::new()),
			gas_price,
			tx_seq: AtomicU64::new(0),
			head_queries: AtomicUsize::new(0),
			estimates: AtomicUsize::new(0),
			broadcasts: AtomicUsize::new(0),
			container_creations: AtomicUsize::new(0),
			object_creations: AtomicUsize::new(0),
		}
	}

	/// Queues a one-shot failure.
	pub async fn inject(&self, failure: StoreFailure) {
		self.failures.lock().await.push(failure);
	}

	/// Creates a container directly, as another client would.
	pub async fn insert_container(&self, name: &str, owner: &Address) {
		self.containers.write().await.insert(
			name.to_string(),
			ContainerInfo {
				name: name.to_string(),
				owner: owner.clone(),
				visibility: Visibility::PublicRead,
			},
		);
	}

	pub fn counters(&self) -> StoreCounters {
		StoreCounters {
			head_queries: self.head_queries.load(Ordering::SeqCst),
			estimates: self.estimates.load(Ordering::SeqCst),
			broadcasts: self.broadcasts.load(Ordering::SeqCst),
			container_creations: self.container_creations.load(Ordering::SeqCst),
			object_creations: self.object_creations.load(Ordering::SeqCst),
		}
	}

	/// Removes and returns the first queued failure accepted by `pick`.
	async fn take_failure<T>(&self, pick: impl Fn(&StoreFailure) -> Option<T>) -> Option<T> {
		let mut failures = self.failures.lock().await;
		let index = failures.iter().position(|f| pick(f).is_some())?;
		pick(&failures.remove(index))
	}

	fn next_tx_hash(&self) -> String {
		let seq = self.tx_seq.fetch_add(1, Ordering::SeqCst) + 1;
		format!("0x{:064x}", seq)
	}

	fn outcome(&self, code: u32, raw_log: impl Into<String>) -> BroadcastResult {
		BroadcastResult {
			code,
			tx_hash: self.next_tx_hash(),
			raw_log: raw_log.into(),
		}
	}
}

impl Default for MemoryObjectStore {
	fn default() -> Self {
		Self::new()
	}
}

/// Configuration schema for [`MemoryObjectStore`].
pub struct MemoryObjectStoreSchema;

impl ConfigSchema for MemoryObjectStoreSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![Field::new(
				"gas_price",
				FieldType::Integer {
					min: Some(0),
					max: None,
				},
			)],
		);
		schema.validate(config)
	}
}

#[async_trait]
impl ObjectStoreInterface for MemoryObjectStore {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryObjectStoreSchema)
	}

	async fn head_container(&self, name: &str) -> Result<ContainerInfo, BackendError> {
		self.head_queries.fetch_add(1, Ordering::SeqCst);

		let injected = self
			.take_failure(|f| match f {
				StoreFailure::HeadNotFoundOnce => Some(BackendError::NotFound(name.to_string())),
				StoreFailure::HeadError(msg) => Some(BackendError::Network(msg.clone())),
				_ => None,
			})
			.await;
		if let Some(err) = injected {
			return Err(err);
		}

		self.containers
			.read()
			.await
			.get(name)
			.cloned()
			.ok_or_else(|| BackendError::NotFound(format!("No such bucket: {}", name)))
	}

	async fn estimate(&self, tx: &PreparedStorageTx) -> Result<TxEstimate, BackendError> {
		self.estimates.fetch_add(1, Ordering::SeqCst);

		let injected = self
			.take_failure(|f| match f {
				StoreFailure::Estimate(msg) => Some(msg.clone()),
				_ => None,
			})
			.await;
		if let Some(msg) = injected {
			return Err(BackendError::Rejected(msg));
		}

		let gas_limit = match tx.msg() {
			StorageMsg::CreateContainer { .. } => BASE_GAS,
			StorageMsg::CreateObject {
				container,
				payload_size,
				..
			} => {
				if !self.containers.read().await.contains_key(container) {
					return Err(BackendError::Rejected(format!(
						"No such bucket: {}",
						container
					)));
				}
				BASE_GAS + (*payload_size as u64 / 1024)
			},
		};

		Ok(TxEstimate {
			gas_limit,
			gas_price: self.gas_price,
		})
	}

	async fn broadcast(&self, tx: &SignedStorageTx) -> Result<BroadcastResult, BackendError> {
		self.broadcasts.fetch_add(1, Ordering::SeqCst);

		if tx.signature.0.is_empty() {
			return Err(BackendError::Rejected("Transaction is not signed".to_string()));
		}

		let injected = self
			.take_failure(|f| match f {
				StoreFailure::BroadcastCode(code, msg) => Some((*code, msg.clone())),
				_ => None,
			})
			.await;
		if let Some((code, msg)) = injected {
			return Ok(self.outcome(code, msg));
		}

		match tx.prepared.msg() {
			StorageMsg::CreateContainer {
				creator,
				container,
				visibility,
				..
			} => {
				let mut containers = self.containers.write().await;
				if containers.contains_key(container) {
					return Ok(self.outcome(
						CODE_ALREADY_EXISTS,
						format!("Container {} already exists", container),
					));
				}
				containers.insert(
					container.clone(),
					ContainerInfo {
						name: container.clone(),
						owner: creator.clone(),
						visibility: *visibility,
					},
				);
				self.container_creations.fetch_add(1, Ordering::SeqCst);
			},
			StorageMsg::CreateObject {
				container,
				object,
				content_type,
				payload,
				..
			} => {
				if !self.containers.read().await.contains_key(container) {
					return Ok(self.outcome(
						CODE_NO_SUCH_CONTAINER,
						format!("No such bucket: {}", container),
					));
				}
				let mut objects = self.objects.write().await;
				let key = (container.clone(), object.clone());
				if objects.contains_key(&key) {
					return Ok(self.outcome(
						CODE_ALREADY_EXISTS,
						format!("Object {}/{} already exists", container, object),
					));
				}
				objects.insert(
					key,
					StoredBlob {
						content_type: content_type.clone(),
						data: payload.as_ref().clone(),
					},
				);
				self.object_creations.fetch_add(1, Ordering::SeqCst);
			},
		}

		Ok(self.outcome(0, ""))
	}

	async fn fetch_object(&self, container: &str, object: &str) -> Result<Vec<u8>, BackendError> {
		self.objects
			.read()
			.await
			.get(&(container.to_string(), object.to_string()))
			.map(|blob| {
				tracing::trace!(content_type = %blob.content_type, "Serving object");
				blob.data.clone()
			})
			.ok_or_else(|| BackendError::NotFound(format!("{}/{}", container, object)))
	}
}

/// Factory function for the memory object store.
pub fn create_store(config: &toml::Value) -> Result<Box<dyn ObjectStoreInterface>, BackendError> {
	MemoryObjectStoreSchema
		.validate(config)
		.map_err(|e| BackendError::Configuration(e.to_string()))?;

	let gas_price = config
		.get("gas_price")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_GAS_PRICE);

	Ok(Box::new(MemoryObjectStore::with_gas_price(gas_price)))
}

/// Registry for the memory object store.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = crate::ObjectStoreFactory;

	fn factory() -> Self::Factory {
		create_store
	}
}

impl crate::ObjectStoreRegistry for Registry {}
