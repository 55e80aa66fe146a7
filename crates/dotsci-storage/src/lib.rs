//! Content storage for the dotsci publication pipeline.
//!
//! Objects live in a decentralized object store that groups them into one
//! container per identity. Every state change on that store is a signed
//! transaction that is first estimated and then broadcast; the
//! [`ContentStore`] drives that protocol and the [`ObjectStoreInterface`]
//! backends speak to the store itself.

use async_trait::async_trait;
use dotsci_types::{Address, ConfigSchema, ImplementationRegistry, Visibility};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod naming;
pub mod store;
pub mod tx;

pub use naming::ObjectNamer;
pub use store::{ContentStore, StoreSettings};
pub use tx::{PreparedStorageTx, SignedStorageTx, StorageMsg};

pub mod implementations {
	pub mod http;
	pub mod memory;
}

/// Errors returned by object-store backends.
#[derive(Debug, Error)]
pub enum BackendError {
	/// The container or object does not exist.
	#[error("Not found: {0}")]
	NotFound(String),
	/// The store refused the request before execution.
	#[error("Request rejected: {0}")]
	Rejected(String),
	#[error("Network error: {0}")]
	Network(String),
	#[error("Invalid response: {0}")]
	InvalidResponse(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Errors surfaced by the [`ContentStore`].
#[derive(Debug, Error)]
pub enum ContentStoreError {
	/// Checking container existence failed for a reason other than absence.
	#[error("Storage query failed: {0}")]
	QueryFailed(String),
	/// Creating the container failed; carries the store's diagnostic.
	#[error("Container creation failed: {0}")]
	ContainerCreationFailed(String),
	/// Estimating or committing an object failed; carries the store's diagnostic.
	#[error("Upload failed: {0}")]
	UploadFailed(String),
	/// The signing agent refused to sign a storage transaction.
	#[error("Signing rejected: {0}")]
	SigningRejected(String),
	#[error("Fetch failed: {0}")]
	FetchFailed(String),
	#[error("Invalid locator: {0}")]
	InvalidLocator(String),
}

/// Existence information for a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
	pub name: String,
	pub owner: Address,
	pub visibility: Visibility,
}

/// Resource estimate returned by the first phase of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxEstimate {
	pub gas_limit: u64,
	pub gas_price: u64,
}

/// Result of committing a transaction.
///
/// A zero `code` is success; anything else is a remote failure described by
/// `raw_log`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastResult {
	pub code: u32,
	pub tx_hash: String,
	#[serde(default)]
	pub raw_log: String,
}

impl BroadcastResult {
	pub fn is_success(&self) -> bool {
		self.code == 0
	}
}

/// True when a store diagnostic says the target already exists.
pub fn indicates_already_exists(diagnostic: &str) -> bool {
	let lower = diagnostic.to_ascii_lowercase();
	lower.contains("already exists") || lower.contains("repeated bucket")
}

/// Interface of a decentralized object store.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ObjectStoreInterface: Send + Sync {
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Looks up a container; absence is [`BackendError::NotFound`].
	async fn head_container(&self, name: &str) -> Result<ContainerInfo, BackendError>;

	/// Simulates a prepared transaction without committing it.
	async fn estimate(&self, tx: &PreparedStorageTx) -> Result<TxEstimate, BackendError>;

	/// Commits a signed transaction.
	async fn broadcast(&self, tx: &SignedStorageTx) -> Result<BroadcastResult, BackendError>;

	/// Reads an object's payload.
	async fn fetch_object(&self, container: &str, object: &str) -> Result<Vec<u8>, BackendError>;
}

/// Factory function type for object-store backends.
pub type ObjectStoreFactory = fn(&toml::Value) -> Result<Box<dyn ObjectStoreInterface>, BackendError>;

pub trait ObjectStoreRegistry: ImplementationRegistry<Factory = ObjectStoreFactory> {}

/// Get all registered object-store implementations.
pub fn get_all_implementations() -> Vec<(&'static str, ObjectStoreFactory)> {
	use implementations::{http, memory};

	vec![
		(http::Registry::NAME, http::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}
