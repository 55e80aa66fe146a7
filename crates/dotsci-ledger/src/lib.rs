//! Ledger access for the dotsci publication pipeline.
//!
//! This crate prepares registry calls, submits them through a session's
//! signer, waits for finality and reads registry state back. Backends
//! implement [`LedgerInterface`] at the transaction level (estimate, send,
//! confirm, call); the [`LedgerRegistrar`] builds the domain operations on top.

use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use dotsci_account::AccountSigner;
use dotsci_config::NetworkConfig;
use dotsci_types::{ConfigSchema, ImplementationRegistry, TransactionHash, TransactionReceipt};
use std::time::Duration;
use thiserror::Error;

pub mod contract;
pub mod registrar;

pub use contract::{IDotSciRegistry, LedgerCall, LedgerQuery, PreparedCall};
pub use registrar::{LedgerRegistrar, PaperSubmission, RegistrarSettings};

/// Re-export implementations
pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
	pub mod memory;
}

/// Errors that can occur while talking to the ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
	/// The signer declined, or the account cannot pay for the transaction.
	#[error("Submission rejected: {0}")]
	SubmissionRejected(String),
	/// Contract logic rejected the call, either during estimation or on chain.
	#[error("Execution reverted: {0}")]
	ExecutionReverted(String),
	/// The session is on a different chain than the registry.
	#[error("Network mismatch: expected chain {expected}, got {actual}")]
	NetworkMismatch { expected: u64, actual: u64 },
	#[error("Network error: {0}")]
	Network(String),
	/// The caller supplied an argument the call cannot carry.
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Invalid response: {0}")]
	InvalidResponse(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
	#[error("No implementation available")]
	NoImplementationAvailable,
}

/// Transaction-level interface of a ledger backend.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait LedgerInterface: Send + Sync {
	/// Returns the configuration schema for this backend.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Chain this backend submits to.
	fn chain_id(&self) -> u64;

	/// Estimates gas for `call` sent from `from`.
	///
	/// A call the contract would reject fails here with
	/// [`LedgerError::ExecutionReverted`] before anything is broadcast.
	async fn estimate_gas(&self, from: Address, call: &PreparedCall) -> Result<u64, LedgerError>;

	/// Signs `call` with `signer` and broadcasts it.
	async fn send(
		&self,
		signer: &AccountSigner,
		call: &PreparedCall,
		gas_limit: u64,
	) -> Result<TransactionHash, LedgerError>;

	/// Waits until the transaction has `confirmations` confirmations.
	///
	/// Returns the receipt whether or not execution succeeded; callers inspect
	/// [`TransactionReceipt::success`].
	async fn wait_for_confirmation(
		&self,
		hash: &TransactionHash,
		confirmations: u64,
		timeout: Duration,
	) -> Result<TransactionReceipt, LedgerError>;

	/// Executes a read-only call against current state.
	async fn call(&self, call: &PreparedCall) -> Result<Bytes, LedgerError>;
}

/// Type alias for ledger factory functions.
pub type LedgerFactory =
	fn(&toml::Value, &NetworkConfig) -> Result<Box<dyn LedgerInterface>, LedgerError>;

/// Registry trait for ledger implementations.
pub trait LedgerRegistry: ImplementationRegistry<Factory = LedgerFactory> {}

/// Get all registered ledger implementations.
pub fn get_all_implementations() -> Vec<(&'static str, LedgerFactory)> {
	use implementations::{evm::alloy, memory};

	vec![
		(alloy::Registry::NAME, alloy::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}
