//! Alloy-based EVM ledger backend.
//!
//! Reads go through a shared provider without a wallet. Writes build a
//! provider around the submitting session's signer, so the backend never
//! holds key material of its own.

use crate::{LedgerError, LedgerInterface, PreparedCall};
use alloy_network::EthereumWallet;
use alloy_primitives::{Address, Bytes, FixedBytes};
use alloy_provider::{
	fillers::{ChainIdFiller, GasFiller, NonceFiller, SimpleNonceManager},
	DynProvider, PendingTransactionConfig, PendingTransactionError, Provider, ProviderBuilder,
};
use alloy_rpc_client::RpcClient;
use alloy_rpc_types::TransactionRequest;
use alloy_transport::{layers::RetryBackoffLayer, TransportError};
use async_trait::async_trait;
use dotsci_account::AccountSigner;
use dotsci_config::NetworkConfig;
use dotsci_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, TransactionHash,
	TransactionReceipt, ValidationError,
};
use std::time::Duration;

const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;

/// Alloy-based implementation of [`LedgerInterface`].
pub struct AlloyLedger {
	chain_id: u64,
	rpc_url: String,
	poll_interval: Duration,
	/// Provider for reads and confirmation tracking.
	reader: DynProvider,
}

impl AlloyLedger {
	pub fn new(chain_id: u64, rpc_url: &str, poll_interval: Duration) -> Result<Self, LedgerError> {
		let reader = ProviderBuilder::new()
			.connect_client(rpc_client(rpc_url)?)
			.erased();
		reader.client().set_poll_interval(poll_interval);

		Ok(Self {
			chain_id,
			rpc_url: rpc_url.to_string(),
			poll_interval,
			reader,
		})
	}

	/// Provider that signs with the session's signer.
	fn signing_provider(&self, signer: &AccountSigner) -> Result<DynProvider, LedgerError> {
		let wallet = EthereumWallet::from(signer.clone().with_chain_id(Some(self.chain_id)));

		let provider = ProviderBuilder::new()
			.filler(NonceFiller::new(SimpleNonceManager::default()))
			.filler(GasFiller)
			.filler(ChainIdFiller::default())
			.wallet(wallet)
			.connect_client(rpc_client(&self.rpc_url)?);
		provider.client().set_poll_interval(self.poll_interval);

		Ok(provider.erased())
	}

	fn request(call: &PreparedCall) -> TransactionRequest {
		let request = TransactionRequest::default()
			.to(call.to())
			.input(call.data().clone().into());
		match call.value() {
			Some(value) => request.value(value),
			None => request,
		}
	}
}

fn rpc_client(rpc_url: &str) -> Result<RpcClient, LedgerError> {
	let url = rpc_url
		.parse()
		.map_err(|e| LedgerError::Configuration(format!("Invalid RPC URL {}: {}", rpc_url, e)))?;

	// Rate-limit and transient transport errors are retried at this layer only.
	let retry_layer = RetryBackoffLayer::new(
		5,    // max_retry
		1000, // initial backoff in milliseconds
		10,   // compute units per second
	);
	Ok(RpcClient::builder().layer(retry_layer).http(url))
}

/// Sorts a node error into the ledger taxonomy.
fn classify(error: TransportError, context: &str) -> LedgerError {
	if let Some(payload) = error.as_error_resp() {
		let message = payload.message.to_string();
		let lower = message.to_lowercase();
		if lower.contains("revert") {
			return LedgerError::ExecutionReverted(message);
		}
		if lower.contains("insufficient funds") || lower.contains("denied") {
			return LedgerError::SubmissionRejected(message);
		}
	}
	let message = error.to_string();
	if message.to_lowercase().contains("signer") {
		return LedgerError::SubmissionRejected(message);
	}
	LedgerError::Network(format!("{}: {}", context, message))
}

/// Configuration schema for [`AlloyLedger`].
pub struct AlloyLedgerSchema;

impl ConfigSchema for AlloyLedgerSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![
				Field::new("rpc_url", FieldType::String).with_validator(|value| {
					match value.as_str() {
						Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
							Ok(())
						},
						_ => Err("rpc_url must be an http(s) URL".to_string()),
					}
				}),
				Field::new(
					"poll_interval_ms",
					FieldType::Integer {
						min: Some(100),
						max: Some(60_000),
					},
				),
			],
		);
		schema.validate(config)
	}
}

#[async_trait]
impl LedgerInterface for AlloyLedger {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(AlloyLedgerSchema)
	}

	fn chain_id(&self) -> u64 {
		self.chain_id
	}

	async fn estimate_gas(&self, from: Address, call: &PreparedCall) -> Result<u64, LedgerError> {
		let request = Self::request(call).from(from);
		self.reader
			.estimate_gas(request)
			.await
			.map_err(|e| classify(e, "Failed to estimate gas"))
	}

	async fn send(
		&self,
		signer: &AccountSigner,
		call: &PreparedCall,
		gas_limit: u64,
	) -> Result<TransactionHash, LedgerError> {
		let provider = self.signing_provider(signer)?;
		let request = Self::request(call).gas_limit(gas_limit);

		tracing::debug!(
			chain_id = self.chain_id,
			method = call.method(),
			to = %call.to(),
			value = ?call.value(),
			data_len = call.data().len(),
			gas_limit,
			"Sending transaction"
		);

		let pending = provider.send_transaction(request).await.map_err(|e| {
			tracing::error!(chain_id = self.chain_id, error = %e, "Transaction submission failed");
			classify(e, "Failed to send transaction")
		})?;

		Ok(TransactionHash(pending.tx_hash().0.to_vec()))
	}

	async fn wait_for_confirmation(
		&self,
		hash: &TransactionHash,
		confirmations: u64,
		timeout: Duration,
	) -> Result<TransactionReceipt, LedgerError> {
		let tx_hash = FixedBytes::<32>::try_from(hash.0.as_slice())
			.map_err(|_| LedgerError::InvalidArgument(format!("Invalid transaction hash {}", hash)))?;

		tracing::info!(
			tx_hash = %hash,
			confirmations,
			timeout_secs = timeout.as_secs(),
			"Waiting for confirmations"
		);

		let config = PendingTransactionConfig::new(tx_hash)
			.with_required_confirmations(confirmations)
			.with_timeout(Some(timeout));

		let pending = self
			.reader
			.watch_pending_transaction(config)
			.await
			.map_err(|e| match e {
				PendingTransactionError::TxWatcher(_) => {
					LedgerError::Network(format!("Transaction watch failed: {}", e))
				},
				PendingTransactionError::FailedToRegister => {
					LedgerError::Network("Failed to register transaction watcher".to_string())
				},
				PendingTransactionError::TransportError(_) => {
					LedgerError::Network(format!("Transport error: {}", e))
				},
				PendingTransactionError::Recv(_) => {
					LedgerError::Network(format!("Failed to receive response: {}", e))
				},
			})?;

		let confirmed = pending
			.await
			.map_err(|e| LedgerError::Network(format!("Failed to confirm transaction: {}", e)))?;

		match self.reader.get_transaction_receipt(confirmed).await {
			Ok(Some(receipt)) => Ok(TransactionReceipt {
				hash: TransactionHash(receipt.transaction_hash.0.to_vec()),
				block_number: receipt.block_number.unwrap_or(0),
				success: receipt.status(),
			}),
			Ok(None) => Err(LedgerError::Network(format!(
				"Receipt for {} not found after confirmation",
				hash
			))),
			Err(e) => Err(LedgerError::Network(format!("Failed to get receipt: {}", e))),
		}
	}

	async fn call(&self, call: &PreparedCall) -> Result<Bytes, LedgerError> {
		self.reader
			.call(Self::request(call))
			.await
			.map_err(|e| classify(e, "Failed to execute call"))
	}
}

/// Factory function for the alloy backend.
///
/// The RPC endpoint defaults to the network's `rpc_url`; the backend table
/// may override it.
pub fn create_alloy_ledger(
	config: &toml::Value,
	network: &NetworkConfig,
) -> Result<Box<dyn LedgerInterface>, LedgerError> {
	AlloyLedgerSchema
		.validate(config)
		.map_err(|e| LedgerError::Configuration(format!("Invalid configuration: {}", e)))?;

	let rpc_url = config
		.get("rpc_url")
		.and_then(|v| v.as_str())
		.unwrap_or(&network.rpc_url);
	let poll_interval = config
		.get("poll_interval_ms")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_POLL_INTERVAL_MS);

	Ok(Box::new(AlloyLedger::new(
		network.chain_id,
		rpc_url,
		Duration::from_millis(poll_interval),
	)?))
}

/// Registry for the alloy ledger backend.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "evm_alloy";
	type Factory = crate::LedgerFactory;

	fn factory() -> Self::Factory {
		create_alloy_ledger
	}
}

impl crate::LedgerRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::LedgerQuery;

	fn network() -> NetworkConfig {
		NetworkConfig {
			chain_id: 5611,
			rpc_url: "https://opbnb-testnet-rpc.bnbchain.org".to_string(),
			contract_address: "0xa7234f78c1fBD8b7d048c8aFF132fbefB28D9672".to_string(),
			native_decimals: 18,
			min_confirmations: 1,
			confirmation_timeout_seconds: 120,
		}
	}

	#[tokio::test]
	async fn test_factory_uses_network_rpc_by_default() {
		let config = toml::Value::Table(toml::map::Map::new());
		let ledger = create_alloy_ledger(&config, &network()).unwrap();
		assert_eq!(ledger.chain_id(), 5611);
	}

	#[tokio::test]
	async fn test_invalid_rpc_url_is_configuration_error() {
		let result = AlloyLedger::new(5611, "not a url", Duration::from_secs(1));
		assert!(matches!(result, Err(LedgerError::Configuration(_))));
	}

	#[test]
	fn test_schema_rejects_non_http_rpc() {
		let config: toml::Value = toml::from_str("rpc_url = \"ws://localhost:8545\"").unwrap();
		assert!(AlloyLedgerSchema.validate(&config).is_err());
		let config: toml::Value = toml::from_str("poll_interval_ms = 10").unwrap();
		assert!(AlloyLedgerSchema.validate(&config).is_err());
	}

	#[test]
	fn test_request_carries_value_only_when_attached() {
		let to: Address = network().contract_address.parse().unwrap();
		let read = LedgerQuery::PaperCounter.prepare(to, 5611);
		let request = AlloyLedger::request(&read);
		assert!(request.value.is_none());
		assert_eq!(request.input.input().map(|d| d.len()), Some(4));
	}

	#[tokio::test]
	async fn test_unreachable_node_is_network_error() {
		let ledger = AlloyLedger::new(5611, "http://127.0.0.1:9", Duration::from_millis(100)).unwrap();
		let to: Address = network().contract_address.parse().unwrap();
		let result = ledger.call(&LedgerQuery::PaperCounter.prepare(to, 5611)).await;
		assert!(matches!(result, Err(LedgerError::Network(_))));
	}

	#[test]
	fn test_registry_name() {
		assert_eq!(<Registry as ImplementationRegistry>::NAME, "evm_alloy");
	}
}
