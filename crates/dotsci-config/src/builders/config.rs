//! Configuration builder for test and development configurations.
//!
//! The defaults wire the in-memory storage and ledger backends and a single
//! local signing agent injected in the `ethereum` slot as MetaMask.

use crate::{
	AgentProviderConfig, AgentsConfig, AppConfig, BackoffConfig, Config, DaoConfig,
	InjectionSlot, LedgerConfig, NetworkConfig, ReconciliationConfig, StorageConfig,
};
use dotsci_types::Visibility;
use std::collections::HashMap;

/// Well-known development key (first account of the default local test mnemonic).
const DEV_PRIVATE_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Builder for creating `Config` instances with a fluent API.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	app_name: String,
	chain_id: u64,
	storage_chain_id: u64,
	storage_primary: String,
	ledger_primary: String,
	min_confirmations: u64,
	interval_ms: u64,
	max_attempts: u32,
	backoff: BackoffConfig,
	voting_fee: String,
	providers: HashMap<String, AgentProviderConfig>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	pub fn new() -> Self {
		let mut agent_config = toml::map::Map::new();
		agent_config.insert(
			"private_key".to_string(),
			toml::Value::String(DEV_PRIVATE_KEY.to_string()),
		);
		agent_config.insert("chain_id".to_string(), toml::Value::Integer(5611));

		let mut providers = HashMap::new();
		providers.insert(
			"metamask".to_string(),
			AgentProviderConfig {
				implementation: "local".to_string(),
				slot: InjectionSlot::Ethereum,
				markers: vec!["isMetaMask".to_string()],
				config: toml::Value::Table(agent_config),
			},
		);

		Self {
			app_name: "OpenDotSci".to_string(),
			chain_id: 5611,
			storage_chain_id: 5600,
			storage_primary: "memory".to_string(),
			ledger_primary: "memory".to_string(),
			min_confirmations: 1,
			interval_ms: 2000,
			max_attempts: 15,
			backoff: BackoffConfig::Fixed,
			voting_fee: "0.0001".to_string(),
			providers,
		}
	}

	pub fn app_name(mut self, name: impl Into<String>) -> Self {
		self.app_name = name.into();
		self
	}

	pub fn chain_id(mut self, chain_id: u64) -> Self {
		self.chain_id = chain_id;
		self
	}

	pub fn storage_primary(mut self, primary: impl Into<String>) -> Self {
		self.storage_primary = primary.into();
		self
	}

	pub fn ledger_primary(mut self, primary: impl Into<String>) -> Self {
		self.ledger_primary = primary.into();
		self
	}

	pub fn min_confirmations(mut self, confirmations: u64) -> Self {
		self.min_confirmations = confirmations;
		self
	}

	pub fn interval_ms(mut self, interval_ms: u64) -> Self {
		self.interval_ms = interval_ms;
		self
	}

	pub fn max_attempts(mut self, max_attempts: u32) -> Self {
		self.max_attempts = max_attempts;
		self
	}

	pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
		self.backoff = backoff;
		self
	}

	pub fn voting_fee(mut self, fee: impl Into<String>) -> Self {
		self.voting_fee = fee.into();
		self
	}

	/// Adds (or replaces) an injected provider.
	pub fn provider(mut self, label: impl Into<String>, provider: AgentProviderConfig) -> Self {
		self.providers.insert(label.into(), provider);
		self
	}

	pub fn build(self) -> Config {
		let mut storage_implementations = HashMap::new();
		storage_implementations.insert(
			self.storage_primary.clone(),
			toml::Value::Table(toml::map::Map::new()),
		);
		let mut ledger_implementations = HashMap::new();
		ledger_implementations.insert(
			self.ledger_primary.clone(),
			toml::Value::Table(toml::map::Map::new()),
		);

		Config {
			app: AppConfig {
				name: self.app_name,
			},
			network: NetworkConfig {
				chain_id: self.chain_id,
				rpc_url: "http://127.0.0.1:8545".to_string(),
				contract_address: "0xa7234f78c1fBD8b7d048c8aFF132fbefB28D9672".to_string(),
				native_decimals: 18,
				min_confirmations: self.min_confirmations,
				confirmation_timeout_seconds: 120,
			},
			storage: StorageConfig {
				primary: self.storage_primary,
				implementations: storage_implementations,
				chain_id: self.storage_chain_id,
				primary_sp_address: "0x2E123363d512482e2552bC74722a55BC2C355a7a".to_string(),
				view_base_url: "https://gnfd-testnet-sp-1.nodereal.io".to_string(),
				visibility: Visibility::PublicRead,
				charged_read_quota: 0,
			},
			ledger: LedgerConfig {
				primary: self.ledger_primary,
				implementations: ledger_implementations,
			},
			agents: AgentsConfig {
				default: "metamask".to_string(),
				providers: self.providers,
			},
			reconciliation: ReconciliationConfig {
				interval_ms: self.interval_ms,
				max_attempts: self.max_attempts,
				backoff: self.backoff,
			},
			dao: DaoConfig {
				voting_fee: self.voting_fee,
			},
		}
	}
}
