//! Configuration module for the dotsci publication pipeline.
//!
//! Configuration is a single TOML file. Values may reference environment
//! variables as `${VAR}` or `${VAR:-default}`; a `.env` file in the working
//! directory is loaded first. Backend-specific tables (storage, ledger, signing
//! agents) are kept as raw `toml::Value`s and validated by the backend that
//! consumes them.

pub mod builders;

pub use builders::config::ConfigBuilder;

use dotsci_types::{parse_address, parse_units, Visibility};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Configuration error: {0}")]
	Parse(String),
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message only; the default rendering dumps the whole input.
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	#[serde(default)]
	pub app: AppConfig,
	/// Ledger network the registry contract lives on.
	pub network: NetworkConfig,
	pub storage: StorageConfig,
	pub ledger: LedgerConfig,
	pub agents: AgentsConfig,
	#[serde(default)]
	pub reconciliation: ReconciliationConfig,
	#[serde(default)]
	pub dao: DaoConfig,
}

/// Application identity, used in the authentication challenge.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
	#[serde(default = "default_app_name")]
	pub name: String,
}

impl Default for AppConfig {
	fn default() -> Self {
		Self {
			name: default_app_name(),
		}
	}
}

fn default_app_name() -> String {
	"OpenDotSci".to_string()
}

/// Ledger network settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
	/// Chain the session's signing agent must be on.
	pub chain_id: u64,
	pub rpc_url: String,
	/// Address of the publication registry contract.
	pub contract_address: String,
	/// Decimal precision of the native coin.
	#[serde(default = "default_native_decimals")]
	pub native_decimals: u8,
	/// Confirmations a transaction needs before it counts as final.
	#[serde(default = "default_confirmations")]
	pub min_confirmations: u64,
	#[serde(default = "default_confirmation_timeout_seconds")]
	pub confirmation_timeout_seconds: u64,
}

fn default_native_decimals() -> u8 {
	18
}

fn default_confirmations() -> u64 {
	1
}

fn default_confirmation_timeout_seconds() -> u64 {
	120
}

/// Object-store settings shared by every storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
	/// Network identifier of the storage chain, stamped on every storage message.
	pub chain_id: u64,
	/// Storage provider that hosts newly created containers.
	pub primary_sp_address: String,
	/// Gateway base used to build human-viewable URLs.
	pub view_base_url: String,
	#[serde(default)]
	pub visibility: Visibility,
	/// Pre-paid read quota for new containers.
	#[serde(default)]
	pub charged_read_quota: u64,
}

/// Ledger backend selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LedgerConfig {
	pub primary: String,
	pub implementations: HashMap<String, toml::Value>,
}

/// Where an injected provider appears in the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectionSlot {
	/// The single shared `ethereum` slot.
	Ethereum,
	/// The multi-provider list.
	Providers,
	/// A wallet-specific slot (for example `trustwallet` or `phantom.ethereum`).
	Dedicated,
}

/// One injected signing-agent provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentProviderConfig {
	/// Signing agent implementation, e.g. `local`.
	pub implementation: String,
	pub slot: InjectionSlot,
	/// Identity markers the provider declares, e.g. `isMetaMask`.
	#[serde(default)]
	pub markers: Vec<String>,
	/// Implementation-specific table.
	#[serde(default = "empty_table")]
	pub config: toml::Value,
}

fn empty_table() -> toml::Value {
	toml::Value::Table(toml::map::Map::new())
}

/// Signing-agent environment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentsConfig {
	/// Agent kind connected by default, e.g. `metamask`.
	pub default: String,
	/// Injected providers keyed by a free-form label.
	pub providers: HashMap<String, AgentProviderConfig>,
}

/// Known identity markers.
pub const KNOWN_MARKERS: [&str; 4] = ["isMetaMask", "isTrust", "isPhantom", "isBitKeep"];

/// Known agent kinds.
pub const KNOWN_AGENT_KINDS: [&str; 4] = ["metamask", "trust", "phantom", "bitget"];

/// Delay strategy between reconciliation attempts.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackoffConfig {
	#[default]
	Fixed,
	Exponential {
		factor: f64,
		max_interval_ms: u64,
	},
}

/// Reconciliation poll settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReconciliationConfig {
	#[serde(default = "default_interval_ms")]
	pub interval_ms: u64,
	#[serde(default = "default_max_attempts")]
	pub max_attempts: u32,
	#[serde(default)]
	pub backoff: BackoffConfig,
}

impl Default for ReconciliationConfig {
	fn default() -> Self {
		Self {
			interval_ms: default_interval_ms(),
			max_attempts: default_max_attempts(),
			backoff: BackoffConfig::Fixed,
		}
	}
}

fn default_interval_ms() -> u64 {
	2000
}

fn default_max_attempts() -> u32 {
	15
}

/// Grant DAO settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DaoConfig {
	/// Fee attached to every vote, in native-coin decimal.
	#[serde(default = "default_voting_fee")]
	pub voting_fee: String,
}

impl Default for DaoConfig {
	fn default() -> Self {
		Self {
			voting_fee: default_voting_fee(),
		}
	}
}

fn default_voting_fee() -> String {
	"0.0001".to_string()
}

/// Resolves environment variables in a string.
///
/// Replaces `${VAR_NAME}` with the value of `VAR_NAME`, or with `default_value`
/// for `${VAR_NAME:-default_value}` when the variable is unset.
///
/// Input is limited to 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {e}")))?;

	let mut output = String::with_capacity(input.len());
	let mut last = 0;
	for cap in re.captures_iter(input) {
		let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match (std::env::var(name.as_str()), cap.get(2)) {
			(Ok(v), _) => v,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				return Err(ConfigError::Validation(format!(
					"Environment variable '{}' not found",
					name.as_str()
				)))
			},
		};
		output.push_str(&input[last..whole.start()]);
		output.push_str(&value);
		last = whole.end();
	}
	output.push_str(&input[last..]);

	Ok(output)
}

impl Config {
	/// Loads configuration from a TOML file.
	///
	/// A `.env` file in the working directory, if present, is loaded before
	/// variables are resolved.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let _ = dotenvy::dotenv();
		let contents = tokio::fs::read_to_string(path.as_ref()).await?;
		contents.parse()
	}

	/// Checks cross-field constraints that serde cannot express.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.app.name.trim().is_empty() {
			return Err(ConfigError::Validation("App name cannot be empty".into()));
		}

		self.validate_network()?;
		self.validate_storage()?;

		if !self
			.ledger
			.implementations
			.contains_key(&self.ledger.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary ledger '{}' not found in ledger implementations",
				self.ledger.primary
			)));
		}

		self.validate_agents()?;
		self.validate_reconciliation()?;

		parse_units(&self.dao.voting_fee, self.network.native_decimals).map_err(|e| {
			ConfigError::Validation(format!("Invalid dao.voting_fee: {}", e))
		})?;

		Ok(())
	}

	fn validate_network(&self) -> Result<(), ConfigError> {
		let network = &self.network;
		if network.chain_id == 0 {
			return Err(ConfigError::Validation("network.chain_id must be non-zero".into()));
		}
		if network.rpc_url.trim().is_empty() {
			return Err(ConfigError::Validation("network.rpc_url cannot be empty".into()));
		}
		parse_address(&network.contract_address).map_err(|e| {
			ConfigError::Validation(format!("Invalid network.contract_address: {}", e))
		})?;
		if network.native_decimals > 77 {
			return Err(ConfigError::Validation(format!(
				"network.native_decimals {} exceeds the 256-bit range",
				network.native_decimals
			)));
		}
		if network.min_confirmations == 0 {
			return Err(ConfigError::Validation(
				"network.min_confirmations must be at least 1".into(),
			));
		}
		Ok(())
	}

	fn validate_storage(&self) -> Result<(), ConfigError> {
		let storage = &self.storage;
		if !storage.implementations.contains_key(&storage.primary) {
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in storage implementations",
				storage.primary
			)));
		}
		if storage.chain_id == 0 {
			return Err(ConfigError::Validation("storage.chain_id must be non-zero".into()));
		}
		parse_address(&storage.primary_sp_address).map_err(|e| {
			ConfigError::Validation(format!("Invalid storage.primary_sp_address: {}", e))
		})?;
		if !storage.view_base_url.starts_with("http") {
			return Err(ConfigError::Validation(format!(
				"storage.view_base_url must be an http(s) URL, got '{}'",
				storage.view_base_url
			)));
		}
		Ok(())
	}

	fn validate_agents(&self) -> Result<(), ConfigError> {
		let agents = &self.agents;
		if !KNOWN_AGENT_KINDS.contains(&agents.default.as_str()) {
			return Err(ConfigError::Validation(format!(
				"Unknown default agent kind '{}', expected one of {:?}",
				agents.default, KNOWN_AGENT_KINDS
			)));
		}
		if agents.providers.is_empty() {
			return Err(ConfigError::Validation(
				"At least one agent provider must be configured".into(),
			));
		}
		for (label, provider) in &agents.providers {
			if provider.markers.is_empty() {
				return Err(ConfigError::Validation(format!(
					"Agent provider '{}' declares no markers",
					label
				)));
			}
			if let Some(unknown) = provider
				.markers
				.iter()
				.find(|m| !KNOWN_MARKERS.contains(&m.as_str()))
			{
				return Err(ConfigError::Validation(format!(
					"Agent provider '{}' declares unknown marker '{}'",
					label, unknown
				)));
			}
		}
		Ok(())
	}

	fn validate_reconciliation(&self) -> Result<(), ConfigError> {
		let reconciliation = &self.reconciliation;
		if reconciliation.interval_ms == 0 {
			return Err(ConfigError::Validation(
				"reconciliation.interval_ms must be non-zero".into(),
			));
		}
		if reconciliation.max_attempts == 0 {
			return Err(ConfigError::Validation(
				"reconciliation.max_attempts must be at least 1".into(),
			));
		}
		if let BackoffConfig::Exponential {
			factor,
			max_interval_ms,
		} = reconciliation.backoff
		{
			if !factor.is_finite() || factor < 1.0 {
				return Err(ConfigError::Validation(format!(
					"Exponential backoff factor must be >= 1.0, got {}",
					factor
				)));
			}
			if max_interval_ms < reconciliation.interval_ms {
				return Err(ConfigError::Validation(
					"Exponential backoff max_interval_ms must not be below interval_ms".into(),
				));
			}
		}
		Ok(())
	}
}

/// Parses, resolves environment variables, and validates.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	const BASE: &str = r#"
[network]
chain_id = 5611
rpc_url = "https://opbnb-testnet-rpc.bnbchain.org"
contract_address = "0xa7234f78c1fBD8b7d048c8aFF132fbefB28D9672"

[storage]
primary = "memory"
chain_id = 5600
primary_sp_address = "0x2E123363d512482e2552bC74722a55BC2C355a7a"
view_base_url = "https://gnfd-testnet-sp-1.nodereal.io"
[storage.implementations.memory]

[ledger]
primary = "memory"
[ledger.implementations.memory]

[agents]
default = "metamask"
[agents.providers.metamask]
implementation = "local"
slot = "ethereum"
markers = ["isMetaMask"]
"#;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("DOTSCI_TEST_HOST", "localhost");
		std::env::set_var("DOTSCI_TEST_PORT", "8545");

		let input = "url = \"http://${DOTSCI_TEST_HOST}:${DOTSCI_TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "url = \"http://localhost:8545\"");

		std::env::remove_var("DOTSCI_TEST_HOST");
		std::env::remove_var("DOTSCI_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${DOTSCI_MISSING_VAR:-fallback}\"";
		assert_eq!(resolve_env_vars(input).unwrap(), "value = \"fallback\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let result = resolve_env_vars("value = \"${DOTSCI_ABSENT_VAR}\"");
		assert!(result.unwrap_err().to_string().contains("DOTSCI_ABSENT_VAR"));
	}

	#[test]
	fn test_oversized_input_rejected() {
		let input = "a".repeat(1024 * 1024 + 1);
		assert!(matches!(
			resolve_env_vars(&input),
			Err(ConfigError::Validation(_))
		));
	}

	#[test]
	fn test_defaults_applied() {
		let config: Config = BASE.parse().unwrap();
		assert_eq!(config.app.name, "OpenDotSci");
		assert_eq!(config.network.native_decimals, 18);
		assert_eq!(config.network.min_confirmations, 1);
		assert_eq!(config.reconciliation.interval_ms, 2000);
		assert_eq!(config.reconciliation.max_attempts, 15);
		assert_eq!(config.reconciliation.backoff, BackoffConfig::Fixed);
		assert_eq!(config.dao.voting_fee, "0.0001");
		assert_eq!(config.storage.visibility, Visibility::PublicRead);
		assert_eq!(config.storage.charged_read_quota, 0);
	}

	#[test]
	fn test_exponential_backoff_parsed() {
		let config: Config = format!(
			"{}\n[reconciliation]\ninterval_ms = 500\nbackoff = {{ type = \"exponential\", factor = 2.0, max_interval_ms = 8000 }}\n",
			BASE
		)
		.parse()
		.unwrap();
		assert_eq!(
			config.reconciliation.backoff,
			BackoffConfig::Exponential {
				factor: 2.0,
				max_interval_ms: 8000
			}
		);
	}

	#[test]
	fn test_invalid_backoff_rejected() {
		let result: Result<Config, _> = format!(
			"{}\n[reconciliation]\nbackoff = {{ type = \"exponential\", factor = 0.5, max_interval_ms = 8000 }}\n",
			BASE
		)
		.parse();
		assert!(matches!(result, Err(ConfigError::Validation(_))));
	}

	#[test]
	fn test_primary_storage_must_exist() {
		let config = BASE.replace("primary = \"memory\"\nchain_id", "primary = \"http\"\nchain_id");
		let result: Result<Config, _> = config.parse();
		assert!(result.unwrap_err().to_string().contains("Primary storage"));
	}

	#[test]
	fn test_unknown_marker_rejected() {
		let config = BASE.replace("[\"isMetaMask\"]", "[\"isSomethingElse\"]");
		let result: Result<Config, _> = config.parse();
		assert!(result.unwrap_err().to_string().contains("isSomethingElse"));
	}

	#[test]
	fn test_bad_contract_address_rejected() {
		let config = BASE.replace(
			"0xa7234f78c1fBD8b7d048c8aFF132fbefB28D9672",
			"0xnot-an-address",
		);
		let result: Result<Config, _> = config.parse();
		assert!(result.unwrap_err().to_string().contains("contract_address"));
	}

	#[tokio::test]
	async fn test_from_file_with_env_default() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		let contents = BASE.replace(
			"rpc_url = \"https://opbnb-testnet-rpc.bnbchain.org\"",
			"rpc_url = \"${DOTSCI_UNSET_RPC:-http://127.0.0.1:8545}\"",
		);
		file.write_all(contents.as_bytes()).unwrap();

		let config = Config::from_file(file.path()).await.unwrap();
		assert_eq!(config.network.rpc_url, "http://127.0.0.1:8545");
	}

	#[test]
	fn test_builder_produces_valid_config() {
		let config = ConfigBuilder::new().max_attempts(3).build();
		assert!(config.validate().is_ok());
		assert_eq!(config.reconciliation.max_attempts, 3);
	}
}
