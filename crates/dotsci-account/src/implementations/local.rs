//! Private-key signing agent.
//!
//! Holds key material in process and approves every request. Used for
//! headless publishing from the CLI and as the default agent in development
//! configurations.

use crate::{AccountSigner, AgentError, SigningAgent};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use dotsci_types::{
	Address, ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, Signature,
	ValidationError,
};

/// Signing agent backed by a local private key.
#[derive(Debug)]
pub struct LocalAgent {
	signer: PrivateKeySigner,
	chain_id: u64,
}

impl LocalAgent {
	/// Creates an agent from a hex private key (with or without `0x`) that
	/// reports itself as connected to `chain_id`.
	pub fn new(private_key_hex: &str, chain_id: u64) -> Result<Self, AgentError> {
		let signer = private_key_hex
			.parse::<PrivateKeySigner>()
			.map_err(|e| AgentError::InvalidKey(format!("Invalid private key: {}", e)))?
			.with_chain_id(Some(chain_id));

		Ok(Self { signer, chain_id })
	}
}

/// Configuration schema for [`LocalAgent`].
pub struct LocalAgentSchema;

impl ConfigSchema for LocalAgentSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("private_key", FieldType::String).with_validator(|value| {
					let key = value.as_str().unwrap_or_default();
					let digits = key.strip_prefix("0x").unwrap_or(key);
					if digits.len() != 64 {
						return Err("Private key must be 64 hex characters (32 bytes)".to_string());
					}
					hex::decode(digits)
						.map(|_| ())
						.map_err(|_| "Private key must be valid hexadecimal".to_string())
				}),
				Field::new(
					"chain_id",
					FieldType::Integer {
						min: Some(1),
						max: None,
					},
				),
			],
			vec![],
		);

		schema.validate(config)
	}
}

#[async_trait]
impl SigningAgent for LocalAgent {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LocalAgentSchema)
	}

	async fn request_accounts(&self) -> Result<Vec<Address>, AgentError> {
		Ok(vec![self.signer.address().into()])
	}

	async fn chain_id(&self) -> Result<u64, AgentError> {
		Ok(self.chain_id)
	}

	async fn sign_message(&self, message: &[u8]) -> Result<Signature, AgentError> {
		let signature = self
			.signer
			.sign_message(message)
			.await
			.map_err(|e| AgentError::Implementation(format!("Failed to sign message: {}", e)))?;

		Ok(Signature(signature.as_bytes().to_vec()))
	}

	fn signer(&self) -> AccountSigner {
		AccountSigner::Local(self.signer.clone())
	}
}

/// Creates a [`LocalAgent`] from its configuration table.
pub fn create_agent(config: &toml::Value) -> Result<Box<dyn SigningAgent>, AgentError> {
	LocalAgentSchema
		.validate(config)
		.map_err(|e| AgentError::InvalidKey(format!("Invalid configuration: {}", e)))?;

	let private_key = config
		.get("private_key")
		.and_then(|v| v.as_str())
		.ok_or_else(|| AgentError::InvalidKey("private_key is required".to_string()))?;
	let chain_id = config
		.get("chain_id")
		.and_then(|v| v.as_integer())
		.ok_or_else(|| AgentError::Implementation("chain_id is required".to_string()))?;

	Ok(Box::new(LocalAgent::new(private_key, chain_id as u64)?))
}

/// Registry for the local agent implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "local";
	type Factory = crate::AgentFactory;

	fn factory() -> Self::Factory {
		create_agent
	}
}

impl crate::AgentRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	const TEST_PRIVATE_KEY: &str =
		"ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

	fn config(private_key: &str, chain_id: i64) -> toml::Value {
		let mut table = toml::map::Map::new();
		table.insert(
			"private_key".to_string(),
			toml::Value::String(private_key.to_string()),
		);
		table.insert("chain_id".to_string(), toml::Value::Integer(chain_id));
		toml::Value::Table(table)
	}

	#[tokio::test]
	async fn test_agent_exposes_single_account_and_chain() {
		let agent = LocalAgent::new(TEST_PRIVATE_KEY, 5611).unwrap();
		let accounts = agent.request_accounts().await.unwrap();
		assert_eq!(accounts.len(), 1);
		assert_eq!(
			accounts[0].to_string(),
			"0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
		);
		assert_eq!(agent.chain_id().await.unwrap(), 5611);
		assert_eq!(agent.signer().chain_id(), Some(5611));
	}

	#[tokio::test]
	async fn test_sign_message_produces_65_bytes() {
		let agent = LocalAgent::new(TEST_PRIVATE_KEY, 5611).unwrap();
		let signature = agent.sign_message(b"hello").await.unwrap();
		assert_eq!(signature.0.len(), 65);
	}

	#[test]
	fn test_invalid_key_rejected() {
		assert!(matches!(
			LocalAgent::new("invalid_key", 1),
			Err(AgentError::InvalidKey(_))
		));
	}

	#[test]
	fn test_schema_validation() {
		assert!(LocalAgentSchema.validate(&config(TEST_PRIVATE_KEY, 5611)).is_ok());
		assert!(LocalAgentSchema
			.validate(&config(&format!("0x{}", TEST_PRIVATE_KEY), 5611))
			.is_ok());
		assert!(LocalAgentSchema.validate(&config("1234", 5611)).is_err());
		assert!(LocalAgentSchema.validate(&config(TEST_PRIVATE_KEY, 0)).is_err());
	}

	#[tokio::test]
	async fn test_registry_factory() {
		assert_eq!(Registry::NAME, "local");
		let agent = (Registry::factory())(&config(TEST_PRIVATE_KEY, 5611)).unwrap();
		assert_eq!(agent.chain_id().await.unwrap(), 5611);
		assert!(create_agent(&toml::Value::Table(Default::default())).is_err());
	}
}
