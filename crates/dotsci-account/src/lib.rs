//! Session management for the dotsci publication pipeline.
//!
//! A user-controlled signing agent (a wallet) is the only holder of key
//! material. This crate discovers which agents are injected into the
//! environment, connects to exactly one of them with an authentication
//! challenge, and hands the rest of the pipeline a read-only [`Session`].

use async_trait::async_trait;
use dotsci_types::{Address, ConfigSchema, ImplementationRegistry, Signature};
use thiserror::Error;

pub mod discovery;
pub mod session;
pub mod signer;

pub use discovery::{
	discover_providers, AgentKind, CandidateProvider, InjectedProvider, InjectionEnvironment,
	ProviderMarkers,
};
pub use session::{Session, SessionManager};
pub use signer::AccountSigner;

pub mod implementations {
	pub mod local;
}

/// Errors reported by a signing agent.
///
/// `Rejected` is the user saying no; every other variant is a failure of the
/// agent or its transport and must not be presented as a user decision.
#[derive(Debug, Error)]
pub enum AgentError {
	#[error("Request rejected by user: {0}")]
	Rejected(String),
	#[error("Agent transport error: {0}")]
	Transport(String),
	#[error("Invalid key: {0}")]
	InvalidKey(String),
	#[error("Implementation error: {0}")]
	Implementation(String),
}

/// Errors from establishing a session.
#[derive(Debug, Error)]
pub enum SessionError {
	#[error("No signing agent available for {0}")]
	ProviderUnavailable(String),
	#[error("User rejected the request: {0}")]
	UserRejected(String),
	#[error("Network mismatch: expected chain {expected}, agent is on chain {actual}")]
	NetworkMismatch { expected: u64, actual: u64 },
	#[error("A connection attempt is already in progress")]
	ConnectionInProgress,
	#[error("Signing agent error: {0}")]
	Agent(String),
}

impl From<AgentError> for SessionError {
	fn from(err: AgentError) -> Self {
		match err {
			AgentError::Rejected(reason) => SessionError::UserRejected(reason),
			other => SessionError::Agent(other.to_string()),
		}
	}
}

/// Interface of a user-controlled signing agent.
///
/// Any call may prompt the user; a refusal comes back as
/// [`AgentError::Rejected`].
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SigningAgent: Send + Sync {
	/// Configuration schema of this agent implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Asks the agent for account access and returns the exposed accounts.
	async fn request_accounts(&self) -> Result<Vec<Address>, AgentError>;

	/// Chain the agent is currently connected to.
	async fn chain_id(&self) -> Result<u64, AgentError>;

	/// Signs an arbitrary message (EIP-191).
	async fn sign_message(&self, message: &[u8]) -> Result<Signature, AgentError>;

	/// Transaction-signing capability for the ledger layer.
	fn signer(&self) -> AccountSigner;
}

/// Factory function type for signing agents.
pub type AgentFactory = fn(&toml::Value) -> Result<Box<dyn SigningAgent>, AgentError>;

pub trait AgentRegistry: ImplementationRegistry<Factory = AgentFactory> {}

/// Get all registered signing-agent implementations.
pub fn get_all_implementations() -> Vec<(&'static str, AgentFactory)> {
	use implementations::local;

	vec![(local::Registry::NAME, local::Registry::factory())]
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_rejection_maps_to_user_rejected() {
		let err: SessionError = AgentError::Rejected("denied".into()).into();
		assert!(matches!(err, SessionError::UserRejected(r) if r == "denied"));

		let err: SessionError = AgentError::Transport("socket closed".into()).into();
		assert!(matches!(err, SessionError::Agent(r) if r.contains("socket closed")));
	}

	#[test]
	fn test_get_all_implementations_includes_local() {
		let impls = get_all_implementations();
		assert!(impls.iter().any(|(name, _)| *name == "local"));
	}
}
