//! Session establishment and lifetime.
//!
//! The [`SessionManager`] owns at most one active [`Session`]. Connecting runs
//! account access, a network check and a signed authentication challenge; the
//! session is stored only after all three succeed, so a failed attempt never
//! leaves partial state behind.

use crate::{
	discover_providers, AccountSigner, AgentKind, InjectionEnvironment, SessionError, SigningAgent,
};
use dotsci_types::{current_timestamp_millis, Address, Signature};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

/// An authenticated binding to one signing agent and identity.
///
/// Constructed only with an address, an agent and its signer together, so a
/// session can never carry an address without signing capability.
pub struct Session {
	address: Address,
	chain_id: u64,
	kind: AgentKind,
	agent: Arc<dyn SigningAgent>,
	signer: AccountSigner,
	authentication: Signature,
}

impl Session {
	pub fn new(
		address: Address,
		chain_id: u64,
		kind: AgentKind,
		agent: Arc<dyn SigningAgent>,
		authentication: Signature,
	) -> Self {
		let signer = agent.signer();
		Self {
			address,
			chain_id,
			kind,
			agent,
			signer,
			authentication,
		}
	}

	pub fn address(&self) -> &Address {
		&self.address
	}

	/// Chain the agent was on when the session was established.
	pub fn chain_id(&self) -> u64 {
		self.chain_id
	}

	pub fn kind(&self) -> AgentKind {
		self.kind
	}

	/// Transaction signer for the ledger layer.
	pub fn signer(&self) -> AccountSigner {
		self.signer.clone()
	}

	/// Signature over the authentication challenge.
	pub fn authentication(&self) -> &Signature {
		&self.authentication
	}

	/// Asks the agent to sign `message`; the user may refuse.
	pub async fn sign_message(&self, message: &[u8]) -> Result<Signature, crate::AgentError> {
		self.agent.sign_message(message).await
	}
}

impl std::fmt::Debug for Session {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Session")
			.field("address", &self.address)
			.field("chain_id", &self.chain_id)
			.field("kind", &self.kind)
			.finish_non_exhaustive()
	}
}

/// Builds the authentication challenge presented to the user.
pub fn challenge_message(app_name: &str, timestamp_ms: u64) -> String {
	format!(
		"Welcome to {}! Sign this message to authenticate. Timestamp: {}",
		app_name, timestamp_ms
	)
}

/// Owner of the active session.
pub struct SessionManager {
	environment: InjectionEnvironment,
	app_name: String,
	expected_chain_id: u64,
	active: RwLock<Option<Arc<Session>>>,
	connecting: Mutex<()>,
}

impl SessionManager {
	pub fn new(
		environment: InjectionEnvironment,
		app_name: impl Into<String>,
		expected_chain_id: u64,
	) -> Self {
		Self {
			environment,
			app_name: app_name.into(),
			expected_chain_id,
			active: RwLock::new(None),
			connecting: Mutex::new(()),
		}
	}

	/// Kinds that can currently be connected, in discovery order.
	pub fn available(&self) -> Vec<AgentKind> {
		discover_providers(&self.environment)
			.into_iter()
			.map(|c| c.kind)
			.collect()
	}

	/// Connects to the agent of `kind` and authenticates it.
	///
	/// Concurrent attempts are rejected with
	/// [`SessionError::ConnectionInProgress`] so two challenge prompts never
	/// overlap. On success the new session replaces any previous one.
	#[instrument(skip(self, kind), fields(kind = %kind))]
	pub async fn connect(&self, kind: AgentKind) -> Result<Arc<Session>, SessionError> {
		let _guard = self
			.connecting
			.try_lock()
			.map_err(|_| SessionError::ConnectionInProgress)?;

		let candidate = discover_providers(&self.environment)
			.into_iter()
			.find(|c| c.kind == kind)
			.ok_or_else(|| SessionError::ProviderUnavailable(kind.to_string()))?;
		let agent = candidate.provider.agent;

		let accounts = agent.request_accounts().await?;
		let address = accounts
			.into_iter()
			.next()
			.ok_or_else(|| SessionError::Agent("Agent exposed no accounts".to_string()))?;

		let chain_id = agent.chain_id().await?;
		if chain_id != self.expected_chain_id {
			warn!(
				expected = self.expected_chain_id,
				actual = chain_id,
				"Signing agent is on an unexpected network"
			);
			return Err(SessionError::NetworkMismatch {
				expected: self.expected_chain_id,
				actual: chain_id,
			});
		}

		let challenge = challenge_message(&self.app_name, current_timestamp_millis());
		let authentication = agent.sign_message(challenge.as_bytes()).await?;

		let session = Arc::new(Session::new(address, chain_id, kind, agent, authentication));
		if Address::from(session.signer().address()) != *session.address() {
			return Err(SessionError::Agent(format!(
				"Signer address {} does not match account {}",
				session.signer().address(),
				session.address()
			)));
		}

		*self.active.write().unwrap_or_else(|e| e.into_inner()) = Some(session.clone());
		info!(
			address = %session.address(),
			provider = %candidate.provider.label,
			"Session established"
		);
		Ok(session)
	}

	/// Clears the local session. Agent-side permissions are left untouched.
	pub fn disconnect(&self) {
		let previous = self
			.active
			.write()
			.unwrap_or_else(|e| e.into_inner())
			.take();
		if let Some(session) = previous {
			info!(address = %session.address(), "Session cleared");
		}
	}

	pub fn session(&self) -> Option<Arc<Session>> {
		self.active
			.read()
			.unwrap_or_else(|e| e.into_inner())
			.clone()
	}

	pub fn address(&self) -> Option<Address> {
		self.session().map(|s| s.address().clone())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{AgentError, InjectedProvider, MockSigningAgent, ProviderMarkers};
	use alloy_signer_local::PrivateKeySigner;
	use std::time::Duration;

	const CHAIN: u64 = 5611;

	fn key() -> PrivateKeySigner {
		"0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
			.parse()
			.unwrap()
	}

	fn approving_agent() -> MockSigningAgent {
		let signer = key();
		let address = Address::from(signer.address());
		let mut agent = MockSigningAgent::new();
		agent
			.expect_request_accounts()
			.returning(move || Ok(vec![address.clone()]));
		agent.expect_chain_id().returning(|| Ok(CHAIN));
		agent
			.expect_sign_message()
			.returning(|_| Ok(Signature(vec![1u8; 65])));
		agent
			.expect_signer()
			.returning(move || AccountSigner::Local(signer.clone()));
		agent
	}

	fn manager_with(agent: MockSigningAgent) -> SessionManager {
		let env = InjectionEnvironment {
			ethereum: Some(InjectedProvider {
				label: "metamask".to_string(),
				markers: ProviderMarkers::from_names(&["isMetaMask"]),
				agent: Arc::new(agent),
			}),
			..Default::default()
		};
		SessionManager::new(env, "OpenDotSci", CHAIN)
	}

	#[tokio::test]
	async fn test_connect_establishes_session() {
		let manager = manager_with(approving_agent());
		let session = manager.connect(AgentKind::MetaMask).await.unwrap();

		assert_eq!(session.chain_id(), CHAIN);
		assert_eq!(manager.address(), Some(session.address().clone()));

		manager.disconnect();
		assert!(manager.session().is_none());
		assert!(manager.address().is_none());
	}

	#[tokio::test]
	async fn test_missing_provider_is_unavailable() {
		let manager = manager_with(approving_agent());
		let err = manager.connect(AgentKind::Phantom).await.unwrap_err();
		assert!(matches!(err, SessionError::ProviderUnavailable(_)));
	}

	#[tokio::test]
	async fn test_challenge_rejection_leaves_no_session() {
		let signer = key();
		let address = Address::from(signer.address());
		let mut agent = MockSigningAgent::new();
		agent
			.expect_request_accounts()
			.returning(move || Ok(vec![address.clone()]));
		agent.expect_chain_id().returning(|| Ok(CHAIN));
		agent
			.expect_sign_message()
			.withf(|msg| {
				String::from_utf8_lossy(msg)
					.starts_with("Welcome to OpenDotSci! Sign this message to authenticate. Timestamp: ")
			})
			.returning(|_| Err(AgentError::Rejected("User denied message signature".into())));

		let manager = manager_with(agent);
		let err = manager.connect(AgentKind::MetaMask).await.unwrap_err();

		assert!(matches!(err, SessionError::UserRejected(_)));
		assert!(manager.address().is_none());
	}

	#[tokio::test]
	async fn test_account_request_rejection() {
		let mut agent = MockSigningAgent::new();
		agent
			.expect_request_accounts()
			.returning(|| Err(AgentError::Rejected("denied".into())));

		let manager = manager_with(agent);
		assert!(matches!(
			manager.connect(AgentKind::MetaMask).await,
			Err(SessionError::UserRejected(_))
		));
	}

	#[tokio::test]
	async fn test_transport_failure_is_not_rejection() {
		let mut agent = MockSigningAgent::new();
		agent
			.expect_request_accounts()
			.returning(|| Err(AgentError::Transport("connection reset".into())));

		let manager = manager_with(agent);
		assert!(matches!(
			manager.connect(AgentKind::MetaMask).await,
			Err(SessionError::Agent(_))
		));
	}

	#[tokio::test]
	async fn test_network_mismatch_detected() {
		let signer = key();
		let address = Address::from(signer.address());
		let mut agent = MockSigningAgent::new();
		agent
			.expect_request_accounts()
			.returning(move || Ok(vec![address.clone()]));
		agent.expect_chain_id().returning(|| Ok(1));
		agent.expect_sign_message().never();

		let manager = manager_with(agent);
		let err = manager.connect(AgentKind::MetaMask).await.unwrap_err();
		assert!(matches!(
			err,
			SessionError::NetworkMismatch {
				expected: CHAIN,
				actual: 1
			}
		));
		assert!(manager.session().is_none());
	}

	/// Agent whose account request stalls until released, to hold a connect open.
	struct SlowAgent {
		inner: MockSigningAgent,
		release: tokio::sync::Notify,
	}

	#[async_trait::async_trait]
	impl SigningAgent for SlowAgent {
		fn config_schema(&self) -> Box<dyn dotsci_types::ConfigSchema> {
			self.inner.config_schema()
		}

		async fn request_accounts(&self) -> Result<Vec<Address>, AgentError> {
			self.release.notified().await;
			self.inner.request_accounts().await
		}

		async fn chain_id(&self) -> Result<u64, AgentError> {
			self.inner.chain_id().await
		}

		async fn sign_message(&self, message: &[u8]) -> Result<Signature, AgentError> {
			self.inner.sign_message(message).await
		}

		fn signer(&self) -> AccountSigner {
			self.inner.signer()
		}
	}

	#[tokio::test]
	async fn test_concurrent_connect_is_rejected() {
		let slow = Arc::new(SlowAgent {
			inner: approving_agent(),
			release: tokio::sync::Notify::new(),
		});
		let env = InjectionEnvironment {
			ethereum: Some(InjectedProvider {
				label: "metamask".to_string(),
				markers: ProviderMarkers::from_names(&["isMetaMask"]),
				agent: slow.clone(),
			}),
			..Default::default()
		};
		let manager = Arc::new(SessionManager::new(env, "OpenDotSci", CHAIN));

		let first = {
			let manager = manager.clone();
			tokio::spawn(async move { manager.connect(AgentKind::MetaMask).await })
		};
		tokio::time::sleep(Duration::from_millis(20)).await;

		let second = manager.connect(AgentKind::MetaMask).await;
		assert!(matches!(second, Err(SessionError::ConnectionInProgress)));

		slow.release.notify_one();
		assert!(first.await.unwrap().is_ok());
		assert!(manager.session().is_some());
	}

	#[test]
	fn test_challenge_message_format() {
		assert_eq!(
			challenge_message("OpenDotSci", 42),
			"Welcome to OpenDotSci! Sign this message to authenticate. Timestamp: 42"
		);
	}
}
