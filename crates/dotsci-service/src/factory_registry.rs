//! Dynamic factory registry for pipeline implementations.
//!
//! Signing agents, object stores and ledger backends self-register by name;
//! configuration picks them by that name. This module turns a validated
//! [`Config`] into a ready [`PublicationOrchestrator`].

use alloy_primitives::Address as EvmAddress;
use dotsci_account::{
	AgentFactory, AgentKind, InjectedProvider, InjectionEnvironment, ProviderMarkers,
	SessionManager,
};
use dotsci_config::{Config, InjectionSlot};
use dotsci_core::{EventBus, PollSettings, PublicationOrchestrator, ReconciliationPoller};
use dotsci_ledger::{LedgerFactory, LedgerRegistrar, RegistrarSettings};
use dotsci_storage::{ContentStore, ObjectStoreFactory, StoreSettings};
use dotsci_types::{parse_address, RedundancyType};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Capacity of the progress event channel.
const EVENT_CAPACITY: usize = 256;

/// Global registry for all implementation factories
#[derive(Default)]
pub struct FactoryRegistry {
	pub agents: HashMap<String, AgentFactory>,
	pub storage: HashMap<String, ObjectStoreFactory>,
	pub ledger: HashMap<String, LedgerFactory>,
}

impl FactoryRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register_agent(&mut self, name: impl Into<String>, factory: AgentFactory) {
		self.agents.insert(name.into(), factory);
	}

	pub fn register_storage(&mut self, name: impl Into<String>, factory: ObjectStoreFactory) {
		self.storage.insert(name.into(), factory);
	}

	pub fn register_ledger(&mut self, name: impl Into<String>, factory: LedgerFactory) {
		self.ledger.insert(name.into(), factory);
	}
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Initialize the global registry with all available implementations
pub fn initialize_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();

		for (name, factory) in dotsci_account::get_all_implementations() {
			tracing::debug!("Registering signing agent implementation: {}", name);
			registry.register_agent(name, factory);
		}

		for (name, factory) in dotsci_storage::get_all_implementations() {
			tracing::debug!("Registering storage implementation: {}", name);
			registry.register_storage(name, factory);
		}

		for (name, factory) in dotsci_ledger::get_all_implementations() {
			tracing::debug!("Registering ledger implementation: {}", name);
			registry.register_ledger(name, factory);
		}

		registry
	})
}

/// Get the global factory registry
pub fn get_registry() -> &'static FactoryRegistry {
	initialize_registry()
}

/// Looks up `name` in a registry table, listing the alternatives on a miss.
fn lookup<F: Copy>(
	table: &HashMap<String, F>,
	name: &str,
	type_name: &str,
) -> Result<F, Box<dyn std::error::Error>> {
	table.get(name).copied().ok_or_else(|| {
		let mut available: Vec<_> = table.keys().cloned().collect();
		available.sort();
		format!(
			"Unknown {} implementation '{}'. Available: [{}]",
			type_name,
			name,
			available.join(", ")
		)
		.into()
	})
}

/// Builds the injected-provider environment from the `[agents]` section.
///
/// The multi-provider list follows label order so discovery is reproducible.
pub fn build_environment(
	config: &Config,
) -> Result<InjectionEnvironment, Box<dyn std::error::Error>> {
	let registry = get_registry();
	let mut environment = InjectionEnvironment::default();

	let providers: BTreeMap<_, _> = config.agents.providers.iter().collect();
	for (label, provider) in providers {
		let factory = lookup(&registry.agents, &provider.implementation, "signing agent")?;
		let agent = factory(&provider.config)
			.map_err(|e| format!("Failed to create agent '{}': {}", label, e))?;
		let markers = ProviderMarkers::from_names(&provider.markers);
		let injected = InjectedProvider {
			label: label.clone(),
			markers,
			agent: Arc::from(agent),
		};

		match provider.slot {
			InjectionSlot::Ethereum => {
				if environment.ethereum.is_some() {
					return Err(format!(
						"Agent provider '{}' claims the ethereum slot, which is already taken",
						label
					)
					.into());
				}
				environment.ethereum = Some(injected);
			},
			InjectionSlot::Providers => environment.providers.push(injected),
			InjectionSlot::Dedicated => {
				// MetaMask has no slot of its own.
				let kind = AgentKind::ALL
					.into_iter()
					.find(|kind| *kind != AgentKind::MetaMask && markers.declares(*kind))
					.ok_or_else(|| {
						format!(
							"Agent provider '{}' uses a dedicated slot but declares no wallet with one",
							label
						)
					})?;
				if environment.dedicated.insert(kind, injected).is_some() {
					return Err(format!("Dedicated slot for {} configured twice", kind).into());
				}
			},
		}
		tracing::debug!(label = %label, slot = ?provider.slot, "Injected agent provider");
	}

	Ok(environment)
}

/// Builds the orchestrator and every component behind it from `config`.
pub async fn build_orchestrator_from_config(
	config: &Config,
) -> Result<PublicationOrchestrator, Box<dyn std::error::Error>> {
	let registry = get_registry();

	// Every configured implementation name must be known, not only the primary.
	for name in config.storage.implementations.keys() {
		lookup(&registry.storage, name, "storage")?;
	}
	for name in config.ledger.implementations.keys() {
		lookup(&registry.ledger, name, "ledger")?;
	}

	let environment = build_environment(config)?;
	let sessions = Arc::new(SessionManager::new(
		environment,
		config.app.name.clone(),
		config.network.chain_id,
	));

	let storage_config = config
		.storage
		.implementations
		.get(&config.storage.primary)
		.ok_or_else(|| format!("Missing storage implementation '{}'", config.storage.primary))?;
	let store_backend = lookup(&registry.storage, &config.storage.primary, "storage")?(
		storage_config,
	)?;
	let store = ContentStore::new(
		Arc::from(store_backend),
		StoreSettings {
			chain_id: config.storage.chain_id,
			primary_sp_address: parse_address(&config.storage.primary_sp_address)?,
			view_base_url: config.storage.view_base_url.clone(),
			visibility: config.storage.visibility,
			charged_read_quota: config.storage.charged_read_quota,
			redundancy: RedundancyType::default(),
		},
	);

	let ledger_config = config
		.ledger
		.implementations
		.get(&config.ledger.primary)
		.ok_or_else(|| format!("Missing ledger implementation '{}'", config.ledger.primary))?;
	let ledger_backend = lookup(&registry.ledger, &config.ledger.primary, "ledger")?(
		ledger_config,
		&config.network,
	)?;
	let contract_address: EvmAddress = config
		.network
		.contract_address
		.parse()
		.map_err(|e| format!("Invalid contract address: {}", e))?;
	let registrar = LedgerRegistrar::new(
		Arc::from(ledger_backend),
		RegistrarSettings {
			contract_address,
			native_decimals: config.network.native_decimals,
			min_confirmations: config.network.min_confirmations,
			confirmation_timeout: Duration::from_secs(config.network.confirmation_timeout_seconds),
		},
	);

	tracing::info!(
		storage = %config.storage.primary,
		ledger = %config.ledger.primary,
		chain_id = config.network.chain_id,
		"Pipeline components built"
	);

	Ok(PublicationOrchestrator::new(
		sessions,
		Arc::new(store),
		Arc::new(registrar),
		ReconciliationPoller::new(PollSettings::from_config(&config.reconciliation)),
		EventBus::new(EVENT_CAPACITY),
		config.dao.voting_fee.clone(),
	))
}
