//! Discovery of injected signing-agent providers.
//!
//! Wallets announce themselves by injecting a provider object into the host
//! environment. Several can be injected at once: one may own the shared
//! `ethereum` slot, others appear in a multi-provider list or in a
//! wallet-specific slot. Each provider declares identity markers, and some
//! declare more than one (a wallet impersonating MetaMask for compatibility).
//!
//! [`discover_providers`] turns that environment into a deterministic list of
//! candidates, one per resolvable [`AgentKind`], in the fixed order of
//! [`AgentKind::ALL`].

use crate::SigningAgent;
use std::{collections::HashMap, fmt, str::FromStr, sync::Arc};

/// Supported signing-agent kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentKind {
	MetaMask,
	TrustWallet,
	Phantom,
	Bitget,
}

impl AgentKind {
	/// Discovery order.
	pub const ALL: [AgentKind; 4] = [
		AgentKind::MetaMask,
		AgentKind::TrustWallet,
		AgentKind::Phantom,
		AgentKind::Bitget,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			AgentKind::MetaMask => "metamask",
			AgentKind::TrustWallet => "trust",
			AgentKind::Phantom => "phantom",
			AgentKind::Bitget => "bitget",
		}
	}

	/// Identity marker the provider declares for this kind.
	pub fn marker(&self) -> &'static str {
		match self {
			AgentKind::MetaMask => "isMetaMask",
			AgentKind::TrustWallet => "isTrust",
			AgentKind::Phantom => "isPhantom",
			AgentKind::Bitget => "isBitKeep",
		}
	}
}

impl fmt::Display for AgentKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for AgentKind {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		AgentKind::ALL
			.into_iter()
			.find(|kind| kind.as_str() == s.to_ascii_lowercase())
			.ok_or_else(|| format!("Unknown agent kind: {}", s))
	}
}

/// Identity markers declared by an injected provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProviderMarkers {
	pub is_metamask: bool,
	pub is_trust: bool,
	pub is_phantom: bool,
	pub is_bitkeep: bool,
}

impl ProviderMarkers {
	/// Builds markers from their declared names; unknown names are ignored.
	pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
		let mut markers = Self::default();
		for name in names {
			match name.as_ref() {
				"isMetaMask" => markers.is_metamask = true,
				"isTrust" => markers.is_trust = true,
				"isPhantom" => markers.is_phantom = true,
				"isBitKeep" => markers.is_bitkeep = true,
				_ => {},
			}
		}
		markers
	}

	pub fn declares(&self, kind: AgentKind) -> bool {
		match kind {
			AgentKind::MetaMask => self.is_metamask,
			AgentKind::TrustWallet => self.is_trust,
			AgentKind::Phantom => self.is_phantom,
			AgentKind::Bitget => self.is_bitkeep,
		}
	}

	/// True when any marker other than `kind`'s own is declared.
	fn declares_other_than(&self, kind: AgentKind) -> bool {
		AgentKind::ALL
			.into_iter()
			.any(|other| other != kind && self.declares(other))
	}

	/// Whether a provider with these markers is a genuine candidate for `kind`.
	///
	/// MetaMask's marker is widely impersonated, so a provider declaring it
	/// alongside any competing marker is not MetaMask.
	pub fn identifies(&self, kind: AgentKind) -> bool {
		match kind {
			AgentKind::MetaMask => self.is_metamask && !self.declares_other_than(kind),
			_ => self.declares(kind),
		}
	}
}

/// A provider object found in the environment.
#[derive(Clone)]
pub struct InjectedProvider {
	/// Free-form label for logs.
	pub label: String,
	pub markers: ProviderMarkers,
	pub agent: Arc<dyn SigningAgent>,
}

impl fmt::Debug for InjectedProvider {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("InjectedProvider")
			.field("label", &self.label)
			.field("markers", &self.markers)
			.finish_non_exhaustive()
	}
}

/// Snapshot of everything injected into the host environment.
#[derive(Debug, Clone, Default)]
pub struct InjectionEnvironment {
	/// The shared single-provider slot.
	pub ethereum: Option<InjectedProvider>,
	/// The multi-provider list, in injection order. Empty means no list was
	/// injected.
	pub providers: Vec<InjectedProvider>,
	/// Wallet-specific slots.
	pub dedicated: HashMap<AgentKind, InjectedProvider>,
}

/// A provider resolved for one agent kind.
#[derive(Debug, Clone)]
pub struct CandidateProvider {
	pub kind: AgentKind,
	pub provider: InjectedProvider,
}

/// Resolves the provider for `kind`.
///
/// A wallet-specific slot wins when present (MetaMask has none). Otherwise a
/// multi-provider list, when injected, is the only place searched; the shared
/// slot is consulted only without one.
pub fn resolve_provider(env: &InjectionEnvironment, kind: AgentKind) -> Option<InjectedProvider> {
	if kind != AgentKind::MetaMask {
		if let Some(provider) = env.dedicated.get(&kind) {
			return Some(provider.clone());
		}
	}

	if env.providers.is_empty() {
		env.ethereum
			.as_ref()
			.filter(|p| p.markers.identifies(kind))
			.cloned()
	} else {
		env.providers
			.iter()
			.find(|p| p.markers.identifies(kind))
			.cloned()
	}
}

/// Lists one candidate per resolvable agent kind, in [`AgentKind::ALL`] order.
pub fn discover_providers(env: &InjectionEnvironment) -> Vec<CandidateProvider> {
	AgentKind::ALL
		.into_iter()
		.filter_map(|kind| {
			resolve_provider(env, kind).map(|provider| CandidateProvider { kind, provider })
		})
		.collect()
}
