//! dotsci service library.
//!
//! Wires configuration into a publication orchestrator and exposes the
//! command-line surface of the `dotsci` binary.

pub mod cli;
pub mod factory_registry;

pub use factory_registry::build_orchestrator_from_config;
