//! State tracking for publication attempts.

pub mod publication;

pub use publication::{PublicationStateMachine, StateError};
