//! Registry trait for self-registering backend implementations.
//!
//! Every backend module exposes a zero-sized `Registry` type naming the
//! implementation (the key used in configuration files) and its factory function.

pub trait ImplementationRegistry {
	/// Name used to select this implementation in configuration.
	const NAME: &'static str;
	/// Factory function type for the component family.
	type Factory;

	fn factory() -> Self::Factory;
}
