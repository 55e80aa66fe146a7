//! Builders for configuration fixtures.

pub mod config;
