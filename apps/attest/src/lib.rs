//! # Attest application library
//!
//! The HTTP API, CLI, configuration and remote backends of the `attest`
//! binary. Exposed as a library so integration tests can drive the router
//! directly.

pub mod api;
pub mod backends;
pub mod cli;
pub mod config;
