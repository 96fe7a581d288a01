//! # authhub_core
//!
//! Core authentication and authorization engine for Authhub.
//!
//! The hub authenticates end users through pluggable strategies and issues
//! signed tokens that downstream services verify with their own (encrypted at
//! rest) signing secrets, carrying an RBAC permission snapshot computed at
//! issuance time.

pub mod error;
pub mod hooks;
pub mod migrate;
pub mod models;
pub mod orchestrator;
pub mod password;
pub mod rbac;
pub mod services;
pub mod store;
pub mod strategy;
pub mod token;
pub mod users;
pub mod uuid;
pub mod vault;

pub use error::{HubError, Result};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
