//! Pluggable authentication strategies.
//!
//! Each method is a [`AuthStrategy`]: `validate` rejects malformed input
//! before any side effect, `authenticate` performs the method-specific
//! check and/or provisioning. Strategies share one [`Credentials`] shape
//! and one [`AuthResult`](crate::models::AuthResult) contract so the
//! orchestrator never special-cases a method.

pub mod anonymous;
pub mod password;
pub mod registry;

pub use registry::StrategyRegistry;

use async_trait::async_trait;
use uuid::Uuid;

use crate::Result;
use crate::models::AuthResult;
use crate::store::Store;

/// Structured credentials produced by `validate`. Fields are populated per
/// method; untouched fields stay `None`.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub identifier: Option<Uuid>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// One authentication method.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Stable method identifier used for dispatch.
    fn method_id(&self) -> &'static str;

    /// Human-readable label for discovery metadata.
    fn label(&self) -> &'static str;

    /// Reject malformed input before any side effect. Failures name the
    /// offending field.
    fn validate(&self, raw: &serde_json::Value) -> Result<Credentials>;

    /// Perform the method-specific check and/or provisioning.
    async fn authenticate(&self, store: &dyn Store, creds: Credentials) -> Result<AuthResult>;
}
