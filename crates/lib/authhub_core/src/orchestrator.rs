//! Authentication orchestrator.
//!
//! The single entry point into the engine: dispatch to a strategy, validate,
//! authenticate, run the post-auth hooks, issue a token. Every step before
//! the hooks is a hard failure point; hook failures are caught and logged.

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, warn};
use uuid::Uuid;

use crate::hooks::{HookContext, PostAuthHook, default_hooks};
use crate::models::{AuthMethodInfo, PublicUser};
use crate::strategy::StrategyRegistry;
use crate::store::Store;
use crate::token::CredentialIssuer;
use crate::vault::SecretVault;
use crate::{HubError, Result};

/// What a successful authentication returns.
#[derive(Debug)]
pub struct AuthOutcome {
    pub token: String,
    pub user: PublicUser,
}

/// The authentication hub.
pub struct AuthHub {
    store: Arc<dyn Store>,
    vault: Arc<SecretVault>,
    registry: StrategyRegistry,
    issuer: CredentialIssuer,
    hooks: Vec<Box<dyn PostAuthHook>>,
}

impl AuthHub {
    pub fn new(store: Arc<dyn Store>, vault: Arc<SecretVault>, global_secret: String) -> Self {
        let issuer = CredentialIssuer::new(store.clone(), vault.clone(), global_secret);
        Self {
            store,
            vault,
            registry: StrategyRegistry::with_defaults(),
            issuer,
            hooks: default_hooks(),
        }
    }

    /// Replace the hook list (used by tests and embedders).
    pub fn with_hooks(mut self, hooks: Vec<Box<dyn PostAuthHook>>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn issuer(&self) -> &CredentialIssuer {
        &self.issuer
    }

    /// Discovery metadata for every known method, placeholders included.
    pub fn list_methods(&self) -> Vec<AuthMethodInfo> {
        self.registry.list_metadata()
    }

    /// Authenticate via the named method and issue a token, optionally
    /// scoped to a service.
    pub async fn authenticate(
        &self,
        method_id: &str,
        raw_credentials: &Value,
        service_id: Option<Uuid>,
    ) -> Result<AuthOutcome> {
        let strategy = match self.registry.get(method_id) {
            Some(strategy) => strategy,
            None if self.registry.is_placeholder(method_id) => {
                return Err(HubError::UnsupportedMethod(method_id.to_string()));
            }
            None => return Err(HubError::UnknownMethod(method_id.to_string())),
        };

        let credentials = strategy.validate(raw_credentials)?;
        let auth = strategy.authenticate(self.store.as_ref(), credentials).await?;

        // Reload the full record; a miss here means the store lied to us.
        let user = self.store.user_by_id(auth.user_id).await?.ok_or_else(|| {
            error!(user_id = %auth.user_id, method = method_id, "authenticated user missing from store");
            HubError::Inconsistency("authenticated user missing from store".into())
        })?;

        // Best-effort hooks: provisioning conveniences, never login blockers.
        let ctx = HookContext {
            store: self.store.as_ref(),
            vault: &self.vault,
            user: &user,
            auth: &auth,
        };
        for hook in &self.hooks {
            if let Err(err) = hook.run(&ctx).await {
                warn!(hook = hook.name(), error = %err, "post-auth hook failed");
            }
        }

        let token = self.issuer.issue(&user, service_id).await?;
        Ok(AuthOutcome {
            token,
            user: user.sanitized(),
        })
    }
}
