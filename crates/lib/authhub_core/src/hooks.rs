//! Post-authentication hooks.
//!
//! Provisioning conveniences that run after a successful authenticate and
//! before token issuance. They are best-effort: the orchestrator catches and
//! logs each failure, so a provisioning hiccup never blocks a login. New
//! hooks slot into the list without touching the orchestrator.

use async_trait::async_trait;
use tracing::info;

use crate::Result;
use crate::models::{AuthResult, User, UserRole};
use crate::services;
use crate::store::Store;
use crate::vault::SecretVault;

/// Name of the process-wide singleton hub service.
pub const HUB_SERVICE_NAME: &str = "hub";

/// Context passed to each hook.
pub struct HookContext<'a> {
    pub store: &'a dyn Store,
    pub vault: &'a SecretVault,
    pub user: &'a User,
    pub auth: &'a AuthResult,
}

/// One independent post-authentication action.
#[async_trait]
pub trait PostAuthHook: Send + Sync {
    /// Hook identifier for logging.
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: &HookContext<'_>) -> Result<()>;
}

/// The built-in hook list, in execution order.
pub fn default_hooks() -> Vec<Box<dyn PostAuthHook>> {
    vec![
        Box::new(DefaultServicesHook),
        Box::new(HubServiceHook),
        Box::new(SeedRbacHook),
    ]
}

/// Provisions a starter service for users that own none.
pub struct DefaultServicesHook;

#[async_trait]
impl PostAuthHook for DefaultServicesHook {
    fn name(&self) -> &'static str {
        "default_services"
    }

    async fn run(&self, ctx: &HookContext<'_>) -> Result<()> {
        if !ctx.store.services_owned_by(ctx.user.id).await?.is_empty() {
            return Ok(());
        }
        let registered = services::register(
            ctx.store,
            ctx.vault,
            "My first service",
            Some("Starter service provisioned at first login"),
            Some(ctx.user.id),
        )
        .await?;
        info!(user_id = %ctx.user.id, service_id = %registered.service.id, "provisioned starter service");
        Ok(())
    }
}

/// Ensures the singleton hub service exists.
pub struct HubServiceHook;

#[async_trait]
impl PostAuthHook for HubServiceHook {
    fn name(&self) -> &'static str {
        "hub_service"
    }

    async fn run(&self, ctx: &HookContext<'_>) -> Result<()> {
        if ctx.store.service_by_name(HUB_SERVICE_NAME).await?.is_some() {
            return Ok(());
        }
        let registered = services::register(
            ctx.store,
            ctx.vault,
            HUB_SERVICE_NAME,
            Some("The authentication hub itself"),
            None,
        )
        .await?;
        info!(service_id = %registered.service.id, "provisioned hub service");
        Ok(())
    }
}

/// Seeds a default RBAC model when the first admin comes into existence.
pub struct SeedRbacHook;

#[async_trait]
impl PostAuthHook for SeedRbacHook {
    fn name(&self) -> &'static str {
        "seed_rbac"
    }

    async fn run(&self, ctx: &HookContext<'_>) -> Result<()> {
        // Only the login that created the very first admin seeds defaults.
        if !(ctx.auth.is_new_user && ctx.user.role == UserRole::Admin) {
            return Ok(());
        }

        let model = ctx
            .store
            .create_rbac_model(
                "Default",
                Some("Starter role/permission taxonomy"),
                Some(ctx.user.id),
            )
            .await?;

        let admin = ctx
            .store
            .create_role(model.id, "admin", Some("Full access"))
            .await?;
        let member = ctx
            .store
            .create_role(model.id, "member", Some("Read-only access"))
            .await?;

        let read = ctx
            .store
            .create_permission(model.id, "service:read", Some("Read service data"))
            .await?;
        let write = ctx
            .store
            .create_permission(model.id, "service:write", Some("Modify service data"))
            .await?;

        ctx.store.add_role_permission(admin.id, read.id).await?;
        ctx.store.add_role_permission(admin.id, write.id).await?;
        ctx.store.add_role_permission(member.id, read.id).await?;

        info!(model_id = %model.id, "seeded default RBAC model");
        Ok(())
    }
}
