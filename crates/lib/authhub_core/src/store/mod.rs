//! Persistence interface.
//!
//! The engine is stateless; all state lives behind [`Store`]. Two
//! implementations: [`postgres::PgStore`] for production and
//! [`memory::MemStore`] for tests and demos.

pub mod memory;
pub mod postgres;

pub use memory::MemStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::Result;
use crate::models::{
    RbacModel, RbacPermission, RbacRole, Service, User, UserRole,
};

/// Fields for creating a user. The role tag is decided by the store: the
/// first user ever created is promoted to admin, atomically.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

/// Fields for registering a service. The secret arrives already encrypted.
#[derive(Debug, Clone)]
pub struct NewService {
    pub name: String,
    pub description: Option<String>,
    pub owner_id: Option<Uuid>,
    pub encrypted_secret: String,
    pub secret_preview: String,
}

/// Metadata-only patch for a service. Carries no secret field, so a general
/// update structurally cannot replace the stored encrypted secret.
#[derive(Debug, Clone, Default)]
pub struct ServicePatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Relational store consumed by the engine.
#[async_trait]
pub trait Store: Send + Sync {
    // -- users ------------------------------------------------------------

    /// Create a user. The first user ever created system-wide becomes admin;
    /// the decision must be atomic under concurrent callers.
    async fn create_user(&self, new: NewUser) -> Result<User>;
    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn user_by_email(&self, email: &str) -> Result<Option<User>>;
    /// Update email and/or role. Demoting the last remaining admin fails
    /// with `LastAdmin`; the admin count check and the write are one atomic
    /// step, so concurrent demotions cannot leave zero admins.
    async fn update_user(
        &self,
        id: Uuid,
        email: Option<String>,
        role: Option<UserRole>,
    ) -> Result<User>;
    /// Delete a user; owned services (and their RBAC assignments) cascade.
    /// Deleting the last remaining admin fails with `LastAdmin`, atomically
    /// as for [`update_user`](Store::update_user).
    async fn delete_user(&self, id: Uuid) -> Result<()>;
    async fn count_users(&self) -> Result<i64>;
    async fn count_admins(&self) -> Result<i64>;

    // -- services ---------------------------------------------------------

    async fn create_service(&self, new: NewService) -> Result<Service>;
    async fn service_by_id(&self, id: Uuid) -> Result<Option<Service>>;
    async fn service_by_name(&self, name: &str) -> Result<Option<Service>>;
    async fn services_owned_by(&self, owner_id: Uuid) -> Result<Vec<Service>>;
    async fn update_service_meta(&self, id: Uuid, patch: ServicePatch) -> Result<Service>;
    /// The only path that writes a service secret (rotation).
    async fn replace_service_secret(
        &self,
        id: Uuid,
        encrypted_secret: &str,
        secret_preview: &str,
    ) -> Result<()>;

    // -- rbac -------------------------------------------------------------

    async fn create_rbac_model(
        &self,
        name: &str,
        description: Option<&str>,
        created_by: Option<Uuid>,
    ) -> Result<RbacModel>;
    async fn rbac_model_by_id(&self, id: Uuid) -> Result<Option<RbacModel>>;
    async fn create_role(
        &self,
        model_id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> Result<RbacRole>;
    async fn role_by_id(&self, id: Uuid) -> Result<Option<RbacRole>>;
    async fn roles_for_model(&self, model_id: Uuid) -> Result<Vec<RbacRole>>;
    async fn create_permission(
        &self,
        model_id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> Result<RbacPermission>;
    async fn add_role_permission(&self, role_id: Uuid, permission_id: Uuid) -> Result<()>;
    async fn permissions_for_role(&self, role_id: Uuid) -> Result<Vec<RbacPermission>>;

    /// Upsert: a service holds at most one model; assigning replaces.
    async fn assign_service_model(&self, service_id: Uuid, model_id: Uuid) -> Result<()>;
    async fn service_model(&self, service_id: Uuid) -> Result<Option<Uuid>>;

    /// Upsert keyed on (user, service): at most one role per pair.
    async fn upsert_user_service_role(
        &self,
        user_id: Uuid,
        service_id: Uuid,
        role_id: Uuid,
    ) -> Result<()>;
    /// Role id assigned to the user on the service, if any.
    async fn user_service_role(&self, user_id: Uuid, service_id: Uuid)
    -> Result<Option<Uuid>>;
}
