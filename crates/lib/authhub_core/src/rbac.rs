//! RBAC resolution.
//!
//! Walks Service → RbacModel → Role (for user) → Permissions to produce the
//! snapshot embedded in service-scoped tokens. Join rows are business
//! invariants, not storage guarantees, so dangling or cross-model references
//! degrade to a null role instead of failing the resolution.

use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::models::{
    ModelInfo, PermissionInfo, PermissionSnapshot, RbacPermission, RoleInfo,
};
use crate::store::Store;
use crate::{HubError, Result};

/// Role → permissions mapping for matrix/visualization consumers.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleMapping {
    pub role_id: Uuid,
    pub role_name: String,
    pub permissions: Vec<PermissionInfo>,
}

fn permission_info(p: RbacPermission) -> PermissionInfo {
    PermissionInfo {
        id: p.id,
        name: p.name,
        description: p.description,
    }
}

pub struct RbacResolver {
    store: Arc<dyn Store>,
}

impl RbacResolver {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Compute the permission snapshot for (user, service).
    ///
    /// All-null is a legitimate outcome (service has no model); a non-null
    /// model with a null role means the user simply has no role there.
    pub async fn resolve(&self, user_id: Uuid, service_id: Uuid) -> Result<PermissionSnapshot> {
        let Some(model_id) = self.store.service_model(service_id).await? else {
            return Ok(PermissionSnapshot::empty());
        };
        let Some(model) = self.store.rbac_model_by_id(model_id).await? else {
            warn!(%service_id, %model_id, "service references a missing RBAC model");
            return Ok(PermissionSnapshot::empty());
        };
        let model_info = ModelInfo {
            id: model.id,
            name: model.name,
        };

        let Some(role_id) = self.store.user_service_role(user_id, service_id).await? else {
            return Ok(PermissionSnapshot {
                role: None,
                permissions: Vec::new(),
                rbac_model: Some(model_info),
            });
        };

        let role = match self.store.role_by_id(role_id).await? {
            Some(role) if role.model_id == model_id => role,
            Some(_) => {
                // Assignment predates a model swap on this service.
                warn!(%user_id, %service_id, %role_id, "role assignment outside the service's current model");
                return Ok(PermissionSnapshot {
                    role: None,
                    permissions: Vec::new(),
                    rbac_model: Some(model_info),
                });
            }
            None => {
                warn!(%user_id, %service_id, %role_id, "role assignment points at a deleted role");
                return Ok(PermissionSnapshot {
                    role: None,
                    permissions: Vec::new(),
                    rbac_model: Some(model_info),
                });
            }
        };

        let permissions = self
            .store
            .permissions_for_role(role.id)
            .await?
            .into_iter()
            .map(permission_info)
            .collect();

        Ok(PermissionSnapshot {
            role: Some(RoleInfo {
                id: role.id,
                name: role.name,
                description: role.description,
            }),
            permissions,
            rbac_model: Some(model_info),
        })
    }

    /// Role → permissions for every role in a model, one entry per role even
    /// when a role currently has zero permissions.
    pub async fn mappings_for_model(&self, model_id: Uuid) -> Result<Vec<RoleMapping>> {
        if self.store.rbac_model_by_id(model_id).await?.is_none() {
            return Err(HubError::NotFound(format!("rbac model {model_id}")));
        }

        let mut mappings = Vec::new();
        for role in self.store.roles_for_model(model_id).await? {
            let permissions = self
                .store
                .permissions_for_role(role.id)
                .await?
                .into_iter()
                .map(permission_info)
                .collect();
            mappings.push(RoleMapping {
                role_id: role.id,
                role_name: role.name,
                permissions,
            });
        }
        Ok(mappings)
    }

    /// Assign a model to a service (upsert: replaces any previous model).
    pub async fn assign_model(&self, service_id: Uuid, model_id: Uuid) -> Result<()> {
        if self.store.service_by_id(service_id).await?.is_none() {
            return Err(HubError::NotFound(format!("service {service_id}")));
        }
        if self.store.rbac_model_by_id(model_id).await?.is_none() {
            return Err(HubError::NotFound(format!("rbac model {model_id}")));
        }
        self.store.assign_service_model(service_id, model_id).await
    }

    /// Assign a role to a user on a service.
    ///
    /// The role must belong to the model currently assigned to the service;
    /// storage does not enforce that, so it is checked here. Upserts, so a
    /// user holds at most one role per service.
    pub async fn assign_user_role(
        &self,
        user_id: Uuid,
        service_id: Uuid,
        role_id: Uuid,
    ) -> Result<()> {
        if self.store.user_by_id(user_id).await?.is_none() {
            return Err(HubError::NotFound(format!("user {user_id}")));
        }
        let role = self
            .store
            .role_by_id(role_id)
            .await?
            .ok_or_else(|| HubError::NotFound(format!("role {role_id}")))?;
        let model_id = self.store.service_model(service_id).await?.ok_or_else(|| {
            HubError::validation("roleId", "service has no RBAC model assigned")
        })?;
        if role.model_id != model_id {
            return Err(HubError::validation(
                "roleId",
                "role does not belong to the service's RBAC model",
            ));
        }
        self.store
            .upsert_user_service_role(user_id, service_id, role_id)
            .await
    }
}
