//! RBAC request handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use authhub_core::models::PermissionSnapshot;
use authhub_core::rbac::{RbacResolver, RoleMapping};

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;

fn resolver(state: &AppState) -> RbacResolver {
    RbacResolver::new(state.store.clone())
}

/// `GET /rbac/users/{user_id}/services/{service_id}/permissions` — the
/// permission snapshot for a (user, service) pair.
pub async fn permissions_handler(
    State(state): State<AppState>,
    Path((user_id, service_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<PermissionSnapshot>> {
    let snapshot = resolver(&state).resolve(user_id, service_id).await?;
    Ok(Json(snapshot))
}

/// `GET /rbac/models/{model_id}/mappings` — role → permission matrix for a
/// model, one entry per role.
pub async fn mappings_handler(
    State(state): State<AppState>,
    Path(model_id): Path<Uuid>,
) -> AppResult<Json<Vec<RoleMapping>>> {
    let mappings = resolver(&state).mappings_for_model(model_id).await?;
    Ok(Json(mappings))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignModelRequest {
    pub model_id: Uuid,
}

/// `PUT /rbac/services/{service_id}/model` — assign (or replace) the
/// service's RBAC model. Admin only.
pub async fn assign_model_handler(
    State(state): State<AppState>,
    Path(service_id): Path<Uuid>,
    Extension(bearer): Extension<AuthenticatedUser>,
    Json(body): Json<AssignModelRequest>,
) -> AppResult<StatusCode> {
    bearer.require_admin()?;
    resolver(&state).assign_model(service_id, body.model_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRoleRequest {
    pub role_id: Uuid,
}

/// `PUT /rbac/users/{user_id}/services/{service_id}/role` — assign a role
/// to a user on a service. Admin only; upserts, so a user holds at most one
/// role per service.
pub async fn assign_role_handler(
    State(state): State<AppState>,
    Path((user_id, service_id)): Path<(Uuid, Uuid)>,
    Extension(bearer): Extension<AuthenticatedUser>,
    Json(body): Json<AssignRoleRequest>,
) -> AppResult<StatusCode> {
    bearer.require_admin()?;
    resolver(&state)
        .assign_user_role(user_id, service_id, body.role_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
