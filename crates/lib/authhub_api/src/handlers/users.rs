//! Admin user-management handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use authhub_core::models::{PublicUser, UserRole};
use authhub_core::users;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;

/// `GET /users/{id}` — sanitized user view. Self or admin.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(bearer): Extension<AuthenticatedUser>,
) -> AppResult<Json<PublicUser>> {
    if bearer.0.sub != user_id.to_string() {
        bearer.require_admin()?;
    }
    let user = state
        .store
        .user_by_id(user_id)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::NotFound(format!("user {user_id}")))?;
    Ok(Json(user.sanitized()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub role: Option<UserRole>,
}

/// `PATCH /users/{id}` — edit email and/or role. Admin only; demoting the
/// last remaining admin is rejected.
pub async fn update_handler(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(bearer): Extension<AuthenticatedUser>,
    Json(body): Json<UpdateUserRequest>,
) -> AppResult<Json<PublicUser>> {
    bearer.require_admin()?;
    let updated = users::update(state.store.as_ref(), user_id, body.email, body.role).await?;
    Ok(Json(updated))
}

/// `DELETE /users/{id}` — delete a user and cascade their owned services.
/// Admin only; deleting the last remaining admin is rejected.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(bearer): Extension<AuthenticatedUser>,
) -> AppResult<StatusCode> {
    bearer.require_admin()?;
    users::delete(state.store.as_ref(), user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
