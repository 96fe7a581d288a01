//! Service registration and secret lifecycle handlers.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use authhub_core::models::{Service, UserRole};
use authhub_core::services;
use authhub_core::store::ServicePatch;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: Option<Uuid>,
    pub secret_preview: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Present only on registration and rotation; never retrievable again.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

impl ServiceResponse {
    fn from_service(service: Service, secret: Option<String>) -> Self {
        Self {
            id: service.id,
            name: service.name,
            description: service.description,
            owner_id: service.owner_id,
            secret_preview: service.secret_preview,
            created_at: service.created_at,
            secret,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterServiceRequest {
    pub name: String,
    pub description: Option<String>,
}

/// `POST /services` — register a service owned by the bearer. The response
/// carries the plaintext secret exactly once.
pub async fn register_handler(
    State(state): State<AppState>,
    Extension(bearer): Extension<AuthenticatedUser>,
    Json(body): Json<RegisterServiceRequest>,
) -> AppResult<Json<ServiceResponse>> {
    let owner_id: Uuid = bearer
        .0
        .sub
        .parse()
        .map_err(|_| AppError::Unauthorized("Invalid token subject".into()))?;

    let registered = services::register(
        state.store.as_ref(),
        &state.vault,
        &body.name,
        body.description.as_deref(),
        Some(owner_id),
    )
    .await?;

    Ok(Json(ServiceResponse::from_service(
        registered.service,
        Some(registered.secret),
    )))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateServiceRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Owner or admin may manage a service.
async fn authorize_service(
    state: &AppState,
    bearer: &AuthenticatedUser,
    service_id: Uuid,
) -> AppResult<()> {
    let service = state
        .store
        .service_by_id(service_id)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::NotFound(format!("service {service_id}")))?;

    if bearer.0.role == UserRole::Admin {
        return Ok(());
    }
    let caller: Option<Uuid> = bearer.0.sub.parse().ok();
    if caller.is_some() && service.owner_id == caller {
        return Ok(());
    }
    Err(AppError::Forbidden("not the service owner".into()))
}

/// `PATCH /services/{id}` — update display metadata. The stored secret is
/// structurally out of reach of this path.
pub async fn update_handler(
    State(state): State<AppState>,
    Path(service_id): Path<Uuid>,
    Extension(bearer): Extension<AuthenticatedUser>,
    Json(body): Json<UpdateServiceRequest>,
) -> AppResult<Json<ServiceResponse>> {
    authorize_service(&state, &bearer, service_id).await?;
    let service = services::update_metadata(
        state.store.as_ref(),
        service_id,
        ServicePatch {
            name: body.name,
            description: body.description,
        },
    )
    .await?;
    Ok(Json(ServiceResponse::from_service(service, None)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RotateResponse {
    /// The fresh plaintext secret, shown exactly once.
    pub secret: String,
}

/// `POST /services/{id}/rotate` — replace the signing secret.
pub async fn rotate_handler(
    State(state): State<AppState>,
    Path(service_id): Path<Uuid>,
    Extension(bearer): Extension<AuthenticatedUser>,
) -> AppResult<Json<RotateResponse>> {
    authorize_service(&state, &bearer, service_id).await?;
    let secret =
        services::rotate_secret(state.store.as_ref(), &state.vault, service_id).await?;
    Ok(Json(RotateResponse { secret }))
}
