//! Authentication request handlers.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use authhub_core::HubError;
use authhub_core::models::{AuthMethodInfo, PublicUser, TokenClaims};

use crate::AppState;
use crate::error::AppResult;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Method identifier, e.g. "anonymous" or "password".
    pub method: String,
    /// Raw method-specific credentials; validated by the strategy.
    #[serde(default)]
    pub credentials: serde_json::Value,
    /// Scope the issued token to a service.
    pub service_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user: PublicUser,
}

/// `POST /auth/login` — authenticate via a pluggable method.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let outcome = state
        .hub
        .authenticate(&body.method, &body.credentials, body.service_id)
        .await?;
    Ok(Json(LoginResponse {
        token: outcome.token,
        user: outcome.user,
    }))
}

/// `GET /auth/methods` — discovery metadata, placeholders included.
pub async fn methods_handler(State(state): State<AppState>) -> Json<Vec<AuthMethodInfo>> {
    Json(state.hub.list_methods())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub token: String,
    pub service_id: Uuid,
    /// Plaintext service secret; must match the stored one before the
    /// token is even parsed.
    pub secret: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<TokenClaims>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `POST /auth/verify` — verify a service-scoped token on behalf of a
/// service. Expired, forged and malformed all read the same.
pub async fn verify_handler(
    State(state): State<AppState>,
    Json(body): Json<VerifyRequest>,
) -> AppResult<Json<VerifyResponse>> {
    match state
        .hub
        .issuer()
        .verify_for_service(&body.token, body.service_id, &body.secret)
        .await
    {
        Ok(claims) => Ok(Json(VerifyResponse {
            valid: true,
            payload: Some(claims),
            error: None,
        })),
        Err(HubError::InvalidToken) => Ok(Json(VerifyResponse {
            valid: false,
            payload: None,
            error: Some("invalid token".into()),
        })),
        Err(other) => Err(other.into()),
    }
}
