//! Domain models.
//!
//! These are internal domain models; the HTTP layer maps them onto its own
//! request/response shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Hub-level role tag carried by every user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    User,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::User => "user",
        }
    }

    /// Parse a role tag as stored in the database.
    pub fn from_db(tag: &str) -> crate::Result<Self> {
        match tag {
            "admin" => Ok(UserRole::Admin),
            "user" => Ok(UserRole::User),
            other => Err(crate::HubError::Inconsistency(format!(
                "unknown role tag in store: {other}"
            ))),
        }
    }
}

/// Domain user. Holds the password hash; never serialized outward as-is.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Sanitized view safe to return to callers (no password hash).
    pub fn sanitized(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
            created_at: self.created_at,
        }
    }
}

/// Outward-facing user view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub email: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

/// Registered downstream service.
#[derive(Debug, Clone)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// None for globally-shared services (e.g. the hub singleton).
    pub owner_id: Option<Uuid>,
    /// Vault blob; the plaintext secret is never persisted.
    pub encrypted_secret: Option<String>,
    /// Non-secret truncated preview for display.
    pub secret_preview: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Reusable named role/permission taxonomy.
#[derive(Debug, Clone)]
pub struct RbacModel {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Role within an RBAC model.
#[derive(Debug, Clone)]
pub struct RbacRole {
    pub id: Uuid,
    pub model_id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

/// Permission within an RBAC model. Names follow the "resource:action"
/// convention but that is not structurally enforced.
#[derive(Debug, Clone)]
pub struct RbacPermission {
    pub id: Uuid,
    pub model_id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

/// What every authentication strategy returns, regardless of method.
#[derive(Debug, Clone)]
pub struct AuthResult {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub role: UserRole,
    pub is_new_user: bool,
}

/// Role metadata embedded in snapshots and tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleInfo {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

/// Permission metadata embedded in snapshots and tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionInfo {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

/// RBAC model metadata embedded in snapshots and tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: Uuid,
    pub name: String,
}

/// Permission snapshot for a (user, service) pair, computed at issuance time.
///
/// `role` and `rbac_model` are independently nullable so callers can tell
/// "service has no model" from "model assigned but user has no role".
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionSnapshot {
    pub role: Option<RoleInfo>,
    pub permissions: Vec<PermissionInfo>,
    pub rbac_model: Option<ModelInfo>,
}

impl PermissionSnapshot {
    /// Snapshot for a service with no RBAC model assigned.
    pub fn empty() -> Self {
        Self {
            role: None,
            permissions: Vec::new(),
            rbac_model: None,
        }
    }
}

/// JWT claims minted by the credential issuer.
///
/// The RBAC fields are present only on service-scoped tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    /// Subject — user ID (standard JWT `sub` claim).
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: UserRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rbac_role: Option<RoleInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<PermissionInfo>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rbac_model: Option<ModelInfo>,
    /// Expiry (unix timestamp).
    pub exp: i64,
    /// Issued at (unix timestamp).
    pub iat: i64,
}

/// Discovery metadata for an authentication method.
///
/// Placeholder methods are declared capability only; the registry refuses to
/// execute them.
#[derive(Debug, Clone, Serialize)]
pub struct AuthMethodInfo {
    pub id: String,
    pub label: String,
    pub implemented: bool,
}
