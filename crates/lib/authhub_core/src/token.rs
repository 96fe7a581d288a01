//! Token issuance and verification.
//!
//! Tokens are HS256 JWTs with a fixed 7-day expiry. Hub-scoped tokens are
//! signed with the global secret; service-scoped tokens with the service's
//! decrypted per-service secret, and carry the RBAC snapshot computed at
//! issuance time. A service can therefore verify its own tokens offline
//! while only the hub can mint them.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use crate::models::{TokenClaims, User};
use crate::rbac::RbacResolver;
use crate::store::Store;
use crate::vault::SecretVault;
use crate::{HubError, Result};

/// Token lifetime: 7 days.
const TOKEN_EXPIRY_DAYS: i64 = 7;

/// Verify a token against a signing secret, returning claims on success.
/// Expired, forged and malformed tokens are indistinguishable (`None`).
pub fn verify_with_secret(token: &str, secret: &[u8]) -> Option<TokenClaims> {
    let key = DecodingKey::from_secret(secret);
    let mut validation = Validation::default();
    validation.validate_exp = true;
    decode::<TokenClaims>(token, &key, &validation)
        .ok()
        .map(|data| data.claims)
}

/// Resolve the global signing secret: env var `JWT_SECRET` →
/// `AUTHHUB_SECRET` → persisted file (generated on first use).
pub fn resolve_global_secret() -> String {
    if let Ok(secret) = std::env::var("JWT_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    if let Ok(secret) = std::env::var("AUTHHUB_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    // Generate and persist
    let secret_path = global_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(&secret_path, &secret);
    info!(path = %secret_path.display(), "generated new global signing secret");
    secret
}

/// Path to the persisted global secret file.
fn global_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("authhub")
        .join("global-secret")
}

/// Mints and verifies signed credentials.
pub struct CredentialIssuer {
    store: Arc<dyn Store>,
    vault: Arc<SecretVault>,
    resolver: RbacResolver,
    global_secret: String,
}

impl CredentialIssuer {
    pub fn new(store: Arc<dyn Store>, vault: Arc<SecretVault>, global_secret: String) -> Self {
        let resolver = RbacResolver::new(store.clone());
        Self {
            store,
            vault,
            resolver,
            global_secret,
        }
    }

    pub fn resolver(&self) -> &RbacResolver {
        &self.resolver
    }

    /// Decrypt the stored signing secret for a service.
    async fn service_secret(&self, service_id: Uuid) -> Result<String> {
        let service = self
            .store
            .service_by_id(service_id)
            .await?
            .ok_or_else(|| HubError::InvalidService(format!("{service_id}")))?;
        let encrypted = service.encrypted_secret.as_deref().ok_or_else(|| {
            HubError::InvalidService(format!("{service_id} has no secret configured"))
        })?;
        self.vault.decrypt(encrypted)
    }

    /// Issue a token for the user, optionally scoped to a service.
    pub async fn issue(&self, user: &User, service_id: Option<Uuid>) -> Result<String> {
        let now = Utc::now();
        let mut claims = TokenClaims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role,
            rbac_role: None,
            permissions: None,
            rbac_model: None,
            exp: (now + Duration::days(TOKEN_EXPIRY_DAYS)).timestamp(),
            iat: now.timestamp(),
        };

        let key = match service_id {
            None => EncodingKey::from_secret(self.global_secret.as_bytes()),
            Some(service_id) => {
                let secret = self.service_secret(service_id).await?;
                // All-null is fine here: no model assigned, or no role held.
                let snapshot = self.resolver.resolve(user.id, service_id).await?;
                claims.rbac_role = snapshot.role;
                claims.permissions = Some(snapshot.permissions);
                claims.rbac_model = snapshot.rbac_model;
                EncodingKey::from_secret(secret.as_bytes())
            }
        };

        encode(&Header::default(), &claims, &key)
            .map_err(|e| HubError::Internal(format!("jwt encode: {e}")))
    }

    /// Verify a token with the global signing key.
    pub fn verify_global(&self, token: &str) -> Result<TokenClaims> {
        verify_with_secret(token, self.global_secret.as_bytes()).ok_or(HubError::InvalidToken)
    }

    /// Verify a service-scoped token on behalf of a service.
    ///
    /// The caller-supplied secret must match the decrypted stored secret
    /// before the token is even parsed, so one service cannot probe
    /// another's tokens. Every failure is the uniform `InvalidToken`.
    pub async fn verify_for_service(
        &self,
        token: &str,
        service_id: Uuid,
        caller_secret: &str,
    ) -> Result<TokenClaims> {
        let secret = self.service_secret(service_id).await?;
        if !digests_match(secret.as_bytes(), caller_secret.as_bytes()) {
            return Err(HubError::InvalidToken);
        }
        verify_with_secret(token, secret.as_bytes()).ok_or(HubError::InvalidToken)
    }
}

/// Compare two secrets by SHA-256 digest so the comparison cost does not
/// depend on where the inputs diverge.
fn digests_match(a: &[u8], b: &[u8]) -> bool {
    Sha256::digest(a) == Sha256::digest(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;
    use crate::store::{MemStore, NewService, NewUser};

    fn issuer_for(store: Arc<MemStore>, vault: Arc<SecretVault>) -> CredentialIssuer {
        CredentialIssuer::new(store, vault, "global-test-secret".into())
    }

    async fn seed_user(store: &MemStore) -> User {
        store.create_user(NewUser::default()).await.unwrap()
    }

    async fn seed_service(store: &MemStore, vault: &SecretVault, secret: &str) -> Uuid {
        store
            .create_service(NewService {
                name: "svc".into(),
                description: None,
                owner_id: None,
                encrypted_secret: vault.encrypt(secret).unwrap(),
                secret_preview: "pre".into(),
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn global_token_round_trips_without_rbac_fields() {
        let store = Arc::new(MemStore::new());
        let vault = Arc::new(SecretVault::new("master"));
        let issuer = issuer_for(store.clone(), vault);
        let user = seed_user(&store).await;

        let token = issuer.issue(&user, None).await.unwrap();
        let claims = issuer.verify_global(&token).unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.role, UserRole::Admin);
        assert!(claims.rbac_role.is_none());
        assert!(claims.permissions.is_none());
        assert!(claims.rbac_model.is_none());
    }

    #[tokio::test]
    async fn service_token_verifies_with_correct_secret_only() {
        let store = Arc::new(MemStore::new());
        let vault = Arc::new(SecretVault::new("master"));
        let service_id = seed_service(&store, &vault, "per-service-secret").await;
        let issuer = issuer_for(store.clone(), vault);
        let user = seed_user(&store).await;

        let token = issuer.issue(&user, Some(service_id)).await.unwrap();

        let claims = issuer
            .verify_for_service(&token, service_id, "per-service-secret")
            .await
            .unwrap();
        assert_eq!(claims.sub, user.id.to_string());

        let err = issuer
            .verify_for_service(&token, service_id, "wrong-secret")
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::InvalidToken));
    }

    #[tokio::test]
    async fn service_token_without_model_carries_null_snapshot() {
        let store = Arc::new(MemStore::new());
        let vault = Arc::new(SecretVault::new("master"));
        let service_id = seed_service(&store, &vault, "s3cret").await;
        let issuer = issuer_for(store.clone(), vault);
        let user = seed_user(&store).await;

        let token = issuer.issue(&user, Some(service_id)).await.unwrap();
        let claims = issuer
            .verify_for_service(&token, service_id, "s3cret")
            .await
            .unwrap();
        assert!(claims.rbac_role.is_none());
        assert_eq!(claims.permissions, Some(Vec::new()));
        assert!(claims.rbac_model.is_none());
    }

    #[tokio::test]
    async fn service_token_embeds_permission_snapshot() {
        let store = Arc::new(MemStore::new());
        let vault = Arc::new(SecretVault::new("master"));
        let service_id = seed_service(&store, &vault, "s3cret").await;
        let issuer = issuer_for(store.clone(), vault);
        let user = seed_user(&store).await;

        let model = store.create_rbac_model("M", None, None).await.unwrap();
        let role = store.create_role(model.id, "editor", None).await.unwrap();
        let perm = store
            .create_permission(model.id, "docs:write", None)
            .await
            .unwrap();
        store.add_role_permission(role.id, perm.id).await.unwrap();
        store.assign_service_model(service_id, model.id).await.unwrap();
        store
            .upsert_user_service_role(user.id, service_id, role.id)
            .await
            .unwrap();

        let token = issuer.issue(&user, Some(service_id)).await.unwrap();
        let claims = issuer
            .verify_for_service(&token, service_id, "s3cret")
            .await
            .unwrap();

        assert_eq!(claims.rbac_role.unwrap().name, "editor");
        let permissions = claims.permissions.unwrap();
        assert_eq!(permissions.len(), 1);
        assert_eq!(permissions[0].id, perm.id);
        assert_eq!(permissions[0].name, "docs:write");
        assert_eq!(claims.rbac_model.unwrap().id, model.id);
    }

    #[tokio::test]
    async fn issuing_for_missing_service_is_invalid_service() {
        let store = Arc::new(MemStore::new());
        let vault = Arc::new(SecretVault::new("master"));
        let issuer = issuer_for(store.clone(), vault);
        let user = seed_user(&store).await;

        let err = issuer
            .issue(&user, Some(crate::uuid::uuidv7()))
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::InvalidService(_)));
    }

    #[test]
    fn garbage_token_fails_uniformly() {
        assert!(verify_with_secret("not-a-jwt", b"secret").is_none());
    }
}
