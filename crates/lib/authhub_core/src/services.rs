//! Service registration and secret lifecycle.
//!
//! A service's signing secret is generated here, shown to the caller exactly
//! once, and stored only encrypted. General metadata updates go through a
//! [`ServicePatch`](crate::store::ServicePatch) that carries no secret
//! field; only [`rotate_secret`] replaces it.

use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::info;
use uuid::Uuid;

use crate::models::Service;
use crate::store::{NewService, ServicePatch, Store};
use crate::vault::SecretVault;
use crate::{HubError, Result};

/// Generated secret length (alphanumeric chars).
const SECRET_LEN: usize = 48;

/// Characters of the secret kept in the non-secret preview.
const PREVIEW_LEN: usize = 8;

/// A freshly registered service plus its plaintext secret. The plaintext is
/// never persisted; this is the one chance to capture it.
#[derive(Debug)]
pub struct RegisteredService {
    pub service: Service,
    pub secret: String,
}

/// Generate a cryptographically random signing secret.
fn generate_secret() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(SECRET_LEN)
        .map(char::from)
        .collect()
}

fn preview_of(secret: &str) -> String {
    format!("{}…", &secret[..PREVIEW_LEN])
}

/// Register a service: generate a secret, encrypt it, store the blob.
pub async fn register(
    store: &dyn Store,
    vault: &SecretVault,
    name: &str,
    description: Option<&str>,
    owner_id: Option<Uuid>,
) -> Result<RegisteredService> {
    if name.trim().is_empty() {
        return Err(HubError::validation("name", "must not be empty"));
    }

    let secret = generate_secret();
    let encrypted_secret = vault.encrypt(&secret)?;

    let service = store
        .create_service(NewService {
            name: name.to_string(),
            description: description.map(str::to_string),
            owner_id,
            encrypted_secret,
            secret_preview: preview_of(&secret),
        })
        .await?;

    Ok(RegisteredService { service, secret })
}

/// Update display metadata. Structurally incapable of touching the secret.
pub async fn update_metadata(
    store: &dyn Store,
    service_id: Uuid,
    patch: ServicePatch,
) -> Result<Service> {
    store.update_service_meta(service_id, patch).await
}

/// Rotate the signing secret, returning the new plaintext exactly once.
/// Tokens signed with the previous secret stop verifying.
pub async fn rotate_secret(
    store: &dyn Store,
    vault: &SecretVault,
    service_id: Uuid,
) -> Result<String> {
    let secret = generate_secret();
    let encrypted = vault.encrypt(&secret)?;
    store
        .replace_service_secret(service_id, &encrypted, &preview_of(&secret))
        .await?;
    info!(%service_id, "rotated service signing secret");
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;

    #[tokio::test]
    async fn register_encrypts_and_previews_secret() {
        let store = MemStore::new();
        let vault = SecretVault::new("master");

        let registered = register(&store, &vault, "svc", None, None).await.unwrap();
        assert_eq!(registered.secret.len(), SECRET_LEN);

        let stored = store
            .service_by_id(registered.service.id)
            .await
            .unwrap()
            .unwrap();
        // stored blob decrypts back to the plaintext handed out once
        let blob = stored.encrypted_secret.unwrap();
        assert_ne!(blob, registered.secret);
        assert_eq!(vault.decrypt(&blob).unwrap(), registered.secret);
        assert!(registered.secret.starts_with(
            stored.secret_preview.unwrap().trim_end_matches('…')
        ));
    }

    #[tokio::test]
    async fn metadata_update_never_touches_secret() {
        let store = MemStore::new();
        let vault = SecretVault::new("master");
        let registered = register(&store, &vault, "svc", None, None).await.unwrap();
        let before = store
            .service_by_id(registered.service.id)
            .await
            .unwrap()
            .unwrap();

        update_metadata(
            &store,
            registered.service.id,
            ServicePatch {
                name: Some("renamed".into()),
                description: Some("new blurb".into()),
            },
        )
        .await
        .unwrap();

        let after = store
            .service_by_id(registered.service.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.name, "renamed");
        assert_eq!(after.encrypted_secret, before.encrypted_secret);
        assert_eq!(after.secret_preview, before.secret_preview);
    }

    #[tokio::test]
    async fn rotation_replaces_secret() {
        let store = MemStore::new();
        let vault = SecretVault::new("master");
        let registered = register(&store, &vault, "svc", None, None).await.unwrap();

        let new_secret = rotate_secret(&store, &vault, registered.service.id)
            .await
            .unwrap();
        assert_ne!(new_secret, registered.secret);

        let stored = store
            .service_by_id(registered.service.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            vault.decrypt(&stored.encrypted_secret.unwrap()).unwrap(),
            new_secret
        );
    }

    #[tokio::test]
    async fn empty_name_is_rejected() {
        let store = MemStore::new();
        let vault = SecretVault::new("master");
        let err = register(&store, &vault, "  ", None, None).await.unwrap_err();
        assert!(matches!(err, HubError::Validation { field: "name", .. }));
    }
}
