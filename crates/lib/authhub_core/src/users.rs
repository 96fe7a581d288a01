//! Admin user management.
//!
//! Email/role edits and deletion, guarded by the invariant that at least one
//! admin account must exist at all times. The store enforces the invariant
//! atomically with the write; the checks here only fix the error ordering
//! (missing user reads as `NotFound` rather than `LastAdmin`).

use uuid::Uuid;

use crate::models::{PublicUser, User, UserRole};
use crate::store::Store;
use crate::{HubError, Result};

async fn load(store: &dyn Store, user_id: Uuid) -> Result<User> {
    store
        .user_by_id(user_id)
        .await?
        .ok_or_else(|| HubError::NotFound(format!("user {user_id}")))
}

/// Would removing admin rights from this user leave zero admins?
async fn is_last_admin(store: &dyn Store, user: &User) -> Result<bool> {
    Ok(user.role == UserRole::Admin && store.count_admins().await? <= 1)
}

/// Update a user's email and/or role.
pub async fn update(
    store: &dyn Store,
    user_id: Uuid,
    email: Option<String>,
    role: Option<UserRole>,
) -> Result<PublicUser> {
    if let Some(email) = &email
        && !email.contains('@')
    {
        return Err(HubError::validation("email", "not a valid email address"));
    }

    let user = load(store, user_id).await?;
    if role == Some(UserRole::User) && is_last_admin(store, &user).await? {
        return Err(HubError::LastAdmin);
    }

    let updated = store.update_user(user_id, email, role).await?;
    Ok(updated.sanitized())
}

/// Delete a user. Owned services cascade away with them.
pub async fn delete(store: &dyn Store, user_id: Uuid) -> Result<()> {
    let user = load(store, user_id).await?;
    if is_last_admin(store, &user).await? {
        return Err(HubError::LastAdmin);
    }
    store.delete_user(user_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemStore, NewUser};

    async fn seed(store: &MemStore) -> User {
        store.create_user(NewUser::default()).await.unwrap()
    }

    #[tokio::test]
    async fn demoting_last_admin_is_rejected() {
        let store = MemStore::new();
        let admin = seed(&store).await;
        assert_eq!(admin.role, UserRole::Admin);

        let err = update(&store, admin.id, None, Some(UserRole::User))
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::LastAdmin));

        // state unchanged
        let reloaded = store.user_by_id(admin.id).await.unwrap().unwrap();
        assert_eq!(reloaded.role, UserRole::Admin);
    }

    #[tokio::test]
    async fn deleting_last_admin_is_rejected() {
        let store = MemStore::new();
        let admin = seed(&store).await;

        let err = delete(&store, admin.id).await.unwrap_err();
        assert!(matches!(err, HubError::LastAdmin));
        assert!(store.user_by_id(admin.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn demotion_allowed_when_another_admin_exists() {
        let store = MemStore::new();
        let first = seed(&store).await;
        let second = seed(&store).await;
        store
            .update_user(second.id, None, Some(UserRole::Admin))
            .await
            .unwrap();

        let updated = update(&store, first.id, None, Some(UserRole::User))
            .await
            .unwrap();
        assert_eq!(updated.role, UserRole::User);
    }

    #[tokio::test]
    async fn non_admin_users_delete_freely() {
        let store = MemStore::new();
        let _admin = seed(&store).await;
        let user = seed(&store).await;

        delete(&store, user.id).await.unwrap();
        assert!(store.user_by_id(user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn email_update_validates_shape() {
        let store = MemStore::new();
        let admin = seed(&store).await;
        let err = update(&store, admin.id, Some("not-an-email".into()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::Validation { field: "email", .. }));
    }
}
