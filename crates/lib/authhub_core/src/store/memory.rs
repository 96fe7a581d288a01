//! In-memory store for tests and demos.
//!
//! All state sits behind one mutex, which also makes the first-admin
//! decision trivially atomic.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{RbacModel, RbacPermission, RbacRole, Service, User, UserRole};
use crate::store::{NewService, NewUser, ServicePatch, Store};
use crate::uuid::uuidv7;
use crate::{HubError, Result};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    services: HashMap<Uuid, Service>,
    models: HashMap<Uuid, RbacModel>,
    roles: HashMap<Uuid, RbacRole>,
    permissions: HashMap<Uuid, RbacPermission>,
    role_permissions: HashSet<(Uuid, Uuid)>,
    service_models: HashMap<Uuid, Uuid>,
    user_service_roles: HashMap<(Uuid, Uuid), Uuid>,
    users_created: u64,
}

/// Hermetic [`Store`] implementation.
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_by_id<T: Clone>(map: impl Iterator<Item = (Uuid, T)>) -> Vec<T> {
    let mut rows: Vec<(Uuid, T)> = map.collect();
    rows.sort_by_key(|(id, _)| *id);
    rows.into_iter().map(|(_, v)| v).collect()
}

#[async_trait]
impl Store for MemStore {
    async fn create_user(&self, new: NewUser) -> Result<User> {
        let mut inner = self.inner.lock().await;

        if let Some(email) = &new.email
            && inner
                .users
                .values()
                .any(|u| u.email.as_deref() == Some(email.as_str()))
        {
            return Err(HubError::validation("email", "email already registered"));
        }

        inner.users_created += 1;
        let role = if inner.users_created == 1 {
            UserRole::Admin
        } else {
            UserRole::User
        };

        let user = User {
            id: uuidv7(),
            email: new.email,
            password_hash: new.password_hash,
            role,
            created_at: Utc::now(),
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.inner.lock().await.users.get(&id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .inner
            .lock()
            .await
            .users
            .values()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }

    async fn update_user(
        &self,
        id: Uuid,
        email: Option<String>,
        role: Option<UserRole>,
    ) -> Result<User> {
        let mut inner = self.inner.lock().await;

        if let Some(email) = &email
            && inner
                .users
                .values()
                .any(|u| u.id != id && u.email.as_deref() == Some(email.as_str()))
        {
            return Err(HubError::validation("email", "email already registered"));
        }

        // The demotion decision happens under the same lock as the write.
        if role == Some(UserRole::User)
            && inner.users.get(&id).is_some_and(|u| u.role == UserRole::Admin)
            && inner
                .users
                .values()
                .filter(|u| u.role == UserRole::Admin)
                .count()
                <= 1
        {
            return Err(HubError::LastAdmin);
        }

        let user = inner
            .users
            .get_mut(&id)
            .ok_or_else(|| HubError::NotFound(format!("user {id}")))?;
        if let Some(email) = email {
            user.email = Some(email);
        }
        if let Some(role) = role {
            user.role = role;
        }
        Ok(user.clone())
    }

    async fn delete_user(&self, id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().await;

        if let Some(user) = inner.users.get(&id)
            && user.role == UserRole::Admin
            && inner
                .users
                .values()
                .filter(|u| u.role == UserRole::Admin)
                .count()
                <= 1
        {
            return Err(HubError::LastAdmin);
        }
        inner.users.remove(&id);

        // Cascade: owned services, then everything hanging off them.
        let owned: Vec<Uuid> = inner
            .services
            .values()
            .filter(|s| s.owner_id == Some(id))
            .map(|s| s.id)
            .collect();
        for sid in owned {
            inner.services.remove(&sid);
            inner.service_models.remove(&sid);
            inner.user_service_roles.retain(|(_, s), _| *s != sid);
        }
        inner.user_service_roles.retain(|(u, _), _| *u != id);
        Ok(())
    }

    async fn count_users(&self) -> Result<i64> {
        Ok(self.inner.lock().await.users.len() as i64)
    }

    async fn count_admins(&self) -> Result<i64> {
        Ok(self
            .inner
            .lock()
            .await
            .users
            .values()
            .filter(|u| u.role == UserRole::Admin)
            .count() as i64)
    }

    async fn create_service(&self, new: NewService) -> Result<Service> {
        let mut inner = self.inner.lock().await;
        let service = Service {
            id: uuidv7(),
            name: new.name,
            description: new.description,
            owner_id: new.owner_id,
            encrypted_secret: Some(new.encrypted_secret),
            secret_preview: Some(new.secret_preview),
            created_at: Utc::now(),
        };
        inner.services.insert(service.id, service.clone());
        Ok(service)
    }

    async fn service_by_id(&self, id: Uuid) -> Result<Option<Service>> {
        Ok(self.inner.lock().await.services.get(&id).cloned())
    }

    async fn service_by_name(&self, name: &str) -> Result<Option<Service>> {
        let inner = self.inner.lock().await;
        let mut matching: Vec<&Service> =
            inner.services.values().filter(|s| s.name == name).collect();
        matching.sort_by_key(|s| s.id);
        Ok(matching.first().map(|s| (*s).clone()))
    }

    async fn services_owned_by(&self, owner_id: Uuid) -> Result<Vec<Service>> {
        let inner = self.inner.lock().await;
        Ok(sorted_by_id(
            inner
                .services
                .values()
                .filter(|s| s.owner_id == Some(owner_id))
                .map(|s| (s.id, s.clone())),
        ))
    }

    async fn update_service_meta(&self, id: Uuid, patch: ServicePatch) -> Result<Service> {
        let mut inner = self.inner.lock().await;
        let service = inner
            .services
            .get_mut(&id)
            .ok_or_else(|| HubError::NotFound(format!("service {id}")))?;
        if let Some(name) = patch.name {
            service.name = name;
        }
        if let Some(description) = patch.description {
            service.description = Some(description);
        }
        Ok(service.clone())
    }

    async fn replace_service_secret(
        &self,
        id: Uuid,
        encrypted_secret: &str,
        secret_preview: &str,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let service = inner
            .services
            .get_mut(&id)
            .ok_or_else(|| HubError::NotFound(format!("service {id}")))?;
        service.encrypted_secret = Some(encrypted_secret.to_string());
        service.secret_preview = Some(secret_preview.to_string());
        Ok(())
    }

    async fn create_rbac_model(
        &self,
        name: &str,
        description: Option<&str>,
        created_by: Option<Uuid>,
    ) -> Result<RbacModel> {
        let mut inner = self.inner.lock().await;
        let model = RbacModel {
            id: uuidv7(),
            name: name.to_string(),
            description: description.map(str::to_string),
            created_by,
            created_at: Utc::now(),
        };
        inner.models.insert(model.id, model.clone());
        Ok(model)
    }

    async fn rbac_model_by_id(&self, id: Uuid) -> Result<Option<RbacModel>> {
        Ok(self.inner.lock().await.models.get(&id).cloned())
    }

    async fn create_role(
        &self,
        model_id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> Result<RbacRole> {
        let mut inner = self.inner.lock().await;
        let role = RbacRole {
            id: uuidv7(),
            model_id,
            name: name.to_string(),
            description: description.map(str::to_string),
        };
        inner.roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn role_by_id(&self, id: Uuid) -> Result<Option<RbacRole>> {
        Ok(self.inner.lock().await.roles.get(&id).cloned())
    }

    async fn roles_for_model(&self, model_id: Uuid) -> Result<Vec<RbacRole>> {
        let inner = self.inner.lock().await;
        Ok(sorted_by_id(
            inner
                .roles
                .values()
                .filter(|r| r.model_id == model_id)
                .map(|r| (r.id, r.clone())),
        ))
    }

    async fn create_permission(
        &self,
        model_id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> Result<RbacPermission> {
        let mut inner = self.inner.lock().await;
        let permission = RbacPermission {
            id: uuidv7(),
            model_id,
            name: name.to_string(),
            description: description.map(str::to_string),
        };
        inner.permissions.insert(permission.id, permission.clone());
        Ok(permission)
    }

    async fn add_role_permission(&self, role_id: Uuid, permission_id: Uuid) -> Result<()> {
        self.inner
            .lock()
            .await
            .role_permissions
            .insert((role_id, permission_id));
        Ok(())
    }

    async fn permissions_for_role(&self, role_id: Uuid) -> Result<Vec<RbacPermission>> {
        let inner = self.inner.lock().await;
        let mut perms: Vec<RbacPermission> = inner
            .role_permissions
            .iter()
            .filter(|(r, _)| *r == role_id)
            .filter_map(|(_, p)| inner.permissions.get(p).cloned())
            .collect();
        perms.sort_by_key(|p| p.id);
        Ok(perms)
    }

    async fn assign_service_model(&self, service_id: Uuid, model_id: Uuid) -> Result<()> {
        self.inner
            .lock()
            .await
            .service_models
            .insert(service_id, model_id);
        Ok(())
    }

    async fn service_model(&self, service_id: Uuid) -> Result<Option<Uuid>> {
        Ok(self
            .inner
            .lock()
            .await
            .service_models
            .get(&service_id)
            .copied())
    }

    async fn upsert_user_service_role(
        &self,
        user_id: Uuid,
        service_id: Uuid,
        role_id: Uuid,
    ) -> Result<()> {
        self.inner
            .lock()
            .await
            .user_service_roles
            .insert((user_id, service_id), role_id);
        Ok(())
    }

    async fn user_service_role(
        &self,
        user_id: Uuid,
        service_id: Uuid,
    ) -> Result<Option<Uuid>> {
        Ok(self
            .inner
            .lock()
            .await
            .user_service_roles
            .get(&(user_id, service_id))
            .copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_user_becomes_admin() {
        let store = MemStore::new();
        let first = store.create_user(NewUser::default()).await.unwrap();
        let second = store.create_user(NewUser::default()).await.unwrap();
        assert_eq!(first.role, UserRole::Admin);
        assert_eq!(second.role, UserRole::User);
    }

    #[tokio::test]
    async fn first_admin_survives_deletion_of_first_user() {
        // The admin decision counts creations, not current rows: deleting
        // the first user must not make the next registration admin.
        let store = MemStore::new();
        let first = store.create_user(NewUser::default()).await.unwrap();
        let second = store.create_user(NewUser::default()).await.unwrap();
        store
            .update_user(second.id, None, Some(UserRole::Admin))
            .await
            .unwrap();
        store.delete_user(first.id).await.unwrap();
        let next = store.create_user(NewUser::default()).await.unwrap();
        assert_eq!(next.role, UserRole::User);
    }

    #[tokio::test]
    async fn store_refuses_to_demote_or_delete_last_admin() {
        let store = MemStore::new();
        let admin = store.create_user(NewUser::default()).await.unwrap();
        assert_eq!(admin.role, UserRole::Admin);

        let err = store.delete_user(admin.id).await.unwrap_err();
        assert!(matches!(err, HubError::LastAdmin));

        let err = store
            .update_user(admin.id, None, Some(UserRole::User))
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::LastAdmin));

        let reloaded = store.user_by_id(admin.id).await.unwrap().unwrap();
        assert_eq!(reloaded.role, UserRole::Admin);
    }

    #[tokio::test]
    async fn concurrent_demotions_leave_one_admin_standing() {
        let store = std::sync::Arc::new(MemStore::new());
        let a = store.create_user(NewUser::default()).await.unwrap();
        let b = store.create_user(NewUser::default()).await.unwrap();
        store
            .update_user(b.id, None, Some(UserRole::Admin))
            .await
            .unwrap();

        let (ra, rb) = tokio::join!(
            store.update_user(a.id, None, Some(UserRole::User)),
            store.update_user(b.id, None, Some(UserRole::User)),
        );

        // Exactly one demotion wins; the other is rejected.
        assert_eq!(
            [ra.is_ok(), rb.is_ok()].iter().filter(|ok| **ok).count(),
            1
        );
        assert_eq!(store.count_admins().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_email_rejected() {
        let store = MemStore::new();
        store
            .create_user(NewUser {
                email: Some("a@example.com".into()),
                password_hash: None,
            })
            .await
            .unwrap();
        let err = store
            .create_user(NewUser {
                email: Some("a@example.com".into()),
                password_hash: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::Validation { field: "email", .. }));
    }

    #[tokio::test]
    async fn user_service_role_upserts() {
        let store = MemStore::new();
        let user = uuidv7();
        let service = uuidv7();
        let (a, b) = (uuidv7(), uuidv7());
        store.upsert_user_service_role(user, service, a).await.unwrap();
        store.upsert_user_service_role(user, service, b).await.unwrap();
        assert_eq!(store.user_service_role(user, service).await.unwrap(), Some(b));
    }

    #[tokio::test]
    async fn deleting_user_cascades_to_owned_services() {
        let store = MemStore::new();
        let _admin = store.create_user(NewUser::default()).await.unwrap();
        let user = store.create_user(NewUser::default()).await.unwrap();
        let service = store
            .create_service(NewService {
                name: "owned".into(),
                description: None,
                owner_id: Some(user.id),
                encrypted_secret: "blob".into(),
                secret_preview: "pre".into(),
            })
            .await
            .unwrap();
        store.delete_user(user.id).await.unwrap();
        assert!(store.service_by_id(service.id).await.unwrap().is_none());
    }
}
