//! PostgreSQL store.
//!
//! Plain positional-bind queries; no ORM. Referential cascades (user →
//! owned services → assignments) are carried by the schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{RbacModel, RbacPermission, RbacRole, Service, User, UserRole};
use crate::store::{NewService, NewUser, ServicePatch, Store};
use crate::uuid::uuidv7;
use crate::{HubError, Result};

/// Store backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

type UserRow = (Uuid, Option<String>, Option<String>, String, DateTime<Utc>);

fn user_from_row(row: UserRow) -> Result<User> {
    Ok(User {
        id: row.0,
        email: row.1,
        password_hash: row.2,
        role: UserRole::from_db(&row.3)?,
        created_at: row.4,
    })
}

type ServiceRow = (
    Uuid,
    String,
    Option<String>,
    Option<Uuid>,
    Option<String>,
    Option<String>,
    DateTime<Utc>,
);

fn service_from_row(row: ServiceRow) -> Service {
    Service {
        id: row.0,
        name: row.1,
        description: row.2,
        owner_id: row.3,
        encrypted_secret: row.4,
        secret_preview: row.5,
        created_at: row.6,
    }
}

const SELECT_USER: &str =
    "SELECT id, email, password_hash, role, created_at FROM users";
const SELECT_SERVICE: &str = "SELECT id, name, description, owner_id, \
     encrypted_secret, secret_preview, created_at FROM services";

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, new: NewUser) -> Result<User> {
        let mut tx = self.pool.begin().await?;

        // Atomic ordinal: the UPDATE takes a row lock on the counter row, so
        // two concurrent registrations cannot both observe ordinal 1.
        let ordinal: i64 =
            sqlx::query_scalar("UPDATE user_counter SET n = n + 1 WHERE id RETURNING n")
                .fetch_one(&mut *tx)
                .await?;
        let role = if ordinal == 1 {
            UserRole::Admin
        } else {
            UserRole::User
        };

        let id = uuidv7();
        let created_at: DateTime<Utc> = sqlx::query_scalar(
            "INSERT INTO users (id, email, password_hash, role) \
             VALUES ($1, $2, $3, $4) RETURNING created_at",
        )
        .bind(id)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(role.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(User {
            id,
            email: new.email,
            password_hash: new.password_hash,
            role,
            created_at,
        })
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{SELECT_USER} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(user_from_row).transpose()
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{SELECT_USER} WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.map(user_from_row).transpose()
    }

    async fn update_user(
        &self,
        id: Uuid,
        email: Option<String>,
        role: Option<UserRole>,
    ) -> Result<User> {
        let mut tx = self.pool.begin().await?;

        // Demotions take the counter row lock so the admin count cannot
        // change between the check and the write.
        if role == Some(UserRole::User) {
            sqlx::query("UPDATE user_counter SET n = n WHERE id")
                .execute(&mut *tx)
                .await?;
            let current: Option<String> =
                sqlx::query_scalar("SELECT role FROM users WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if current.as_deref() == Some("admin") {
                let admins: i64 =
                    sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'admin'")
                        .fetch_one(&mut *tx)
                        .await?;
                if admins <= 1 {
                    return Err(HubError::LastAdmin);
                }
            }
        }

        let row = sqlx::query_as::<_, UserRow>(
            "UPDATE users SET \
                 email = COALESCE($2, email), \
                 role  = COALESCE($3, role) \
             WHERE id = $1 \
             RETURNING id, email, password_hash, role, created_at",
        )
        .bind(id)
        .bind(email)
        .bind(role.map(UserRole::as_str))
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| HubError::NotFound(format!("user {id}")))?;

        tx.commit().await?;
        user_from_row(row)
    }

    async fn delete_user(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // Same lock as update_user, so concurrent admin mutations serialize.
        sqlx::query("UPDATE user_counter SET n = n WHERE id")
            .execute(&mut *tx)
            .await?;
        let role: Option<String> = sqlx::query_scalar("SELECT role FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if role.as_deref() == Some("admin") {
            let admins: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'admin'")
                    .fetch_one(&mut *tx)
                    .await?;
            if admins <= 1 {
                return Err(HubError::LastAdmin);
            }
        }

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn count_users(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?)
    }

    async fn count_admins(&self) -> Result<i64> {
        Ok(
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'admin'")
                .fetch_one(&self.pool)
                .await?,
        )
    }

    async fn create_service(&self, new: NewService) -> Result<Service> {
        let id = uuidv7();
        let created_at: DateTime<Utc> = sqlx::query_scalar(
            "INSERT INTO services \
                 (id, name, description, owner_id, encrypted_secret, secret_preview) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING created_at",
        )
        .bind(id)
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.owner_id)
        .bind(&new.encrypted_secret)
        .bind(&new.secret_preview)
        .fetch_one(&self.pool)
        .await?;

        Ok(Service {
            id,
            name: new.name,
            description: new.description,
            owner_id: new.owner_id,
            encrypted_secret: Some(new.encrypted_secret),
            secret_preview: Some(new.secret_preview),
            created_at,
        })
    }

    async fn service_by_id(&self, id: Uuid) -> Result<Option<Service>> {
        let row = sqlx::query_as::<_, ServiceRow>(&format!("{SELECT_SERVICE} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(service_from_row))
    }

    async fn service_by_name(&self, name: &str) -> Result<Option<Service>> {
        let row = sqlx::query_as::<_, ServiceRow>(&format!(
            "{SELECT_SERVICE} WHERE name = $1 ORDER BY created_at LIMIT 1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(service_from_row))
    }

    async fn services_owned_by(&self, owner_id: Uuid) -> Result<Vec<Service>> {
        let rows = sqlx::query_as::<_, ServiceRow>(&format!(
            "{SELECT_SERVICE} WHERE owner_id = $1 ORDER BY created_at"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(service_from_row).collect())
    }

    async fn update_service_meta(&self, id: Uuid, patch: ServicePatch) -> Result<Service> {
        // Metadata columns only: the stored secret is untouchable here.
        let row = sqlx::query_as::<_, ServiceRow>(
            "UPDATE services SET \
                 name        = COALESCE($2, name), \
                 description = COALESCE($3, description) \
             WHERE id = $1 \
             RETURNING id, name, description, owner_id, \
                       encrypted_secret, secret_preview, created_at",
        )
        .bind(id)
        .bind(patch.name)
        .bind(patch.description)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| HubError::NotFound(format!("service {id}")))?;
        Ok(service_from_row(row))
    }

    async fn replace_service_secret(
        &self,
        id: Uuid,
        encrypted_secret: &str,
        secret_preview: &str,
    ) -> Result<()> {
        let updated = sqlx::query(
            "UPDATE services SET encrypted_secret = $2, secret_preview = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(encrypted_secret)
        .bind(secret_preview)
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(HubError::NotFound(format!("service {id}")));
        }
        Ok(())
    }

    async fn create_rbac_model(
        &self,
        name: &str,
        description: Option<&str>,
        created_by: Option<Uuid>,
    ) -> Result<RbacModel> {
        let id = uuidv7();
        let created_at: DateTime<Utc> = sqlx::query_scalar(
            "INSERT INTO rbac_models (id, name, description, created_by) \
             VALUES ($1, $2, $3, $4) RETURNING created_at",
        )
        .bind(id)
        .bind(name)
        .bind(description)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(RbacModel {
            id,
            name: name.to_string(),
            description: description.map(str::to_string),
            created_by,
            created_at,
        })
    }

    async fn rbac_model_by_id(&self, id: Uuid) -> Result<Option<RbacModel>> {
        let row = sqlx::query_as::<_, (Uuid, String, Option<String>, Option<Uuid>, DateTime<Utc>)>(
            "SELECT id, name, description, created_by, created_at \
             FROM rbac_models WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, name, description, created_by, created_at)| RbacModel {
            id,
            name,
            description,
            created_by,
            created_at,
        }))
    }

    async fn create_role(
        &self,
        model_id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> Result<RbacRole> {
        let id = uuidv7();
        sqlx::query(
            "INSERT INTO rbac_roles (id, model_id, name, description) VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(model_id)
        .bind(name)
        .bind(description)
        .execute(&self.pool)
        .await?;

        Ok(RbacRole {
            id,
            model_id,
            name: name.to_string(),
            description: description.map(str::to_string),
        })
    }

    async fn role_by_id(&self, id: Uuid) -> Result<Option<RbacRole>> {
        let row = sqlx::query_as::<_, (Uuid, Uuid, String, Option<String>)>(
            "SELECT id, model_id, name, description FROM rbac_roles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, model_id, name, description)| RbacRole {
            id,
            model_id,
            name,
            description,
        }))
    }

    async fn roles_for_model(&self, model_id: Uuid) -> Result<Vec<RbacRole>> {
        let rows = sqlx::query_as::<_, (Uuid, Uuid, String, Option<String>)>(
            "SELECT id, model_id, name, description FROM rbac_roles \
             WHERE model_id = $1 ORDER BY id",
        )
        .bind(model_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, model_id, name, description)| RbacRole {
                id,
                model_id,
                name,
                description,
            })
            .collect())
    }

    async fn create_permission(
        &self,
        model_id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> Result<RbacPermission> {
        let id = uuidv7();
        sqlx::query(
            "INSERT INTO rbac_permissions (id, model_id, name, description) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(model_id)
        .bind(name)
        .bind(description)
        .execute(&self.pool)
        .await?;

        Ok(RbacPermission {
            id,
            model_id,
            name: name.to_string(),
            description: description.map(str::to_string),
        })
    }

    async fn add_role_permission(&self, role_id: Uuid, permission_id: Uuid) -> Result<()> {
        sqlx::query(
            "INSERT INTO role_permissions (role_id, permission_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(role_id)
        .bind(permission_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn permissions_for_role(&self, role_id: Uuid) -> Result<Vec<RbacPermission>> {
        let rows = sqlx::query_as::<_, (Uuid, Uuid, String, Option<String>)>(
            "SELECT p.id, p.model_id, p.name, p.description \
             FROM rbac_permissions p \
             JOIN role_permissions rp ON rp.permission_id = p.id \
             WHERE rp.role_id = $1 ORDER BY p.id",
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, model_id, name, description)| RbacPermission {
                id,
                model_id,
                name,
                description,
            })
            .collect())
    }

    async fn assign_service_model(&self, service_id: Uuid, model_id: Uuid) -> Result<()> {
        sqlx::query(
            "INSERT INTO service_rbac_models (service_id, model_id) VALUES ($1, $2) \
             ON CONFLICT (service_id) DO UPDATE SET model_id = EXCLUDED.model_id",
        )
        .bind(service_id)
        .bind(model_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn service_model(&self, service_id: Uuid) -> Result<Option<Uuid>> {
        Ok(sqlx::query_scalar(
            "SELECT model_id FROM service_rbac_models WHERE service_id = $1",
        )
        .bind(service_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn upsert_user_service_role(
        &self,
        user_id: Uuid,
        service_id: Uuid,
        role_id: Uuid,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_service_roles (user_id, service_id, role_id) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, service_id) DO UPDATE SET role_id = EXCLUDED.role_id",
        )
        .bind(user_id)
        .bind(service_id)
        .bind(role_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn user_service_role(
        &self,
        user_id: Uuid,
        service_id: Uuid,
    ) -> Result<Option<Uuid>> {
        Ok(sqlx::query_scalar(
            "SELECT role_id FROM user_service_roles WHERE user_id = $1 AND service_id = $2",
        )
        .bind(user_id)
        .bind(service_id)
        .fetch_optional(&self.pool)
        .await?)
    }
}
