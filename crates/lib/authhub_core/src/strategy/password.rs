//! Email + password login.
//!
//! Every failure path (unknown email, no password set, hash mismatch)
//! reports the same generic `InvalidCredentials`, so callers cannot
//! enumerate registered emails.

use async_trait::async_trait;

use crate::models::AuthResult;
use crate::password::verify_password;
use crate::store::Store;
use crate::strategy::{AuthStrategy, Credentials};
use crate::{HubError, Result};

/// Method id for email/password login.
pub const METHOD_ID: &str = "password";

pub struct PasswordStrategy;

fn required_string(raw: &serde_json::Value, field: &'static str) -> Result<String> {
    match raw.get(field) {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(serde_json::Value::String(_)) => {
            Err(HubError::validation(field, "must not be empty"))
        }
        Some(_) => Err(HubError::validation(field, "must be a string")),
        None => Err(HubError::validation(field, "is required")),
    }
}

#[async_trait]
impl AuthStrategy for PasswordStrategy {
    fn method_id(&self) -> &'static str {
        METHOD_ID
    }

    fn label(&self) -> &'static str {
        "Email & password"
    }

    fn validate(&self, raw: &serde_json::Value) -> Result<Credentials> {
        let email = required_string(raw, "email")?;
        if !email.contains('@') {
            return Err(HubError::validation("email", "not a valid email address"));
        }
        let password = required_string(raw, "password")?;
        Ok(Credentials {
            email: Some(email),
            password: Some(password),
            ..Credentials::default()
        })
    }

    async fn authenticate(&self, store: &dyn Store, creds: Credentials) -> Result<AuthResult> {
        let (email, password) = match (&creds.email, &creds.password) {
            (Some(e), Some(p)) => (e, p),
            _ => return Err(HubError::InvalidCredentials),
        };

        let user = store
            .user_by_email(email)
            .await?
            .ok_or(HubError::InvalidCredentials)?;
        let hash = user
            .password_hash
            .as_deref()
            .ok_or(HubError::InvalidCredentials)?;
        if !verify_password(password, hash)? {
            return Err(HubError::InvalidCredentials);
        }

        Ok(AuthResult {
            user_id: user.id,
            email: user.email,
            role: user.role,
            is_new_user: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::hash_password;
    use crate::store::{MemStore, NewUser};
    use serde_json::json;

    async fn seed_user(store: &MemStore, email: &str, password: &str) {
        store
            .create_user(NewUser {
                email: Some(email.into()),
                password_hash: Some(hash_password(password).unwrap()),
            })
            .await
            .unwrap();
    }

    #[test]
    fn validate_names_offending_field() {
        let err = PasswordStrategy.validate(&json!({"password": "pw"})).unwrap_err();
        assert!(matches!(err, HubError::Validation { field: "email", .. }));

        let err = PasswordStrategy
            .validate(&json!({"email": "a@example.com"}))
            .unwrap_err();
        assert!(matches!(err, HubError::Validation { field: "password", .. }));

        let err = PasswordStrategy
            .validate(&json!({"email": "no-at-sign", "password": "pw"}))
            .unwrap_err();
        assert!(matches!(err, HubError::Validation { field: "email", .. }));
    }

    #[tokio::test]
    async fn correct_password_authenticates() {
        let store = MemStore::new();
        seed_user(&store, "a@example.com", "hunter22").await;

        let creds = PasswordStrategy
            .validate(&json!({"email": "a@example.com", "password": "hunter22"}))
            .unwrap();
        let result = PasswordStrategy.authenticate(&store, creds).await.unwrap();
        assert!(!result.is_new_user);
        assert_eq!(result.email.as_deref(), Some("a@example.com"));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_are_indistinguishable() {
        let store = MemStore::new();
        seed_user(&store, "a@example.com", "hunter22").await;

        let wrong_pw = PasswordStrategy
            .authenticate(
                &store,
                Credentials {
                    email: Some("a@example.com".into()),
                    password: Some("wrong".into()),
                    ..Credentials::default()
                },
            )
            .await
            .unwrap_err();
        let unknown = PasswordStrategy
            .authenticate(
                &store,
                Credentials {
                    email: Some("b@example.com".into()),
                    password: Some("hunter22".into()),
                    ..Credentials::default()
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(wrong_pw, HubError::InvalidCredentials));
        assert!(matches!(unknown, HubError::InvalidCredentials));
        assert_eq!(wrong_pw.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn user_without_password_cannot_password_login() {
        let store = MemStore::new();
        store
            .create_user(NewUser {
                email: Some("pwless@example.com".into()),
                password_hash: None,
            })
            .await
            .unwrap();

        let err = PasswordStrategy
            .authenticate(
                &store,
                Credentials {
                    email: Some("pwless@example.com".into()),
                    password: Some("anything".into()),
                    ..Credentials::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::InvalidCredentials));
    }
}
