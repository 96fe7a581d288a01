//! Anonymous-identifier login.
//!
//! With no identifier, a brand-new user is provisioned under a freshly
//! generated UUID. With an identifier that resolves, the login succeeds as
//! that user. An identifier that does not resolve is rejected: the hub never
//! provisions users at caller-chosen identifiers, so identifiers stay
//! server-generated and unguessable.

use async_trait::async_trait;
use tracing::info;

use crate::models::AuthResult;
use crate::store::{NewUser, Store};
use crate::strategy::{AuthStrategy, Credentials};
use crate::{HubError, Result};

/// Method id for anonymous-identifier login.
pub const METHOD_ID: &str = "anonymous";

pub struct AnonymousStrategy;

#[async_trait]
impl AuthStrategy for AnonymousStrategy {
    fn method_id(&self) -> &'static str {
        METHOD_ID
    }

    fn label(&self) -> &'static str {
        "Anonymous identifier"
    }

    fn validate(&self, raw: &serde_json::Value) -> Result<Credentials> {
        let identifier = match raw.get("identifier") {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => Some(s.parse().map_err(|_| {
                HubError::validation("identifier", "not a valid UUID")
            })?),
            Some(_) => {
                return Err(HubError::validation("identifier", "must be a string"));
            }
        };
        Ok(Credentials {
            identifier,
            ..Credentials::default()
        })
    }

    async fn authenticate(&self, store: &dyn Store, creds: Credentials) -> Result<AuthResult> {
        match creds.identifier {
            Some(id) => {
                let user = store
                    .user_by_id(id)
                    .await?
                    .ok_or_else(|| HubError::NotFound(format!("user {id}")))?;
                Ok(AuthResult {
                    user_id: user.id,
                    email: user.email,
                    role: user.role,
                    is_new_user: false,
                })
            }
            None => {
                let user = store.create_user(NewUser::default()).await?;
                info!(user_id = %user.id, role = user.role.as_str(), "provisioned anonymous user");
                Ok(AuthResult {
                    user_id: user.id,
                    email: None,
                    role: user.role,
                    is_new_user: true,
                })
            }
        }
    }
}
