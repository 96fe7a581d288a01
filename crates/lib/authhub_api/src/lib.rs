//! # authhub_api
//!
//! HTTP API library for Authhub.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post, put};
use tower_http::cors::{Any, CorsLayer};

use authhub_core::orchestrator::AuthHub;
use authhub_core::store::Store;
use authhub_core::vault::SecretVault;

use crate::config::ApiConfig;
use crate::handlers::{auth, health, rbac, services, users};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Persistence backing the engine.
    pub store: Arc<dyn Store>,
    /// The authentication engine.
    pub hub: Arc<AuthHub>,
    /// Vault for service signing secrets.
    pub vault: Arc<SecretVault>,
    /// API configuration.
    pub config: ApiConfig,
}

impl AppState {
    /// Wire up state from config and a store.
    pub fn new(store: Arc<dyn Store>, config: ApiConfig) -> Self {
        let vault = Arc::new(SecretVault::new(&config.master_key));
        let hub = Arc::new(AuthHub::new(
            store.clone(),
            vault.clone(),
            config.jwt_secret.clone(),
        ));
        Self {
            store,
            hub,
            vault,
            config,
        }
    }
}

/// Run embedded database migrations.
///
/// Delegates to `authhub_core::migrate::migrate()` which owns the migration
/// files.
pub async fn migrate(pool: &sqlx::PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    authhub_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route("/health", get(health::health_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/methods", get(auth::methods_handler))
        .route("/auth/verify", post(auth::verify_handler));

    // Protected routes (require a hub-scoped bearer token)
    let protected = Router::new()
        .route("/services", post(services::register_handler))
        .route("/services/{id}", patch(services::update_handler))
        .route("/services/{id}/rotate", post(services::rotate_handler))
        .route(
            "/users/{id}",
            get(users::get_handler)
                .patch(users::update_handler)
                .delete(users::delete_handler),
        )
        .route(
            "/rbac/users/{user_id}/services/{service_id}/permissions",
            get(rbac::permissions_handler),
        )
        .route(
            "/rbac/users/{user_id}/services/{service_id}/role",
            put(rbac::assign_role_handler),
        )
        .route(
            "/rbac/services/{service_id}/model",
            put(rbac::assign_model_handler),
        )
        .route(
            "/rbac/models/{model_id}/mappings",
            get(rbac::mappings_handler),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(cors)
        .with_state(state)
}
