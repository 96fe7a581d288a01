//! Integration test — build the router over an in-memory store and drive the
//! full login → service registration → scoped issuance → verification flow.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use authhub_api::{AppState, config::ApiConfig};
use authhub_core::store::{MemStore, Store};

fn test_state() -> (Arc<MemStore>, AppState) {
    let store = Arc::new(MemStore::new());
    let state = AppState::new(
        store.clone(),
        ApiConfig {
            bind_addr: "127.0.0.1:0".into(),
            database_url: "postgres://unused".into(),
            jwt_secret: "test-secret".into(),
            master_key: "test-master-key".into(),
        },
    );
    (store, state)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.expect("request");
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("parse JSON")
    };
    (status, json)
}

fn post_json(uri: &str, body: Value, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn login_anonymous(app: &Router) -> Value {
    let (status, body) = send(
        app,
        post_json("/auth/login", json!({"method": "anonymous", "credentials": {}}), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body
}

#[tokio::test]
async fn health_reports_connected_store() {
    let (_, state) = test_state();
    let app = authhub_api::router(state);

    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["dbConnected"], true);
}

#[tokio::test]
async fn first_login_is_admin_and_methods_are_discoverable() {
    let (_, state) = test_state();
    let app = authhub_api::router(state);

    let first = login_anonymous(&app).await;
    assert_eq!(first["user"]["role"], "admin");
    assert!(first["token"].as_str().is_some());

    let second = login_anonymous(&app).await;
    assert_eq!(second["user"]["role"], "user");

    let req = Request::builder()
        .uri("/auth/methods")
        .body(Body::empty())
        .unwrap();
    let (status, methods) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let methods = methods.as_array().unwrap();
    assert!(
        methods
            .iter()
            .any(|m| m["id"] == "password" && m["implemented"] == true)
    );
    assert!(
        methods
            .iter()
            .any(|m| m["id"] == "google" && m["implemented"] == false)
    );
}

#[tokio::test]
async fn placeholder_method_is_rejected() {
    let (_, state) = test_state();
    let app = authhub_api::router(state);

    let (status, body) = send(
        &app,
        post_json("/auth/login", json!({"method": "google", "credentials": {}}), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn service_registration_requires_auth() {
    let (_, state) = test_state();
    let app = authhub_api::router(state);

    let (status, _) = send(&app, post_json("/services", json!({"name": "svc"}), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn scoped_token_verifies_only_with_correct_secret() {
    let (store, state) = test_state();
    let app = authhub_api::router(state);

    let login = login_anonymous(&app).await;
    let token = login["token"].as_str().unwrap();
    let user_id = login["user"]["id"].as_str().unwrap();

    // Register a service; the plaintext secret appears exactly once here.
    let (status, registered) = send(
        &app,
        post_json(
            "/services",
            json!({"name": "widget-api", "description": "test service"}),
            Some(token),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let service_id = registered["id"].as_str().unwrap().to_string();
    let secret = registered["secret"].as_str().unwrap().to_string();

    // Log in again scoped to the service.
    let (status, scoped) = send(
        &app,
        post_json(
            "/auth/login",
            json!({
                "method": "anonymous",
                "credentials": {"identifier": user_id},
                "serviceId": service_id,
            }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let scoped_token = scoped["token"].as_str().unwrap();

    // Correct secret: valid, with a null RBAC snapshot (no model assigned).
    let (status, verdict) = send(
        &app,
        post_json(
            "/auth/verify",
            json!({"token": scoped_token, "serviceId": service_id, "secret": secret}),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verdict["valid"], true);
    assert_eq!(verdict["payload"]["sub"], user_id);
    assert_eq!(verdict["payload"]["permissions"], json!([]));

    // Wrong secret: uniformly invalid, without detail.
    let (status, verdict) = send(
        &app,
        post_json(
            "/auth/verify",
            json!({"token": scoped_token, "serviceId": service_id, "secret": "wrong"}),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verdict["valid"], false);
    assert!(verdict["payload"].is_null());

    // Metadata updates leave the stored secret untouched.
    let sid: uuid::Uuid = service_id.parse().unwrap();
    let before = store.service_by_id(sid).await.unwrap().unwrap();
    let (status, _) = send(
        &app,
        Request::builder()
            .method("PATCH")
            .uri(format!("/services/{service_id}"))
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::from(json!({"name": "renamed"}).to_string()))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let after = store.service_by_id(sid).await.unwrap().unwrap();
    assert_eq!(after.name, "renamed");
    assert_eq!(after.encrypted_secret, before.encrypted_secret);
}

#[tokio::test]
async fn last_admin_cannot_be_deleted() {
    let (_, state) = test_state();
    let app = authhub_api::router(state);

    let login = login_anonymous(&app).await;
    let token = login["token"].as_str().unwrap();
    let admin_id = login["user"]["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri(format!("/users/{admin_id}"))
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn non_admin_cannot_manage_users() {
    let (_, state) = test_state();
    let app = authhub_api::router(state);

    let admin = login_anonymous(&app).await;
    let plain = login_anonymous(&app).await;
    let plain_token = plain["token"].as_str().unwrap();
    let admin_id = admin["user"]["id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri(format!("/users/{admin_id}"))
            .header(header::AUTHORIZATION, format!("Bearer {plain_token}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
