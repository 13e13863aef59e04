//! Shared setup for router tests: a real Postgres test database, a scripted
//! text generator, and a minted session token for one seeded user.

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use wayfarer_core::token::{self, TokenConfig};
use wayfarer_db::models::User;
use wayfarer_db::queries::users;
use wayfarer_test_utils::{StubGenerator, create_test_db, drop_test_db};

use crate::config::Environment;

use super::{AppState, build_router};

pub struct TestApp {
    pub state: AppState,
    pub db_name: String,
    pub generator: Arc<StubGenerator>,
    pub user: User,
    pub token: String,
}

/// Spin up an app whose generator panics if called.
pub async fn spawn() -> TestApp {
    spawn_with(StubGenerator::unreachable()).await
}

/// Spin up an app with a scripted generator.
pub async fn spawn_with(stub: StubGenerator) -> TestApp {
    let (pool, db_name) = create_test_db().await;

    let email = format!("user-{}@example.com", Uuid::new_v4());
    let user = users::insert_user(&pool, "Test User", &email)
        .await
        .expect("seed user");

    let tokens = TokenConfig::new(b"router-test-secret-32-bytes-long".to_vec());
    let session_token = token::generate_token_with_ttl(&tokens, user.id, 1);

    let generator = Arc::new(stub);
    let state = AppState {
        pool,
        tokens,
        generator: generator.clone(),
        environment: Environment::Development,
    };

    TestApp {
        state,
        db_name,
        generator,
        user,
        token: session_token,
    }
}

pub async fn teardown(app: TestApp) {
    app.state.pool.close().await;
    drop_test_db(&app.db_name).await;
}

/// Send a request carrying the test user's session token.
pub async fn request(
    app: &TestApp,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> axum::response::Response {
    let bearer = format!("Bearer {}", app.token);
    send(app, method, uri, body, Some(&bearer)).await
}

/// Send a request with an explicit raw token value.
pub async fn request_with_token(
    app: &TestApp,
    method: &str,
    uri: &str,
    body: Option<Value>,
    raw_token: &str,
) -> axum::response::Response {
    let bearer = format!("Bearer {raw_token}");
    send(app, method, uri, body, Some(&bearer)).await
}

/// Send a request with no Authorization header.
pub async fn request_unauthed(
    app: &TestApp,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> axum::response::Response {
    send(app, method, uri, body, None).await
}

async fn send(
    app: &TestApp,
    method: &str,
    uri: &str,
    body: Option<Value>,
    authorization: Option<&str>,
) -> axum::response::Response {
    let router = build_router(app.state.clone());

    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(value) = authorization {
        builder = builder.header("authorization", value);
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    router.oneshot(request).await.unwrap()
}

pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1_048_576)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
