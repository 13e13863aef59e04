//! Integration tests for the DashScope client against an in-process HTTP
//! stub. The stub speaks just enough of the generation endpoint to exercise
//! request shape, auth forwarding, and status classification.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::sync::Mutex;

use wayfarer_core::upstream::{DashScopeClient, GenerationParams, TextGenerator, UpstreamError};

/// What the stub saw in the last request.
#[derive(Debug, Default)]
struct Seen {
    authorization: Option<String>,
    body: Option<Value>,
}

#[derive(Clone)]
struct StubState {
    seen: Arc<Mutex<Seen>>,
    /// Status and body to answer with.
    reply: Arc<(StatusCode, Value)>,
}

async fn generation_endpoint(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mut seen = state.seen.lock().await;
    seen.authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    seen.body = Some(body);

    let (status, reply) = &*state.reply;
    (*status, Json(reply.clone()))
}

/// Start the stub on an ephemeral port; returns its address and the
/// request recorder.
async fn start_stub(status: StatusCode, reply: Value) -> (SocketAddr, Arc<Mutex<Seen>>) {
    let seen = Arc::new(Mutex::new(Seen::default()));
    let state = StubState {
        seen: Arc::clone(&seen),
        reply: Arc::new((status, reply)),
    };

    let app = Router::new()
        .route("/aigc/text-generation/generation", post(generation_endpoint))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub listener");
    let addr = listener.local_addr().expect("stub local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub serve");
    });

    (addr, seen)
}

#[tokio::test]
async fn sends_expected_request_and_returns_envelope() {
    let envelope = json!({"output": {"text": "{\"name\":\"X\",\"schedule\":[]}"}});
    let (addr, seen) = start_stub(StatusCode::OK, envelope.clone()).await;

    let client = DashScopeClient::new(format!("http://{addr}"), "qwen-turbo").unwrap();
    let result = client
        .generate("sk-test-key", "plan me a trip", GenerationParams::PLAN)
        .await
        .expect("generation should succeed");

    assert_eq!(result, envelope);

    let seen = seen.lock().await;
    assert_eq!(seen.authorization.as_deref(), Some("Bearer sk-test-key"));

    let body = seen.body.as_ref().expect("stub should record the body");
    assert_eq!(body["model"], "qwen-turbo");
    assert_eq!(body["input"]["prompt"], "plan me a trip");
    assert_eq!(body["parameters"]["result_format"], "json");
    assert_eq!(body["parameters"]["max_tokens"], 4000);
}

#[tokio::test]
async fn probe_request_omits_result_format() {
    let (addr, seen) = start_stub(StatusCode::OK, json!({"output": {"text": "ok"}})).await;

    let client = DashScopeClient::new(format!("http://{addr}"), "qwen-turbo").unwrap();
    client
        .generate("sk-key", "ping", GenerationParams::KEY_PROBE)
        .await
        .expect("probe should succeed");

    let seen = seen.lock().await;
    let body = seen.body.as_ref().unwrap();
    assert!(body["parameters"].get("result_format").is_none());
    assert_eq!(body["parameters"]["max_tokens"], 10);
}

#[tokio::test]
async fn non_success_status_is_classified() {
    let (addr, _seen) = start_stub(
        StatusCode::UNAUTHORIZED,
        json!({"code": "InvalidApiKey", "message": "Invalid API-key provided."}),
    )
    .await;

    let client = DashScopeClient::new(format!("http://{addr}"), "qwen-turbo").unwrap();
    let err = client
        .generate("sk-bad", "hello", GenerationParams::PLAN)
        .await
        .unwrap_err();

    match err {
        UpstreamError::Status { status, body } => {
            assert_eq!(status, 401);
            assert!(body.contains("InvalidApiKey"), "body: {body}");
        }
        other => panic!("expected Status error, got {other:?}"),
    }
}

#[tokio::test]
async fn rate_limit_status_passes_through() {
    let (addr, _seen) = start_stub(
        StatusCode::TOO_MANY_REQUESTS,
        json!({"code": "Throttling"}),
    )
    .await;

    let client = DashScopeClient::new(format!("http://{addr}"), "qwen-turbo").unwrap();
    let err = client
        .generate("sk", "hello", GenerationParams::PLAN)
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), Some(429));
}

#[tokio::test]
async fn connection_refused_is_a_connect_error() {
    // Bind and immediately drop a listener so the port is closed.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = DashScopeClient::new(format!("http://{addr}"), "qwen-turbo").unwrap();
    let err = client
        .generate("sk", "hello", GenerationParams::PLAN)
        .await
        .unwrap_err();

    assert!(
        matches!(err, UpstreamError::Connect | UpstreamError::Transport(_)),
        "expected a connection-level error, got {err:?}"
    );
    assert_eq!(err.http_status(), None);
}
