//! Anthropic provider tests against a local mock of the Messages API.
//!
//! Run with: `cargo test -p planloop-providers --test integration`

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};

use planloop_providers::{
    AnthropicProvider, ApiKey, CompletionGateway, CompletionRequest, ProviderError, RetryPolicy,
};

#[derive(Default)]
struct MockApi {
    script: Mutex<VecDeque<(u16, Value)>>,
    hits: AtomicU32,
    last_headers: Mutex<Option<HeaderMap>>,
    last_body: Mutex<Option<Value>>,
}

async fn messages_handler(
    State(api): State<Arc<MockApi>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    api.hits.fetch_add(1, Ordering::SeqCst);
    *api.last_headers.lock().unwrap() = Some(headers);
    *api.last_body.lock().unwrap() = Some(body);
    let (status, reply) = api
        .script
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or((500, json!({"error": "script exhausted"})));
    (StatusCode::from_u16(status).unwrap(), Json(reply))
}

/// Start a mock API with the given (status, body) script and return its base URL.
async fn start_mock(script: Vec<(u16, Value)>) -> (Arc<MockApi>, String) {
    let api = Arc::new(MockApi {
        script: Mutex::new(VecDeque::from(script)),
        ..MockApi::default()
    });

    let app = Router::new()
        .route("/v1/messages", post(messages_handler))
        .with_state(api.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (api, format!("http://{addr}"))
}

fn overloaded() -> (u16, Value) {
    (
        529,
        json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}),
    )
}

fn success(text: &str) -> (u16, Value) {
    (
        200,
        json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": text}],
            "stop_reason": "end_turn",
        }),
    )
}

fn provider(base_url: &str, attempts: u32) -> AnthropicProvider {
    AnthropicProvider::new(ApiKey::new("sk-test"), Some(base_url))
        .with_retry(RetryPolicy::new(attempts, Duration::from_millis(5)))
}

fn request() -> CompletionRequest {
    CompletionRequest::single_prompt("claude-3-5-sonnet-20241022", "How far is the Moon?", 1000, Some(0.7))
}

#[tokio::test]
async fn test_retries_overload_then_returns_success() {
    let (api, base) = start_mock(vec![overloaded(), overloaded(), success("384,400 km")]).await;

    let reply = provider(&base, 3).complete(&request()).await.unwrap();

    assert_eq!(api.hits.load(Ordering::SeqCst), 3);
    assert_eq!(reply.0["content"][0]["text"], "384,400 km");
}

#[tokio::test]
async fn test_overload_exhaustion_after_exact_attempts() {
    let (api, base) = start_mock(vec![overloaded(), overloaded(), overloaded(), success("late")]).await;

    let err = provider(&base, 3).complete(&request()).await.unwrap_err();

    assert!(
        matches!(err, ProviderError::Overloaded { attempts: 3 }),
        "unexpected error: {err}"
    );
    assert_eq!(api.hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_client_error_fails_without_retry() {
    let (api, base) = start_mock(vec![
        (401, json!({"type": "error", "error": {"type": "authentication_error"}})),
        success("unused"),
    ])
    .await;

    let err = provider(&base, 3).complete(&request()).await.unwrap_err();

    assert!(matches!(err, ProviderError::Status { status: 401, .. }));
    assert_eq!(api.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_wire_contract_headers_and_body() {
    let (api, base) = start_mock(vec![success("ok")]).await;

    provider(&base, 1).complete(&request()).await.unwrap();

    let headers = api.last_headers.lock().unwrap().clone().unwrap();
    assert_eq!(headers["x-api-key"], "sk-test");
    assert_eq!(headers["anthropic-version"], "2023-06-01");

    let body = api.last_body.lock().unwrap().clone().unwrap();
    assert_eq!(body["model"], "claude-3-5-sonnet-20241022");
    assert_eq!(body["max_tokens"], 1000);
    assert_eq!(body["temperature"], 0.7);
    assert_eq!(body["messages"][0]["role"], "user");
    assert_eq!(body["messages"][0]["content"], "How far is the Moon?");
}
