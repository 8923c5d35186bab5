//! Gateway integration tests: start a real server and talk to it over HTTP.
//!
//! Run with: `cargo test -p planloop-gateway --test integration`

use std::sync::Arc;

use serde_json::{Value, json};

use planloop_agent::{AuditSink, MarkdownAuditLog, NoAudit};
use planloop_core::config::{Config, GatewayConfig};
use planloop_providers::{ProviderError, ScriptedProvider};
use planloop_tools::ToolRegistry;

use planloop_gateway::GatewayState;

/// Find an available port.
fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Start a gateway backed by `provider` and return its base URL.
async fn start_test_gateway(provider: ScriptedProvider, audit: Arc<dyn AuditSink>) -> String {
    let port = find_free_port();
    let config = Config {
        gateway: Some(GatewayConfig {
            port,
            bind: Some("127.0.0.1".into()),
        }),
        ..Config::default()
    };

    let state = Arc::new(GatewayState::new(
        Arc::new(config),
        Arc::new(provider),
        Arc::new(ToolRegistry::builtin()),
        audit,
    ));

    tokio::spawn(async move {
        let _ = planloop_gateway::start_gateway(state, port).await;
    });

    let base = format!("http://127.0.0.1:{port}");
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if reqwest::get(format!("{base}/health")).await.is_ok() {
            break;
        }
    }
    base
}

fn moon_script() -> ScriptedProvider {
    ScriptedProvider::new()
        .with_text("Answer directly.")
        .with_text(r#"{"_thoughts": "simple", "tool": "final_answer"}"#)
        .with_text("About 384,400 km.")
}

async fn ask(base: &str, body: Value) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(format!("{base}/"))
        .json(&body)
        .send()
        .await
        .expect("request failed");
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn test_health_endpoint() {
    let base = start_test_gateway(ScriptedProvider::new(), Arc::new(NoAudit)).await;

    let resp = reqwest::get(format!("{base}/health")).await.unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_ask_returns_final_answer() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("log.md");
    let base = start_test_gateway(moon_script(), Arc::new(MarkdownAuditLog::new(&log_path))).await;

    let (status, body) = ask(&base, json!({"messages": "How far is the Moon from Earth?"})).await;

    assert_eq!(status, 200);
    assert_eq!(
        body,
        json!({"response": "About 384,400 km.", "truncated": false, "steps": 1, "actions": 0})
    );

    let log = std::fs::read_to_string(&log_path).unwrap();
    assert!(log.starts_with("## Planning"));
    assert!(log.contains("#### Final Answer"));
}

#[tokio::test]
async fn test_empty_query_is_rejected() {
    let base = start_test_gateway(moon_script(), Arc::new(NoAudit)).await;

    let (status, body) = ask(&base, json!({"messages": "   "})).await;

    assert_eq!(status, 400);
    assert_eq!(body["kind"], "invalid_request");
    assert!(body["stage"].is_null());
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let base = start_test_gateway(moon_script(), Arc::new(NoAudit)).await;

    let (status, body) = ask(&base, json!({"query": "wrong field"})).await;

    assert_eq!(status, 400);
    assert_eq!(body["kind"], "invalid_request");
}

#[tokio::test]
async fn test_provider_failure_is_bad_gateway() {
    let provider = ScriptedProvider::new().with_error(ProviderError::Overloaded { attempts: 3 });
    let base = start_test_gateway(provider, Arc::new(NoAudit)).await;

    let (status, body) = ask(&base, json!({"messages": "q"})).await;

    assert_eq!(status, 502);
    assert_eq!(body["kind"], "completion");
    assert_eq!(body["stage"], "plan");
}

#[tokio::test]
async fn test_undecodable_decision_is_server_error() {
    let provider = ScriptedProvider::new()
        .with_text("plan")
        .with_text("no json here");
    let base = start_test_gateway(provider, Arc::new(NoAudit)).await;

    let (status, body) = ask(&base, json!({"messages": "q"})).await;

    assert_eq!(status, 500);
    assert_eq!(body["kind"], "decode");
    assert_eq!(body["stage"], "decide");
}
