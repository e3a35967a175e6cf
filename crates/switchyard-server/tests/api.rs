//! HTTP API tests driving the router in-process with `oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use switchyard_mcp::{ProviderDescriptor, ProxyConfig, ToolProxy};
use switchyard_rank::{RankFuture, Ranker};
use switchyard_server::{AppState, Budgets, router};
use switchyard_types::{RankError, ToolDescriptor};
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Returns the candidates in reverse order, with the query recorded in the
/// first tool's description.
struct ReverseRanker;

impl Ranker for ReverseRanker {
    fn rank<'a>(&'a self, query: &'a str, candidates: &'a [ToolDescriptor]) -> RankFuture<'a> {
        Box::pin(async move {
            let mut picked: Vec<ToolDescriptor> = candidates.iter().rev().cloned().collect();
            if let Some(first) = picked.first_mut() {
                first.description = format!("picked for: {query}");
            }
            Ok(picked)
        })
    }

    fn name(&self) -> &str {
        "reverse"
    }
}

struct FailingRanker;

impl Ranker for FailingRanker {
    fn rank<'a>(&'a self, _query: &'a str, _candidates: &'a [ToolDescriptor]) -> RankFuture<'a> {
        Box::pin(async {
            Err(RankError::BadReply {
                backend: "failing".into(),
                message: "not a list".into(),
            })
        })
    }

    fn name(&self) -> &str {
        "failing"
    }
}

fn app(proxy: ToolProxy, ranker: Option<Arc<dyn Ranker>>) -> Router {
    router(AppState::new(proxy, ranker))
}

fn empty_proxy() -> ToolProxy {
    ToolProxy::new(ProxyConfig::default())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, body)
}

// ---------------------------------------------------------------------------
// Without providers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_answers_ok() {
    let app = app(empty_proxy(), None);
    let (status, body) = send(&app, get("/api/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("OK".into()));
}

#[tokio::test]
async fn empty_catalog_lists_no_tools() {
    let app = app(empty_proxy(), None);
    let (status, body) = send(&app, get("/api/v1/tools")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"recommendedTools": []}));
}

#[tokio::test]
async fn discover_requires_query() {
    let app = app(empty_proxy(), Some(Arc::new(ReverseRanker)));
    let (status, body) = send(&app, post_json("/api/v1/discover", json!({"query": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Query is required"));
}

#[tokio::test]
async fn discover_rejects_malformed_body() {
    let app = app(empty_proxy(), Some(Arc::new(ReverseRanker)));
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/discover")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn discover_without_ranker_is_unavailable() {
    let app = app(empty_proxy(), None);
    let (status, body) = send(&app, post_json("/api/v1/discover", json!({"query": "files"}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn discover_ranking_failure_is_bad_gateway() {
    let app = app(empty_proxy(), Some(Arc::new(FailingRanker)));
    let (status, body) = send(&app, post_json("/api/v1/discover", json!({"query": "files"}))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("not a list"));
}

#[tokio::test]
async fn unknown_tool_is_not_found() {
    let app = app(empty_proxy(), None);
    let (status, body) = send(
        &app,
        post_json("/api/v1/use/nope", json!({"arguments": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn cors_preflight_allows_any_origin() {
    let app = app(empty_proxy(), None);
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/v1/discover")
        .header(header::ORIGIN, "http://example.test")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert!(response.status().is_success());
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
    assert!(methods.contains("POST"));
}

#[tokio::test]
async fn refresh_after_shutdown_is_unavailable() {
    let proxy = empty_proxy();
    proxy.shutdown().await;
    let app = app(proxy, None);
    let (status, _) = send(&app, post_json("/api/v1/refresh", json!({}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

// ---------------------------------------------------------------------------
// With mock providers
// ---------------------------------------------------------------------------

/// Answers initialize and tools/list with `echo` and `hang`, fails `boom`,
/// never answers `hang` and echoes the arguments of every other call.
#[cfg(unix)]
const MOCK_PROVIDER: &str = r#"
while IFS= read -r line; do
  case "$line" in
    *'"method":"initialize"'*)
      echo '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{}}}' ;;
    *'"method":"tools/list"'*)
      echo '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"echo","description":"Echo"},{"name":"boom"},{"name":"hang"}]}}' ;;
    *'"name":"boom"'*)
      echo '{"jsonrpc":"2.0","id":3,"error":{"code":-32000,"message":"boom failed"}}' ;;
    *'"name":"hang"'*)
      : ;;
    *'"method":"tools/call"'*)
      echo '{"jsonrpc":"2.0","id":3,"result":{"content":[{"type":"text","text":"echoed"}]}}' ;;
  esac
done
"#;

#[cfg(unix)]
fn mock_config() -> ProxyConfig {
    ProxyConfig::default()
        .with_provider(
            "mock",
            ProviderDescriptor::new("sh", vec!["-c".to_string(), MOCK_PROVIDER.to_string()]),
        )
        .with_provider(
            "broken",
            ProviderDescriptor::new("sh", vec!["-c".to_string(), "read -r l; echo junk".into()]),
        )
}

#[cfg(unix)]
#[tokio::test]
async fn refresh_reports_connected_and_failed_providers() {
    let proxy = ToolProxy::new(mock_config());
    let app = app(proxy.clone(), None);

    let (status, body) = send(&app, post_json("/api/v1/refresh", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["connected"], json!(["mock"]));
    assert_eq!(body["tools"], 3);
    assert!(body["failed"]["broken"].is_string());

    let (_, listing) = send(&app, get("/api/v1/tools")).await;
    let tools = listing["recommendedTools"].as_array().unwrap();
    assert_eq!(tools.len(), 3);
    assert_eq!(tools[0]["serverName"], "mock");

    proxy.shutdown().await;
}

#[cfg(unix)]
#[tokio::test]
async fn use_routes_and_maps_tool_errors() {
    let proxy = ToolProxy::new(mock_config());
    proxy.rebuild_all().await.unwrap();
    let app = app(proxy.clone(), None);

    let (status, body) = send(
        &app,
        post_json("/api/v1/use/echo", json!({"arguments": {"text": "hi"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["content"][0]["text"], "echoed");

    // Missing arguments default to an empty object
    let (status, _) = send(&app, post_json("/api/v1/use/echo", json!({}))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, post_json("/api/v1/use/boom", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("boom failed"));

    // A tool error leaves the session usable
    let (status, _) = send(&app, post_json("/api/v1/use/echo", json!({}))).await;
    assert_eq!(status, StatusCode::OK);

    proxy.shutdown().await;
}

#[cfg(unix)]
#[tokio::test]
async fn call_budget_cancels_and_closes_session() {
    let proxy = ToolProxy::new(mock_config());
    proxy.rebuild_all().await.unwrap();
    let budgets = Budgets {
        call: Duration::from_millis(200),
        ..Budgets::default()
    };
    let app = router(AppState::new(proxy.clone(), None).with_budgets(budgets));

    let (status, body) = send(&app, post_json("/api/v1/use/hang", json!({}))).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert!(body["error"].as_str().unwrap().contains("budget"));

    // The cancelled session is closed until the next refresh
    let (status, _) = send(&app, post_json("/api/v1/use/echo", json!({}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _) = send(&app, post_json("/api/v1/refresh", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, post_json("/api/v1/use/echo", json!({}))).await;
    assert_eq!(status, StatusCode::OK);

    proxy.shutdown().await;
}

#[cfg(unix)]
#[tokio::test]
async fn discover_ranks_the_live_catalog() {
    let proxy = ToolProxy::new(mock_config());
    proxy.rebuild_all().await.unwrap();
    let app = app(proxy.clone(), Some(Arc::new(ReverseRanker)));

    let (status, body) = send(
        &app,
        post_json("/api/v1/discover", json!({"query": "say something"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let tools = body["recommendedTools"].as_array().unwrap();
    let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["hang", "echo", "boom"]);
    assert_eq!(tools[0]["description"], "picked for: say something");

    proxy.shutdown().await;
}
