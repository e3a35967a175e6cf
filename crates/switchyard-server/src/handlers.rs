//! Route handlers for the `/api/v1` surface.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use switchyard_mcp::McpError;
use switchyard_types::ToolDescriptor;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct DiscoverRequest {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UseRequest {
    #[serde(default)]
    pub arguments: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ToolsResponse {
    #[serde(rename = "recommendedTools")]
    pub recommended_tools: Vec<ToolDescriptor>,
}

#[derive(Debug, Serialize)]
pub struct UseResponse {
    pub result: Value,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub connected: Vec<String>,
    pub failed: BTreeMap<String, String>,
    pub tools: usize,
}

fn bad_body(rejection: JsonRejection) -> ApiError {
    ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
}

pub(crate) async fn list_tools(
    State(state): State<AppState>,
) -> Result<Json<ToolsResponse>, ApiError> {
    let budget = state.budgets.list;
    let tools = tokio::time::timeout(budget, state.proxy.list_all())
        .await
        .map_err(|_| ApiError::DeadlineExceeded(budget))?;
    Ok(Json(ToolsResponse {
        recommended_tools: tools,
    }))
}

pub(crate) async fn discover(
    State(state): State<AppState>,
    body: Result<Json<DiscoverRequest>, JsonRejection>,
) -> Result<Json<ToolsResponse>, ApiError> {
    let Json(request) = body.map_err(bad_body)?;
    let query = request.query.trim();
    if query.is_empty() {
        return Err(ApiError::BadRequest("Query is required".to_string()));
    }
    let ranker = state.ranker.clone().ok_or(ApiError::RankingDisabled)?;

    let budget = state.budgets.discover;
    let ranked = tokio::time::timeout(budget, async {
        let candidates = state.proxy.list_all().await;
        tracing::debug!(
            "Ranking {} candidates with {} for '{}'",
            candidates.len(),
            ranker.name(),
            query
        );
        ranker.rank(query, &candidates).await
    })
    .await
    .map_err(|_| ApiError::DeadlineExceeded(budget))??;

    Ok(Json(ToolsResponse {
        recommended_tools: ranked,
    }))
}

pub(crate) async fn use_tool(
    State(state): State<AppState>,
    Path(tool): Path<String>,
    body: Result<Json<UseRequest>, JsonRejection>,
) -> Result<Json<UseResponse>, ApiError> {
    let Json(request) = body.map_err(bad_body)?;
    let arguments = match request.arguments {
        None | Some(Value::Null) => json!({}),
        Some(args) => args,
    };

    let call_id = Uuid::new_v4();
    let budget = state.budgets.call;
    tracing::info!("[{call_id}] Calling tool '{tool}'");

    // Budget expiry cancels the call's token
    let cancel = CancellationToken::new();
    let timer = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(budget).await;
            cancel.cancel();
        })
    };

    let result = state
        .proxy
        .route_with_cancel(&tool, arguments, &cancel)
        .await;
    timer.abort();

    match result {
        Ok(result) => {
            tracing::info!("[{call_id}] Tool '{tool}' succeeded");
            Ok(Json(UseResponse { result }))
        }
        Err(McpError::Cancelled { .. }) if cancel.is_cancelled() => {
            tracing::warn!("[{call_id}] Tool '{tool}' exceeded its {budget:?} budget");
            Err(ApiError::DeadlineExceeded(budget))
        }
        Err(e) => {
            tracing::warn!("[{call_id}] Tool '{tool}' failed: {e}");
            Err(e.into())
        }
    }
}

pub(crate) async fn refresh(
    State(state): State<AppState>,
) -> Result<Json<RefreshResponse>, ApiError> {
    // The rebuild runs to completion even when the budget expires
    let proxy = state.proxy.clone();
    let rebuild = tokio::spawn(async move { proxy.rebuild_all().await });

    let budget = state.budgets.refresh;
    let report = tokio::time::timeout(budget, rebuild)
        .await
        .map_err(|_| ApiError::DeadlineExceeded(budget))?
        .map_err(|e| ApiError::Internal(format!("rebuild task failed: {e}")))??;

    Ok(Json(RefreshResponse {
        connected: report.connected,
        failed: report
            .failed
            .into_iter()
            .map(|(name, error)| (name, error.to_string()))
            .collect(),
        tools: report.tools,
    }))
}

pub(crate) async fn health() -> &'static str {
    "OK"
}
