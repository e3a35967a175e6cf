//! HTTP error type and the status code each failure maps to.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::time::Duration;
use switchyard_mcp::McpError;
use switchyard_types::RankError;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Tool(#[from] McpError),

    #[error("Tool ranking failed: {0}")]
    Rank(#[from] RankError),

    #[error("Tool discovery is disabled: no ranking backend is configured")]
    RankingDisabled,

    #[error("Request exceeded its {0:?} budget")]
    DeadlineExceeded(Duration),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Tool(e) => match e {
                McpError::NotFound { .. } => StatusCode::NOT_FOUND,
                McpError::Unavailable { .. } | McpError::ShutDown => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                McpError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                McpError::ToolExecution { .. } => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Rank(_) => StatusCode::BAD_GATEWAY,
            ApiError::RankingDisabled => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!("{} {}", status.as_u16(), self);
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
