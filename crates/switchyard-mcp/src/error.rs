//! Error types for provider sessions and routing.

use thiserror::Error;

/// Errors from provider communication and tool routing.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Failed to spawn provider '{provider}': {source}")]
    Connect {
        provider: String,
        source: std::io::Error,
    },

    #[error("Handshake with provider '{provider}' failed: {reason}")]
    Handshake { provider: String, reason: String },

    #[error("Protocol error from provider '{provider}': {reason}")]
    Protocol { provider: String, reason: String },

    #[error("Unexpected tools/list shape from provider '{provider}': {reason}")]
    Schema { provider: String, reason: String },

    #[error("Tool '{tool}' failed on provider '{provider}': {payload}")]
    ToolExecution {
        provider: String,
        tool: String,
        payload: serde_json::Value,
    },

    #[error("Unknown tool: '{tool}'")]
    NotFound { tool: String },

    #[error("Provider '{provider}' serving tool '{tool}' is not available")]
    Unavailable { provider: String, tool: String },

    #[error("Provider '{provider}' timed out after {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: u64 },

    #[error("Call to provider '{provider}' was cancelled")]
    Cancelled { provider: String },

    #[error("I/O error talking to provider '{provider}': {source}")]
    Io {
        provider: String,
        source: std::io::Error,
    },

    #[error("Registry has been shut down")]
    ShutDown,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl McpError {
    /// Whether a session that produced this error can keep serving calls.
    ///
    /// Only tool-level failures leave the channel in a known state.
    pub fn keeps_session_open(&self) -> bool {
        matches!(self, McpError::ToolExecution { .. })
    }

    /// The provider this error is attributed to, if any.
    pub fn provider(&self) -> Option<&str> {
        match self {
            McpError::Connect { provider, .. }
            | McpError::Handshake { provider, .. }
            | McpError::Protocol { provider, .. }
            | McpError::Schema { provider, .. }
            | McpError::ToolExecution { provider, .. }
            | McpError::Unavailable { provider, .. }
            | McpError::Timeout { provider, .. }
            | McpError::Cancelled { provider }
            | McpError::Io { provider, .. } => Some(provider),
            McpError::NotFound { .. } | McpError::ShutDown | McpError::Json(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_tool_errors_keep_session() {
        let tool_err = McpError::ToolExecution {
            provider: "a".into(),
            tool: "t".into(),
            payload: serde_json::json!({"code": 1}),
        };
        let timeout = McpError::Timeout {
            provider: "a".into(),
            timeout_ms: 10,
        };
        assert!(tool_err.keeps_session_open());
        assert!(!timeout.keeps_session_open());
    }

    #[test]
    fn tool_error_message_includes_payload() {
        let err = McpError::ToolExecution {
            provider: "fs".into(),
            tool: "read".into(),
            payload: serde_json::json!({"message": "no such file"}),
        };
        let msg = err.to_string();
        assert!(msg.contains("read"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn provider_attribution() {
        let err = McpError::Cancelled {
            provider: "gh".into(),
        };
        assert_eq!(err.provider(), Some("gh"));
        assert_eq!(
            McpError::NotFound {
                tool: "x".into()
            }
            .provider(),
            None
        );
    }
}
