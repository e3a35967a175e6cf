//! Line-framed JSON-RPC envelopes exchanged with provider processes.

use serde::{Deserialize, Serialize};

const JSONRPC_VERSION: &str = "2.0";

/// One outgoing call to a provider, written as a single stdin line.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    /// Incremented per session; replies are not matched against it.
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method: method.into(),
            params,
        }
    }
}

/// A provider's reply line.
///
/// `id` is kept loosely typed: some providers echo strings, some echo a
/// constant, and the session never correlates on it.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

/// Fire-and-forget line sent to a provider, such as `notifications/initialized`.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: &'static str,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method: method.into(),
            params,
        }
    }
}

/// Whether a message read from a provider was initiated by the provider
/// (a notification or a request to the client) rather than being a response.
pub fn is_provider_initiated(message: &serde_json::Value) -> bool {
    message.get("method").is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_request_with_params() {
        let req = JsonRpcRequest::new(
            1,
            "tools/call",
            Some(serde_json::json!({"name": "read", "arguments": {}})),
        );
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["id"], 1);
        assert_eq!(json["method"], "tools/call");
        assert!(json["params"].is_object());
    }

    #[test]
    fn serialize_request_without_params() {
        let req = JsonRpcRequest::new(2, "tools/list", None);
        let line = serde_json::to_string(&req).unwrap();
        assert_eq!(line, r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#);
    }

    #[test]
    fn deserialize_response_with_result() {
        let json = r#"{"jsonrpc":"2.0","id":1,"result":{"tools":[]}}"#;
        let resp: JsonRpcResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.id, Some(serde_json::json!(1)));
        assert!(resp.result.is_some());
        assert!(resp.error.is_none());
    }

    #[test]
    fn deserialize_response_with_string_id() {
        let json = r#"{"jsonrpc":"2.0","id":"abc","result":{}}"#;
        let resp: JsonRpcResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.id, Some(serde_json::json!("abc")));
    }

    #[test]
    fn deserialize_response_error_is_kept_verbatim() {
        let json =
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"Method not found"}}"#;
        let resp: JsonRpcResponse = serde_json::from_str(json).unwrap();
        assert!(resp.result.is_none());
        let err = resp.error.unwrap();
        assert_eq!(err["code"], -32601);
        assert_eq!(err["message"], "Method not found");
    }

    #[test]
    fn null_error_counts_as_absent() {
        let json = r#"{"jsonrpc":"2.0","id":1,"result":{},"error":null}"#;
        let resp: JsonRpcResponse = serde_json::from_str(json).unwrap();
        assert!(resp.error.is_none());
    }

    #[test]
    fn serialize_notification() {
        let notif = JsonRpcNotification::new("notifications/initialized", None);
        let json = serde_json::to_value(&notif).unwrap();
        assert_eq!(json["method"], "notifications/initialized");
        assert!(json.get("id").is_none());
        assert!(json.get("params").is_none());
    }

    #[test]
    fn provider_initiated_messages_are_detected() {
        let log = serde_json::json!({"jsonrpc":"2.0","method":"notifications/message","params":{}});
        let ping = serde_json::json!({"jsonrpc":"2.0","id":9,"method":"ping"});
        let resp = serde_json::json!({"jsonrpc":"2.0","id":9,"result":{}});
        assert!(is_provider_initiated(&log));
        assert!(is_provider_initiated(&ping));
        assert!(!is_provider_initiated(&resp));
    }
}
