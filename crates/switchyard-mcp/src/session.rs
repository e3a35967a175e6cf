//! Provider session: one spawned process speaking MCP over stdio.
//!
//! Handles the protocol handshake (initialize + initialized notification),
//! capability listing (tools/list), and tool invocation (tools/call).

use crate::config::ProviderDescriptor;
use crate::error::McpError;
use crate::jsonrpc::JsonRpcResponse;
use crate::transport::StdioTransport;
use serde::Deserialize;
use switchyard_types::ToolDescriptor;
use tokio_util::sync::CancellationToken;

/// MCP protocol version we announce.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Client name announced in the handshake.
pub const CLIENT_NAME: &str = "switchyard";

/// Live connection to one provider process.
pub struct ProviderSession {
    name: String,
    transport: StdioTransport,
}

#[derive(Deserialize)]
struct ToolEntry {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default = "default_schema", rename = "inputSchema")]
    input_schema: serde_json::Value,
}

fn default_schema() -> serde_json::Value {
    serde_json::json!({"type": "object", "properties": {}})
}

impl ProviderSession {
    /// Spawn the provider and perform the handshake.
    ///
    /// The handshake response is read and discarded; only a failure to read
    /// or parse it is an error. The process is killed before any handshake
    /// error is returned.
    pub async fn connect(name: &str, descriptor: &ProviderDescriptor) -> Result<Self, McpError> {
        let transport = StdioTransport::spawn(
            name,
            &descriptor.command,
            &descriptor.args,
            &descriptor.env,
            descriptor.timeout_ms,
        )?;
        let session = Self {
            name: name.to_string(),
            transport,
        };

        if let Err(e) = session.handshake().await {
            let _ = session.close().await;
            return Err(e);
        }

        tracing::info!("Provider '{}' connected (pid {:?})", name, session.pid());
        Ok(session)
    }

    async fn handshake(&self) -> Result<(), McpError> {
        let init_params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": CLIENT_NAME,
                "version": env!("CARGO_PKG_VERSION")
            }
        });

        self.transport
            .request("initialize", Some(init_params), None)
            .await
            .map_err(|e| self.as_handshake_error(e))?;

        self.transport
            .notify("notifications/initialized", None)
            .await
            .map_err(|e| self.as_handshake_error(e))
    }

    fn as_handshake_error(&self, err: McpError) -> McpError {
        match err {
            McpError::Protocol { reason, .. } => McpError::Handshake {
                provider: self.name.clone(),
                reason,
            },
            McpError::Io { source, .. } => McpError::Handshake {
                provider: self.name.clone(),
                reason: source.to_string(),
            },
            other => other,
        }
    }

    /// Ask the provider for its tools.
    pub async fn list_capabilities(&self) -> Result<Vec<ToolDescriptor>, McpError> {
        let message = self.transport.request("tools/list", None, None).await?;

        match self.parse_tool_list(message) {
            Ok(tools) => Ok(tools),
            Err(e) => {
                let _ = self.close().await;
                Err(e)
            }
        }
    }

    fn parse_tool_list(&self, message: serde_json::Value) -> Result<Vec<ToolDescriptor>, McpError> {
        let response = self.parse_response(message)?;
        let result = response
            .result
            .ok_or_else(|| self.schema("response has no result field"))?;
        let entries = match result.get("tools") {
            Some(serde_json::Value::Array(entries)) => entries,
            Some(_) => return Err(self.schema("result.tools is not an array")),
            None => return Err(self.schema("result has no tools field")),
        };

        let mut tools = Vec::with_capacity(entries.len());
        for entry in entries {
            match ToolEntry::deserialize(entry) {
                Ok(t) => tools.push(ToolDescriptor {
                    name: t.name,
                    description: t.description.unwrap_or_default(),
                    input_schema: t.input_schema,
                    provider: self.name.clone(),
                }),
                Err(e) => {
                    tracing::warn!("Skipping malformed tool entry from '{}': {}", self.name, e);
                }
            }
        }
        Ok(tools)
    }

    /// Call a tool and return the provider's `result` verbatim.
    pub async fn invoke(
        &self,
        tool_name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, McpError> {
        self.call(tool_name, arguments, None).await
    }

    /// Like [`invoke`](Self::invoke), but gives up as soon as `cancel` fires.
    ///
    /// Cancelling closes the session; the provider is not told the call was
    /// abandoned.
    pub async fn invoke_with_cancel(
        &self,
        tool_name: &str,
        arguments: serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, McpError> {
        self.call(tool_name, arguments, Some(cancel)).await
    }

    async fn call(
        &self,
        tool_name: &str,
        arguments: serde_json::Value,
        cancel: Option<&CancellationToken>,
    ) -> Result<serde_json::Value, McpError> {
        let params = serde_json::json!({
            "name": tool_name,
            "arguments": arguments,
        });

        let message = self
            .transport
            .request("tools/call", Some(params), cancel)
            .await
            .map_err(|e| match e {
                McpError::Unavailable { provider, .. } => McpError::Unavailable {
                    provider,
                    tool: tool_name.to_string(),
                },
                other => other,
            })?;

        let outcome = self.parse_response(message).and_then(|response| {
            if let Some(payload) = response.error {
                return Err(McpError::ToolExecution {
                    provider: self.name.clone(),
                    tool: tool_name.to_string(),
                    payload,
                });
            }
            response
                .result
                .ok_or_else(|| self.protocol("tools/call response has neither result nor error"))
        });

        if let Err(e) = &outcome {
            if !e.keeps_session_open() {
                let _ = self.close().await;
            }
        }
        outcome
    }

    fn parse_response(&self, message: serde_json::Value) -> Result<JsonRpcResponse, McpError> {
        if !message.is_object() {
            return Err(self.protocol(format!("expected a JSON object, got {message}")));
        }
        serde_json::from_value(message).map_err(|e| self.protocol(e.to_string()))
    }

    /// Close the streams and kill the process. Safe to call more than once.
    pub async fn close(&self) -> Result<(), McpError> {
        self.transport.close().await
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    /// OS process id of the provider, if it was spawned.
    pub fn pid(&self) -> Option<u32> {
        self.transport.pid()
    }

    fn protocol(&self, reason: impl Into<String>) -> McpError {
        McpError::Protocol {
            provider: self.name.clone(),
            reason: reason.into(),
        }
    }

    fn schema(&self, reason: impl Into<String>) -> McpError {
        McpError::Schema {
            provider: self.name.clone(),
            reason: reason.into(),
        }
    }
}
