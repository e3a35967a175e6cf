//! ToolProxy: the API the transport layer calls.

use crate::config::ProxyConfig;
use crate::error::McpError;
use crate::registry::{RebuildReport, Registry, ShutdownReport};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use switchyard_types::ToolDescriptor;
use tokio_util::sync::CancellationToken;

/// Thin handle over a shared [`Registry`]. Cheap to clone.
#[derive(Clone)]
pub struct ToolProxy {
    registry: Arc<Registry>,
}

impl ToolProxy {
    pub fn new(config: ProxyConfig) -> Self {
        Self::from_registry(Arc::new(Registry::new(config)))
    }

    pub fn from_registry(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// The full catalog, e.g. as candidates for a ranking step.
    pub async fn list_all(&self) -> Vec<ToolDescriptor> {
        self.registry.list_all().await
    }

    pub async fn route(
        &self,
        tool_name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, McpError> {
        self.registry.route(tool_name, arguments).await
    }

    pub async fn route_with_cancel(
        &self,
        tool_name: &str,
        arguments: serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, McpError> {
        self.registry
            .route_with_cancel(tool_name, arguments, cancel)
            .await
    }

    pub async fn rebuild_all(&self) -> Result<RebuildReport, McpError> {
        self.registry.rebuild_all().await
    }

    pub async fn shutdown(&self) -> ShutdownReport {
        self.registry.shutdown().await
    }

    pub async fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.registry.last_refresh().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn proxy_passes_through_to_registry() {
        let proxy = ToolProxy::new(ProxyConfig::default());
        assert!(proxy.last_refresh().await.is_none());
        proxy.rebuild_all().await.unwrap();
        assert!(proxy.last_refresh().await.is_some());
        assert!(proxy.list_all().await.is_empty());

        let clone = proxy.clone();
        let report = clone.shutdown().await;
        assert_eq!(report.closed, 0);
        assert!(matches!(proxy.rebuild_all().await, Err(McpError::ShutDown)));
    }
}
