//! Registry: owns every provider session and the merged catalog.

use crate::catalog::Catalog;
use crate::config::{ProviderDescriptor, ProxyConfig};
use crate::error::McpError;
use crate::session::ProviderSession;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use switchyard_types::ToolDescriptor;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

/// Outcome of a rebuild.
#[derive(Debug, Default)]
pub struct RebuildReport {
    /// Providers that connected and listed their tools.
    pub connected: Vec<String>,
    /// Providers excluded from the catalog, with the reason.
    pub failed: Vec<(String, McpError)>,
    /// Tools in the new catalog.
    pub tools: usize,
}

/// Outcome of a shutdown.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    pub closed: usize,
    pub failures: Vec<(String, McpError)>,
}

#[derive(Default)]
struct RegistryState {
    catalog: Catalog,
    sessions: HashMap<String, Arc<ProviderSession>>,
    shut_down: bool,
}

/// Owns one session per configured provider and routes calls to them.
///
/// All mutable state sits behind one read/write lock. Readers hold it only
/// for lookups; provider I/O always happens with the lock released.
pub struct Registry {
    config: ProxyConfig,
    state: RwLock<RegistryState>,
    rebuild: Mutex<()>,
}

impl Registry {
    /// Create a registry with an empty catalog. Nothing is spawned until
    /// [`rebuild_all`](Self::rebuild_all).
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            config,
            state: RwLock::new(RegistryState::default()),
            rebuild: Mutex::new(()),
        }
    }

    /// Reconnect to every configured provider and replace the catalog.
    ///
    /// Providers that fail to connect or list are logged and left out; that
    /// never fails the rebuild as a whole.
    pub async fn rebuild_all(&self) -> Result<RebuildReport, McpError> {
        let _rebuilding = self.rebuild.lock().await;

        let retired = {
            let mut state = self.state.write().await;
            if state.shut_down {
                return Err(McpError::ShutDown);
            }
            std::mem::take(&mut state.sessions)
        };
        for (name, error) in close_sessions(retired).await {
            tracing::warn!("Failed to close provider '{}' before rebuild: {}", name, error);
        }

        tracing::debug!("Rebuilding from providers: {}", self.provider_names().join(", "));
        let mut builder = Catalog::builder();
        let mut sessions = HashMap::new();
        let mut report = RebuildReport::default();

        for (name, descriptor) in &self.config.providers {
            tracing::info!("Connecting to provider '{}'", name);
            match connect_and_list(name, descriptor).await {
                Ok((session, tools)) => {
                    tracing::info!("Provider '{}' provided {} tools", name, tools.len());
                    builder.merge(name, tools);
                    sessions.insert(name.clone(), Arc::new(session));
                    report.connected.push(name.clone());
                }
                Err(e) => {
                    tracing::warn!("Provider '{}' is unavailable: {}", name, e);
                    report.failed.push((name.clone(), e));
                }
            }
        }

        let catalog = builder.build();
        report.tools = catalog.len();

        let mut state = self.state.write().await;
        if state.shut_down {
            drop(state);
            close_sessions(sessions).await;
            return Err(McpError::ShutDown);
        }
        state.catalog = catalog;
        state.sessions = sessions;
        drop(state);

        tracing::info!(
            "Catalog rebuilt: {} tools from {} of {} providers",
            report.tools,
            report.connected.len(),
            self.config.providers.len()
        );
        Ok(report)
    }

    /// Every tool currently in the catalog, sorted by name.
    pub async fn list_all(&self) -> Vec<ToolDescriptor> {
        self.state.read().await.catalog.snapshot()
    }

    /// Invoke a tool on the provider that owns it.
    pub async fn route(
        &self,
        tool_name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, McpError> {
        let (provider, session) = self.lookup(tool_name).await?;
        let outcome = session.invoke(tool_name, arguments).await;
        self.after_call(&provider, &session, outcome).await
    }

    /// Like [`route`](Self::route), abandoning the call when `cancel` fires.
    pub async fn route_with_cancel(
        &self,
        tool_name: &str,
        arguments: serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, McpError> {
        let (provider, session) = self.lookup(tool_name).await?;
        let outcome = session.invoke_with_cancel(tool_name, arguments, cancel).await;
        self.after_call(&provider, &session, outcome).await
    }

    async fn lookup(&self, tool_name: &str) -> Result<(String, Arc<ProviderSession>), McpError> {
        let state = self.state.read().await;
        let provider = state
            .catalog
            .owner(tool_name)
            .ok_or_else(|| McpError::NotFound {
                tool: tool_name.to_string(),
            })?;
        let session = state
            .sessions
            .get(provider)
            .filter(|session| session.is_open())
            .ok_or_else(|| McpError::Unavailable {
                provider: provider.to_string(),
                tool: tool_name.to_string(),
            })?;
        Ok((provider.to_string(), Arc::clone(session)))
    }

    async fn after_call(
        &self,
        provider: &str,
        session: &Arc<ProviderSession>,
        outcome: Result<serde_json::Value, McpError>,
    ) -> Result<serde_json::Value, McpError> {
        if let Err(McpError::Timeout { .. }) = &outcome {
            self.evict(provider, session).await;
        }
        outcome
    }

    /// Drop a timed-out provider's session and tools until the next rebuild.
    async fn evict(&self, provider: &str, session: &Arc<ProviderSession>) {
        let mut state = self.state.write().await;
        let current = state
            .sessions
            .get(provider)
            .is_some_and(|s| Arc::ptr_eq(s, session));
        // A rebuild may already have replaced the session
        if !current {
            return;
        }
        state.sessions.remove(provider);
        let dropped = state.catalog.tools_for_provider(provider);
        state.catalog = state.catalog.without_provider(provider);
        drop(state);

        tracing::warn!(
            "Provider '{}' timed out; its {} tools are removed until next rebuild",
            provider,
            dropped
        );
        if let Err(e) = session.close().await {
            tracing::warn!("Failed to close provider '{}': {}", provider, e);
        }
    }

    /// Close every session and empty the catalog.
    ///
    /// Individual close failures are logged and collected; the remaining
    /// sessions are still closed.
    pub async fn shutdown(&self) -> ShutdownReport {
        let sessions = {
            let mut state = self.state.write().await;
            state.shut_down = true;
            state.catalog = Catalog::empty();
            std::mem::take(&mut state.sessions)
        };

        let closed = sessions.len();
        let failures = close_sessions(sessions).await;
        for (name, error) in &failures {
            tracing::warn!("Error closing provider '{}': {}", name, error);
        }
        tracing::info!("Registry shut down ({} sessions closed)", closed);
        ShutdownReport { closed, failures }
    }

    /// When the catalog was last rebuilt.
    pub async fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.catalog.refreshed_at()
    }

    /// Providers with an open session.
    pub async fn connected_providers(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut names: Vec<String> = state
            .sessions
            .iter()
            .filter(|(_, s)| s.is_open())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Names of all configured providers, in merge order.
    pub fn provider_names(&self) -> Vec<&str> {
        self.config.providers.keys().map(String::as_str).collect()
    }

    /// Run `check` against the current catalog.
    #[cfg(test)]
    async fn with_catalog<T>(&self, check: impl FnOnce(&Catalog) -> T) -> T {
        check(&self.state.read().await.catalog)
    }
}

async fn connect_and_list(
    name: &str,
    descriptor: &ProviderDescriptor,
) -> Result<(ProviderSession, Vec<ToolDescriptor>), McpError> {
    let session = ProviderSession::connect(name, descriptor).await?;
    match session.list_capabilities().await {
        Ok(tools) => Ok((session, tools)),
        Err(e) => {
            let _ = session.close().await;
            Err(e)
        }
    }
}

async fn close_sessions(
    sessions: HashMap<String, Arc<ProviderSession>>,
) -> Vec<(String, McpError)> {
    let closing = sessions.into_iter().map(|(name, session)| async move {
        session.close().await.err().map(|e| (name, e))
    });
    futures_util::future::join_all(closing)
        .await
        .into_iter()
        .flatten()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(tools: &[&str]) -> ProviderDescriptor {
        let listing: Vec<String> = tools
            .iter()
            .map(|t| format!(r#"{{"name":"{t}","description":"{t}","inputSchema":{{}}}}"#))
            .collect();
        let script = format!(
            r#"while IFS= read -r line; do case "$line" in *'"method":"initialize"'*) echo '{{"jsonrpc":"2.0","id":1,"result":{{}}}}' ;; *'"method":"tools/list"'*) echo '{{"jsonrpc":"2.0","id":2,"result":{{"tools":[{}]}}}}' ;; *'"method":"tools/call"'*) echo '{{"jsonrpc":"2.0","id":3,"result":{{}}}}' ;; esac; done"#,
            listing.join(",")
        );
        ProviderDescriptor::new("sh", vec!["-c".to_string(), script]).with_timeout_ms(5000)
    }

    #[tokio::test]
    async fn empty_config_builds_empty_catalog() {
        let registry = Registry::new(ProxyConfig::default());
        let report = registry.rebuild_all().await.unwrap();
        assert!(report.connected.is_empty());
        assert_eq!(report.tools, 0);
        assert!(registry.list_all().await.is_empty());
        assert!(registry.last_refresh().await.is_some());
        registry.shutdown().await;
    }

    #[test]
    fn provider_names_follow_merge_order() {
        let config = ProxyConfig::default()
            .with_provider("zeta", provider(&[]))
            .with_provider("alpha", provider(&[]));
        let registry = Registry::new(config);
        assert_eq!(registry.provider_names(), vec!["alpha", "zeta"]);
    }

    #[tokio::test]
    async fn failed_provider_is_skipped() {
        let config = ProxyConfig::default()
            .with_provider(
                "bad",
                ProviderDescriptor::new("nonexistent_command_xyz123", vec![]),
            )
            .with_provider("good", provider(&["ok"]));
        let registry = Registry::new(config);
        let report = registry.rebuild_all().await.unwrap();

        assert_eq!(report.connected, vec!["good".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(report.failed[0].1, McpError::Connect { .. }));
        assert_eq!(registry.connected_providers().await, vec!["good".to_string()]);
        registry.shutdown().await;
    }

    #[tokio::test]
    async fn collision_goes_to_last_provider_by_name() {
        let config = ProxyConfig::default()
            .with_provider("b", provider(&["search"]))
            .with_provider("a", provider(&["search", "fetch"]));
        let registry = Registry::new(config);
        registry.rebuild_all().await.unwrap();

        registry
            .with_catalog(|catalog| {
                assert!(catalog.is_consistent());
                assert_eq!(catalog.owner("search"), Some("b"));
                assert_eq!(catalog.owner("fetch"), Some("a"));
            })
            .await;
        registry.shutdown().await;
    }

    #[tokio::test]
    async fn rebuild_after_shutdown_is_refused() {
        let registry = Registry::new(ProxyConfig::default());
        registry.shutdown().await;
        assert!(matches!(
            registry.rebuild_all().await,
            Err(McpError::ShutDown)
        ));
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let registry = Registry::new(ProxyConfig::default());
        let err = registry.route("missing", serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, McpError::NotFound { tool } if tool == "missing"));
    }

    #[test]
    fn registry_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Registry>();
    }
}
