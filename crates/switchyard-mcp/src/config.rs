//! Configuration types for provider processes.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

fn default_timeout() -> u64 {
    30000
}

/// The set of providers the registry manages.
///
/// Providers are kept in name order; that order is the merge order of a
/// rebuild, so on a tool-name collision the last provider by name wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default, alias = "servers", alias = "mcpServers")]
    pub providers: BTreeMap<String, ProviderDescriptor>,
}

/// How to launch a single provider process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Command to run (e.g., "npx", "python").
    pub command: String,
    /// Arguments to pass to the command.
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment overrides, merged onto the inherited environment.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Deadline for each write and read, in milliseconds (default: 30000).
    #[serde(default = "default_timeout", alias = "timeoutMs")]
    pub timeout_ms: u64,
}

impl ProviderDescriptor {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            env: HashMap::new(),
            timeout_ms: default_timeout(),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

impl ProxyConfig {
    pub fn with_provider(mut self, name: impl Into<String>, descriptor: ProviderDescriptor) -> Self {
        self.providers.insert(name.into(), descriptor);
        self
    }
}
