//! Provider file loading.
//!
//! A provider file is either the common `mcp.json` layout
//! (`{"mcpServers": {"name": {...}}}`) or a TOML file with `[servers.name]`
//! tables. The format is picked by extension: `.json` is JSON, anything else
//! is TOML.

use std::path::Path;

use switchyard_mcp::ProxyConfig;
use switchyard_types::ConfigError;

/// Read and parse the provider file at `path`.
pub fn load_provider_file(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let config = parse_provider_file(path, &content)?;
    tracing::debug!(
        "Loaded {} provider(s) from {}",
        config.providers.len(),
        path.display()
    );
    Ok(config)
}

fn parse_provider_file(path: &Path, content: &str) -> Result<ProxyConfig, ConfigError> {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let parse_error = |message: String| ConfigError::Parse {
        path: path.display().to_string(),
        message,
    };
    let config: ProxyConfig = if is_json {
        serde_json::from_str(content).map_err(|e| parse_error(e.to_string()))?
    } else {
        toml::from_str(content).map_err(|e| parse_error(e.to_string()))?
    };

    for (name, descriptor) in &config.providers {
        if descriptor.command.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: format!("providers.{name}.command"),
                message: "command must not be empty".to_string(),
            });
        }
    }
    Ok(config)
}
