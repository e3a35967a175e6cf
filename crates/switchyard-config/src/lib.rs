//! Multi-tier TOML configuration for Switchyard.
//!
//! Reads configuration from multiple sources with precedence:
//! CLI flags > env vars > settings file > defaults

mod providers;

pub use providers::load_provider_file;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use switchyard_mcp::ProxyConfig;
use switchyard_rank::{DEFAULT_MAX_TOOLS, RankerBackend};
use switchyard_types::ConfigError;

/// The default HTTP listen address.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:8080";

/// Provider file looked up in the config directory when none is given.
pub const DEFAULT_PROVIDER_FILE: &str = "mcp.json";

/// Resolved configuration for a Switchyard process.
#[derive(Debug, Clone)]
pub struct SwitchyardConfig {
    pub listen: String,
    pub providers: ProxyConfig,
    /// `None` when no ranking key is configured; discovery is then disabled.
    pub ranker: Option<RankerBackend>,
    pub max_tools: usize,
    pub config_dir: PathBuf,
}

/// Settings that can be read from a TOML config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub ranking: RankingSettings,
    /// Inline provider table, used when no provider file is found.
    #[serde(default)]
    pub providers: ProxyConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSettings {
    pub listen: Option<String>,
    /// Provider file, relative paths resolve against the config directory.
    pub providers_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RankingSettings {
    pub max_tools: Option<usize>,
    pub openai_api_key: Option<String>,
    pub openai_model: Option<String>,
    pub openai_base_url: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,
    pub gemini_base_url: Option<String>,
}

/// CLI overrides that take highest precedence.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_dir: Option<PathBuf>,
    pub providers_file: Option<PathBuf>,
    pub listen: Option<String>,
}

impl SwitchyardConfig {
    /// Load configuration from all sources, applying precedence rules.
    ///
    /// Precedence (highest to lowest):
    /// 1. CLI flags
    /// 2. Environment variables
    /// 3. Settings file (~/.switchyard/config.toml)
    /// 4. Defaults
    pub fn load(overrides: CliOverrides) -> Result<Self, ConfigError> {
        Self::resolve(overrides, |key| std::env::var(key).ok())
    }

    /// Same as [`load`](Self::load) with an explicit environment lookup.
    pub fn resolve(
        overrides: CliOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let config_dir = overrides
            .config_dir
            .or_else(|| env("SWITCHYARD_CONFIG_DIR").map(PathBuf::from))
            .unwrap_or_else(default_config_dir);
        let settings = load_settings_file(&config_dir.join("config.toml"));
        let env = |key: &str| env(key).filter(|v| !v.is_empty());

        let listen = overrides
            .listen
            .or_else(|| env("SWITCHYARD_LISTEN"))
            .or(settings.server.listen)
            .unwrap_or_else(|| DEFAULT_LISTEN.to_string());

        let max_tools = match env("SWITCHYARD_MAX_TOOLS") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "SWITCHYARD_MAX_TOOLS".into(),
                message: format!("expected a positive integer, got '{raw}'"),
            })?,
            None => settings.ranking.max_tools.unwrap_or(DEFAULT_MAX_TOOLS),
        };
        if max_tools == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_tools".into(),
                message: "must be at least 1".into(),
            });
        }

        // Resolve provider file: CLI > env > settings > <config_dir>/mcp.json
        let explicit_file = overrides
            .providers_file
            .or_else(|| env("SWITCHYARD_PROVIDERS").map(PathBuf::from))
            .or(settings
                .server
                .providers_file
                .map(|p| resolve_relative(&config_dir, p)));
        let providers = match explicit_file {
            Some(path) => load_provider_file(&path)?,
            None => {
                let fallback = config_dir.join(DEFAULT_PROVIDER_FILE);
                if fallback.is_file() {
                    load_provider_file(&fallback)?
                } else {
                    settings.providers
                }
            }
        };

        let ranker = resolve_ranker(&settings.ranking, &env);

        Ok(SwitchyardConfig {
            listen,
            providers,
            ranker,
            max_tools,
            config_dir,
        })
    }
}

/// Pick the ranking backend: an OpenAI key wins over a Gemini key.
fn resolve_ranker(
    settings: &RankingSettings,
    env: &impl Fn(&str) -> Option<String>,
) -> Option<RankerBackend> {
    let openai_key = env("OPENAI_API_KEY").or_else(|| settings.openai_api_key.clone());
    if let Some(api_key) = openai_key {
        let mut backend = RankerBackend::openai(api_key);
        if let RankerBackend::OpenAi {
            model, base_url, ..
        } = &mut backend
        {
            if let Some(m) = env("OPENAI_MODEL").or_else(|| settings.openai_model.clone()) {
                *model = m;
            }
            if let Some(u) = env("OPENAI_BASE_URL").or_else(|| settings.openai_base_url.clone()) {
                *base_url = u;
            }
        }
        return Some(backend);
    }

    let gemini_key = env("GEMINI_API_KEY").or_else(|| settings.gemini_api_key.clone())?;
    let mut backend = RankerBackend::gemini(gemini_key);
    if let RankerBackend::Gemini {
        model, base_url, ..
    } = &mut backend
    {
        if let Some(m) = env("GEMINI_MODEL").or_else(|| settings.gemini_model.clone()) {
            *model = m;
        }
        if let Some(u) = env("GEMINI_BASE_URL").or_else(|| settings.gemini_base_url.clone()) {
            *base_url = u;
        }
    }
    Some(backend)
}

fn resolve_relative(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

fn default_config_dir() -> PathBuf {
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".switchyard")
}

/// Load and parse a TOML settings file, returning defaults on any error.
fn load_settings_file(path: &Path) -> SettingsFile {
    match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("Failed to parse {}: {}", path.display(), e);
            SettingsFile::default()
        }),
        Err(_) => SettingsFile::default(),
    }
}
