//! Configuration loading and validation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PlanloopError;

pub const DEFAULT_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const DEFAULT_UPLOAD_DOMAIN_ENV: &str = "UPLOAD_DOMAIN";
pub const DEFAULT_MUSIC_URL_ENV: &str = "MUSIC_URL";

/// Top-level planloop configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<GatewayConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit: Option<AuditConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Step budget per run (default: 15).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// Completion provider configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable holding the API key (default: `ANTHROPIC_API_KEY`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Attempts per completion call, counting the first (default: 3).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,

    /// Fixed delay between attempts in ms (default: 5000).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_delay_ms: Option<u64>,
}

impl ProviderConfig {
    /// Resolve the API key: check `api_key` field first, then `api_key_env` environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(
            &self.api_key,
            &Some(
                self.api_key_env
                    .clone()
                    .unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string()),
            ),
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Base URL of the file upload service; `/upload` is appended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_domain: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_domain_env: Option<String>,

    /// Music playback endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub music_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub music_url_env: Option<String>,

    /// Request timeout for tool HTTP calls in ms (default: 30000).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// URLs `get_html_contents` refuses to fetch.
    #[serde(default)]
    pub blocked_urls: Vec<String>,
}

impl ToolsConfig {
    pub fn resolve_upload_domain(&self) -> Option<String> {
        resolve_secret_field(
            &self.upload_domain,
            &Some(
                self.upload_domain_env
                    .clone()
                    .unwrap_or_else(|| DEFAULT_UPLOAD_DOMAIN_ENV.to_string()),
            ),
        )
    }

    pub fn resolve_music_url(&self) -> Option<String> {
        resolve_secret_field(
            &self.music_url,
            &Some(
                self.music_url_env
                    .clone()
                    .unwrap_or_else(|| DEFAULT_MUSIC_URL_ENV.to_string()),
            ),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
}

fn default_port() -> u16 {
    3000
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "planloop_agent=debug").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "stdout".
    #[serde(default = "default_log_output")]
    pub output: String,
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

/// Markdown audit trail of every stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_audit_path")]
    pub path: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_audit_path(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_audit_path() -> String {
    "log.md".into()
}

/// Resolve a secret: check the direct value first, then the env-var reference.
pub fn resolve_secret_field(direct: &Option<String>, env_var: &Option<String>) -> Option<String> {
    if let Some(val) = direct {
        if !val.is_empty() {
            return Some(val.clone());
        }
    }
    if let Some(env) = env_var {
        if let Ok(val) = std::env::var(env) {
            if !val.is_empty() {
                return Some(val);
            }
        }
    }
    None
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .into_owned()
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let substituted = substitute_env_vars(&raw);

        let config: Config = json5::from_str(&substituted)
            .map_err(|e| PlanloopError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Default config file location.
    pub fn config_path() -> PathBuf {
        data_dir().join("config.json")
    }

    pub fn max_steps(&self) -> u32 {
        self.agent
            .as_ref()
            .and_then(|a| a.max_steps)
            .unwrap_or(15)
    }

    pub fn model(&self) -> String {
        self.agent
            .as_ref()
            .and_then(|a| a.model.clone())
            .unwrap_or_else(|| "claude-3-5-sonnet-20241022".to_string())
    }

    pub fn max_tokens(&self) -> u32 {
        self.agent
            .as_ref()
            .and_then(|a| a.max_tokens)
            .unwrap_or(1000)
    }

    pub fn temperature(&self) -> Option<f64> {
        Some(
            self.agent
                .as_ref()
                .and_then(|a| a.temperature)
                .unwrap_or(0.7),
        )
    }

    /// Resolve the provider API key from config or the environment.
    pub fn api_key(&self) -> Option<String> {
        match &self.provider {
            Some(p) => p.resolve_api_key(),
            None => ProviderConfig::default().resolve_api_key(),
        }
    }

    /// Resolve the API key or fail with a configuration error.
    pub fn require_api_key(&self) -> crate::error::Result<String> {
        self.api_key().ok_or_else(|| {
            let env = self
                .provider
                .as_ref()
                .and_then(|p| p.api_key_env.as_deref())
                .unwrap_or(DEFAULT_API_KEY_ENV);
            PlanloopError::Config(format!(
                "API key not provided: set provider.api_key or the {env} environment variable"
            ))
        })
    }

    pub fn provider_base_url(&self) -> Option<String> {
        self.provider.as_ref().and_then(|p| p.base_url.clone())
    }

    pub fn retry_attempts(&self) -> u32 {
        self.provider
            .as_ref()
            .and_then(|p| p.max_attempts)
            .unwrap_or(3)
    }

    pub fn retry_delay_ms(&self) -> u64 {
        self.provider
            .as_ref()
            .and_then(|p| p.retry_delay_ms)
            .unwrap_or(5_000)
    }

    pub fn tools_config(&self) -> ToolsConfig {
        self.tools.clone().unwrap_or_default()
    }

    pub fn tool_timeout_ms(&self) -> u64 {
        self.tools
            .as_ref()
            .and_then(|t| t.timeout_ms)
            .unwrap_or(30_000)
    }

    pub fn gateway_port(&self) -> u16 {
        self.gateway
            .as_ref()
            .map(|g| g.port)
            .unwrap_or_else(default_port)
    }

    pub fn gateway_bind(&self) -> String {
        self.gateway
            .as_ref()
            .and_then(|g| g.bind.clone())
            .unwrap_or_else(|| "0.0.0.0".to_string())
    }

    /// Audit log path, or `None` when the audit trail is disabled.
    pub fn audit_path(&self) -> Option<PathBuf> {
        let audit = self.audit.clone().unwrap_or_default();
        if !audit.enabled {
            return None;
        }
        let expanded = shellexpand::tilde(&audit.path);
        Some(PathBuf::from(expanded.as_ref()))
    }

    /// Get a config value by dotted path (e.g. "gateway.port", "agent.max_steps").
    pub fn get_path(&self, path: &str) -> Option<serde_json::Value> {
        let json = serde_json::to_value(self).ok()?;
        let mut current = &json;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current.clone())
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        if self.api_key().is_none() {
            errors.push("No API key configured for the completion provider".to_string());
        }

        if self.max_steps() == 0 {
            errors.push("agent.max_steps must be at least 1".to_string());
        }

        if self.retry_attempts() == 0 {
            errors.push("provider.max_attempts must be at least 1".to_string());
        }

        if let Some(gw) = &self.gateway {
            if gw.port == 0 {
                errors.push("Gateway port cannot be 0".to_string());
            }
        }

        let tools = self.tools_config();
        if tools.resolve_upload_domain().is_none() {
            warnings.push("upload_text_file has no upload domain configured".to_string());
        }
        if tools.resolve_music_url().is_none() {
            warnings.push("play_music has no music URL configured".to_string());
        }

        (warnings, errors)
    }
}

/// Base directory for planloop data: `~/.planloop/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".planloop")
}
