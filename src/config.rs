//! Gateway configuration loading and validation.
//!
//! Reads a single YAML file (default `config/gateway.yaml`) and resolves
//! environment variables before parsing. Every section has serde defaults so
//! a minimal file only needs the two backend endpoints.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Env var that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "GATEWAY_CONFIG";

/// Config path used when neither the CLI nor the env var names one.
pub const DEFAULT_CONFIG_PATH: &str = "config/gateway.yaml";

/// Credential values that are shipped in sample configs and never valid.
const PLACEHOLDER_CREDENTIALS: &[&str] = &["YOUR_API_KEY", "DEMO"];

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Errors raised while loading the gateway configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    /// The YAML did not match the expected shape.
    #[error("failed to parse config: {reason}")]
    Parse { reason: String },

    /// A required value is missing or inconsistent.
    #[error("invalid config: {reason}")]
    Invalid { reason: String },
}

// ─── Public Types ────────────────────────────────────────────────────────────

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Top-level gateway configuration (mirrors `config/gateway.yaml`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Lines of model output containing any of these (case-insensitive) are dropped.
    #[serde(default)]
    pub filter_keywords: Vec<String>,
    #[serde(default)]
    pub prompts: PromptsConfig,
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Inbound HTTP listener.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// OpenAI-compatible LLM endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_llm_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Global system prompt. Echoes of it are stripped from model output.
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Global assistant guidelines. Echoes are stripped like the system prompt.
    #[serde(default)]
    pub assistant_guidelines: Option<String>,
    #[serde(default)]
    pub chatbot_name: Option<String>,
    /// May contain a `%s` placeholder for the chatbot name.
    #[serde(default)]
    pub welcome_message: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_llm_base_url(),
            model: String::new(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            connect_timeout_ms: default_llm_connect_timeout_ms(),
            request_timeout_ms: default_llm_request_timeout_ms(),
            system_prompt: None,
            assistant_guidelines: None,
            chatbot_name: None,
            welcome_message: None,
        }
    }
}

/// JSON-RPC tool backend.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub endpoint: String,
    /// Explicit session endpoint. Derived from `endpoint` when absent.
    #[serde(default)]
    pub session_endpoint: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub test_api_key: Option<String>,
    #[serde(default)]
    pub test_role: Option<String>,
    #[serde(default)]
    pub test_profile: Option<String>,
    /// When set, bypasses session negotiation entirely.
    #[serde(default)]
    pub static_session_id: Option<String>,
    /// Requested transport name. Normalized before it is sent.
    #[serde(default)]
    pub transport: Option<String>,
    /// Method invoked by the health probe.
    #[serde(default = "default_health_method")]
    pub health_method: String,
    #[serde(default)]
    pub timeouts: RpcTimeouts,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: String::new(),
            session_endpoint: None,
            auth_token: None,
            test_api_key: None,
            test_role: None,
            test_profile: None,
            static_session_id: None,
            transport: None,
            health_method: default_health_method(),
            timeouts: RpcTimeouts::default(),
            pool: PoolConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl RpcConfig {
    /// The credential used toward the RPC backend.
    ///
    /// `auth_token` wins over `test_api_key`. Empty values and the sample
    /// placeholders count as unset.
    pub fn resolved_api_key(&self) -> Option<String> {
        usable_credential(self.auth_token.as_deref())
            .or_else(|| usable_credential(self.test_api_key.as_deref()))
    }

    /// The configured static session id, trimmed, if non-empty.
    pub fn static_session(&self) -> Option<String> {
        self.static_session_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    /// The endpoint used for session negotiation.
    ///
    /// `…/mcp` gets `/session` appended; anything else gets `/mcp/session`.
    pub fn resolved_session_endpoint(&self) -> String {
        if let Some(explicit) = self.session_endpoint.as_deref().filter(|s| !s.trim().is_empty()) {
            return explicit.trim().to_string();
        }
        let base = self.endpoint.trim_end_matches('/');
        if base.ends_with("/mcp") {
            format!("{base}/session")
        } else {
            format!("{base}/mcp/session")
        }
    }
}

/// Independently configurable RPC timeouts.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcTimeouts {
    #[serde(default = "default_rpc_timeout_ms")]
    pub connect_ms: u64,
    #[serde(default = "default_rpc_timeout_ms")]
    pub response_ms: u64,
    #[serde(default = "default_rpc_timeout_ms")]
    pub write_ms: u64,
    #[serde(default = "default_rpc_timeout_ms")]
    pub pending_acquire_ms: u64,
}

impl Default for RpcTimeouts {
    fn default() -> Self {
        Self {
            connect_ms: default_rpc_timeout_ms(),
            response_ms: default_rpc_timeout_ms(),
            write_ms: default_rpc_timeout_ms(),
            pending_acquire_ms: default_rpc_timeout_ms(),
        }
    }
}

/// Connection pool sizing.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_max_idle_ms")]
    pub max_idle_ms: u64,
    #[serde(default = "default_max_lifetime_ms")]
    pub max_lifetime_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            max_idle_ms: default_max_idle_ms(),
            max_lifetime_ms: default_max_lifetime_ms(),
        }
    }
}

/// Premature-close retry settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            delay_ms: default_retry_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Per-credential admission control.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: default_requests_per_minute(),
            window_secs: default_window_secs(),
        }
    }
}

/// Prompt text for one role, profile, or the default entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromptEntry {
    #[serde(default, alias = "systemPrompt")]
    pub system_prompt: Option<String>,
    #[serde(default, alias = "assistantGuidelines")]
    pub assistant_guidelines: Option<String>,
}

/// Prompt profiles keyed by role and by profile.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromptsConfig {
    #[serde(default)]
    pub default: PromptEntry,
    #[serde(default, alias = "roles")]
    pub role: HashMap<String, PromptEntry>,
    #[serde(default, alias = "profiles")]
    pub profile: HashMap<String, PromptEntry>,
}

fn default_true() -> bool {
    true
}
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_llm_base_url() -> String {
    "http://localhost:11434/v1".to_string()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_llm_connect_timeout_ms() -> u64 {
    5_000
}
fn default_llm_request_timeout_ms() -> u64 {
    120_000
}
fn default_health_method() -> String {
    "tools.list".to_string()
}
fn default_rpc_timeout_ms() -> u64 {
    10_000
}
fn default_max_connections() -> usize {
    100
}
fn default_max_idle_ms() -> u64 {
    30_000
}
fn default_max_lifetime_ms() -> u64 {
    300_000
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    300
}
fn default_requests_per_minute() -> u32 {
    60
}
fn default_window_secs() -> u64 {
    60
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Pick the config path: explicit argument, then `GATEWAY_CONFIG`, then the default.
pub fn resolve_config_path(explicit: Option<&str>) -> PathBuf {
    if let Some(path) = explicit.filter(|p| !p.trim().is_empty()) {
        return PathBuf::from(path);
    }
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

/// Load, interpolate and validate the gateway configuration file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    parse_config(&raw)
}

/// Parse a YAML document into a validated [`GatewayConfig`].
pub fn parse_config(raw: &str) -> Result<GatewayConfig, ConfigError> {
    let interpolated = interpolate_env_vars(raw);

    let config: GatewayConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &GatewayConfig) -> Result<(), ConfigError> {
    if config.rpc.enabled && config.rpc.endpoint.trim().is_empty() {
        return Err(ConfigError::Invalid {
            reason: "rpc.endpoint is required when rpc.enabled is true".into(),
        });
    }
    if config.llm.enabled && config.llm.model.trim().is_empty() {
        return Err(ConfigError::Invalid {
            reason: "llm.model is required when llm.enabled is true".into(),
        });
    }
    if config.rate_limit.enabled && config.rate_limit.window_secs == 0 {
        return Err(ConfigError::Invalid {
            reason: "rate_limit.window_secs must be at least 1".into(),
        });
    }
    if config.rpc.pool.max_connections == 0 {
        return Err(ConfigError::Invalid {
            reason: "rpc.pool.max_connections must be at least 1".into(),
        });
    }
    Ok(())
}

fn usable_credential(value: Option<&str>) -> Option<String> {
    let trimmed = value?.trim();
    if trimmed.is_empty() {
        return None;
    }
    let upper = trimmed.to_uppercase();
    if PLACEHOLDER_CREDENTIALS.contains(&upper.as_str()) {
        return None;
    }
    Some(trimmed.to_string())
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_expr = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_expr.push(c);
            }
            result.push_str(&resolve_var_expr(&var_expr));
        } else {
            result.push(ch);
        }
    }

    result
}

/// Resolve `VAR` or `VAR:-default`.
fn resolve_var_expr(expr: &str) -> String {
    if let Some(idx) = expr.find(":-") {
        let var_name = &expr[..idx];
        let default = &expr[idx + 2..];
        std::env::var(var_name).unwrap_or_else(|_| expand_tilde(default))
    } else {
        std::env::var(expr).unwrap_or_default()
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{rest}", home.display());
        }
    }
    path.to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
