//! Process configuration, read once at startup.
//!
//! Environment variables:
//! - `LANGFUSE_SECRET_KEY` / `LANGFUSE_PUBLIC_KEY` - Required. Tracing credentials.
//! - `LANGFUSE_HOST` - Optional. Defaults to `https://cloud.langfuse.com`.
//! - `LLM_MODEL` - Optional. Defaults to `qwen3-vllm`.
//! - `QWEN_VISION_MODEL_KEY` - Required when `LLM_MODEL` names a vision model.
//! - `QWEN_TEXT_MODEL_KEY` - Required otherwise.
//! - `LLM_BASE_URL` - Optional. Defaults to `http://litellm:4000`.
//! - `FRUIT_MCP_URL` - Optional. Defaults to `http://mcp-fruit-services:8000/mcp`.
//! - `GATEWAY_ADDR` - Optional. Defaults to `0.0.0.0:8080`.
//! - `AGENT_RECURSION_LIMIT` - Optional. Defaults to `25`.
//! - `FRUIT_API_ERROR_STATUS` - Optional. `legacy` (default) or `strict`.

use std::str::FromStr;

use crate::error::ConfigError;

pub const DEFAULT_MODEL: &str = "qwen3-vllm";
pub const DEFAULT_LLM_BASE_URL: &str = "http://litellm:4000";
pub const DEFAULT_MCP_URL: &str = "http://mcp-fruit-services:8000/mcp";
pub const DEFAULT_LANGFUSE_HOST: &str = "https://cloud.langfuse.com";
pub const DEFAULT_GATEWAY_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_RECURSION_LIMIT: usize = 25;

/// Everything needed to talk to the language model.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub model: String,
    pub api_key: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ModelConfig {
    pub fn is_vision(&self) -> bool {
        self.model.contains("vision")
    }
}

#[derive(Debug, Clone)]
pub struct LangfuseConfig {
    pub public_key: String,
    pub secret_key: String,
    pub host: String,
}

/// How failed agent runs are reported over HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorStatus {
    /// Error payloads go out with 200; callers inspect the body.
    #[default]
    Legacy,
    /// Error payloads carry a 5xx status matching the failure kind.
    Strict,
}

impl FromStr for ErrorStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "legacy" => Ok(ErrorStatus::Legacy),
            "strict" => Ok(ErrorStatus::Strict),
            other => Err(format!("expected 'legacy' or 'strict', got: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub model: ModelConfig,
    pub langfuse: LangfuseConfig,
    pub tool_server_url: String,
    pub bind_addr: String,
    pub recursion_limit: usize,
    pub error_status: ErrorStatus,
}

impl Settings {
    /// Load settings from `.env` (if present) and the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
        };

        let langfuse = LangfuseConfig {
            secret_key: required("LANGFUSE_SECRET_KEY")?,
            public_key: required("LANGFUSE_PUBLIC_KEY")?,
            host: lookup("LANGFUSE_HOST").unwrap_or_else(|| DEFAULT_LANGFUSE_HOST.to_string()),
        };

        let model = lookup("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let key_var = if model.contains("vision") {
            "QWEN_VISION_MODEL_KEY"
        } else {
            "QWEN_TEXT_MODEL_KEY"
        };
        let model = ModelConfig {
            api_key: required(key_var)?,
            base_url: lookup("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
            model,
            temperature: 0.0,
            max_tokens: 1500,
        };

        let recursion_limit = match lookup("AGENT_RECURSION_LIMIT") {
            Some(raw) => {
                let limit: usize = raw.parse().map_err(|e| {
                    ConfigError::InvalidValue("AGENT_RECURSION_LIMIT".to_string(), format!("{}", e))
                })?;
                if limit == 0 {
                    return Err(ConfigError::InvalidValue(
                        "AGENT_RECURSION_LIMIT".to_string(),
                        "must be at least 1".to_string(),
                    ));
                }
                limit
            }
            None => DEFAULT_RECURSION_LIMIT,
        };

        let error_status: ErrorStatus = lookup("FRUIT_API_ERROR_STATUS")
            .map(|v| {
                v.parse::<ErrorStatus>()
                    .map_err(|e| ConfigError::InvalidValue("FRUIT_API_ERROR_STATUS".to_string(), e))
            })
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            model,
            langfuse,
            tool_server_url: lookup("FRUIT_MCP_URL").unwrap_or_else(|| DEFAULT_MCP_URL.to_string()),
            bind_addr: lookup("GATEWAY_ADDR").unwrap_or_else(|| DEFAULT_GATEWAY_ADDR.to_string()),
            recursion_limit,
            error_status,
        })
    }
}
