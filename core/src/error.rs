use thiserror::Error;

/// Startup configuration failures. Fatal: the process does not start.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Failures of a single agent invocation, tagged by where they happened.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("tool discovery failed: {0}")]
    Discovery(String),

    #[error("model request failed: {0}")]
    Model(String),

    #[error("tool call failed: {0}")]
    Tool(String),
}

impl AgentError {
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::Discovery(_) => "discovery",
            AgentError::Model(_) => "model",
            AgentError::Tool(_) => "tool",
        }
    }
}
