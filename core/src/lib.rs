pub mod config;
pub mod error;
pub mod llm;
pub mod message;
pub mod registry;
pub mod runtime;
pub mod trace;

pub use config::{ErrorStatus, LangfuseConfig, ModelConfig, Settings};
pub use error::{AgentError, ConfigError};
pub use llm::{Brain, ChatModel};
pub use message::{Message, ToolCall};
pub use registry::{McpConnector, McpToolClient, StaticTools, ToolConnector, ToolDescriptor, ToolSource};
pub use runtime::{Agent, RunRecord, Step, NEED_MORE_STEPS};
pub use trace::{LangfuseHandler, LogObserver, RunObserver};
