use async_trait::async_trait;
use rmcp::{
    model::{CallToolRequestParams, RawContent},
    service::{RoleClient, RunningService},
    transport::StreamableHttpClientTransport,
    ServiceExt,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use crate::error::AgentError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    // JSON Schema of the arguments object
    pub parameters: Value,
}

#[async_trait]
pub trait ToolSource: Send + Sync {
    fn tools(&self) -> &[ToolDescriptor];

    async fn call(&self, name: &str, arguments: Value) -> Result<String, AgentError>;
}

/// Opens a fresh [`ToolSource`]. Called once per agent invocation.
#[async_trait]
pub trait ToolConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn ToolSource>, AgentError>;
}

/// Client half of an MCP session with a single tool server.
pub struct McpToolClient {
    peer: RunningService<RoleClient, ()>,
    tools: Vec<ToolDescriptor>,
}

impl McpToolClient {
    pub async fn connect(url: &str) -> Result<Self, AgentError> {
        let transport = StreamableHttpClientTransport::from_uri(url.to_string());
        let peer: RunningService<RoleClient, ()> = ()
            .serve(transport)
            .await
            .map_err(|e| AgentError::Discovery(format!("could not connect to {}: {}", url, e)))?;

        let mcp_tools = peer
            .list_all_tools()
            .await
            .map_err(|e| AgentError::Discovery(format!("could not list tools at {}: {}", url, e)))?;

        let tools: Vec<ToolDescriptor> = mcp_tools.iter().map(convert_tool).collect();
        debug!("Discovered {} tools at {}", tools.len(), url);

        Ok(Self { peer, tools })
    }
}

#[async_trait]
impl ToolSource for McpToolClient {
    fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    async fn call(&self, name: &str, arguments: Value) -> Result<String, AgentError> {
        let arguments = match arguments {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => {
                let mut map = Map::new();
                map.insert("input".to_string(), other);
                Some(map)
            }
        };

        let mut params = CallToolRequestParams::new(name.to_string());
        params.arguments = arguments;

        let result = self
            .peer
            .call_tool(params)
            .await
            .map_err(|e| AgentError::Tool(format!("{}: {}", name, e)))?;

        // Tool-level errors go back to the model as text, not as a failed run.
        if result.is_error == Some(true) {
            Ok(format!("mcp tool error: {}", extract_text(&result.content)))
        } else {
            Ok(extract_text(&result.content))
        }
    }
}

#[derive(Debug, Clone)]
pub struct McpConnector {
    url: String,
}

impl McpConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ToolConnector for McpConnector {
    async fn connect(&self) -> Result<Arc<dyn ToolSource>, AgentError> {
        let client = McpToolClient::connect(&self.url).await?;
        Ok(Arc::new(client))
    }
}

type Handler = Arc<dyn Fn(Value) -> String + Send + Sync>;

/// In-process tools, for wiring an agent without a tool server.
#[derive(Default, Clone)]
pub struct StaticTools {
    tools: Vec<ToolDescriptor>,
    handlers: Vec<Handler>,
}

impl StaticTools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool<F>(mut self, descriptor: ToolDescriptor, handler: F) -> Self
    where
        F: Fn(Value) -> String + Send + Sync + 'static,
    {
        self.tools.push(descriptor);
        self.handlers.push(Arc::new(handler));
        self
    }
}

#[async_trait]
impl ToolSource for StaticTools {
    fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    async fn call(&self, name: &str, arguments: Value) -> Result<String, AgentError> {
        let index = self
            .tools
            .iter()
            .position(|t| t.name == name)
            .ok_or_else(|| AgentError::Tool(format!("unknown tool '{}'", name)))?;
        Ok((self.handlers[index])(arguments))
    }
}

#[async_trait]
impl ToolConnector for StaticTools {
    async fn connect(&self) -> Result<Arc<dyn ToolSource>, AgentError> {
        Ok(Arc::new(self.clone()))
    }
}

pub fn convert_tool(mcp_tool: &rmcp::model::Tool) -> ToolDescriptor {
    ToolDescriptor {
        name: mcp_tool.name.to_string(),
        description: mcp_tool
            .description
            .as_ref()
            .map(|d| d.to_string())
            .unwrap_or_default(),
        parameters: Value::Object((*mcp_tool.input_schema).clone()),
    }
}

fn extract_text(content: &[rmcp::model::Content]) -> String {
    content
        .iter()
        .filter_map(|c| match &c.raw {
            RawContent::Text(t) => Some(t.text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}
