use axum::Router;
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
    transport::streamable_http_server::{
        session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
    },
    ErrorData as McpError, ServerHandler,
};
use serde::Deserialize;

pub const SERVER_NAME: &str = "Fruit_Prices";
pub const DEFAULT_PATH: &str = "/mcp";

pub fn price_quote(fruit_name: &str) -> String {
    format!("Price for {} is $2.99 per kg", fruit_name)
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct PriceRequest {
    /// Name of the fruit to price.
    pub fruit_name: String,
}

#[derive(Clone)]
pub struct FruitPrices {
    tool_router: ToolRouter<Self>,
}

impl Default for FruitPrices {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_router]
impl FruitPrices {
    pub fn new() -> Self {
        Self {
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Get price with the fruit_name passed in as parameter.")]
    async fn get_fruit_price(
        &self,
        Parameters(PriceRequest { fruit_name }): Parameters<PriceRequest>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!("Pricing '{}'", fruit_name);
        Ok(CallToolResult::success(vec![Content::text(price_quote(
            &fruit_name,
        ))]))
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for FruitPrices {
    fn get_info(&self) -> ServerInfo {
        let mut info = ServerInfo::default();
        info.capabilities = ServerCapabilities::builder().enable_tools().build();
        info.server_info = Implementation::from_build_env();
        info.server_info.name = SERVER_NAME.to_string();
        info.instructions = Some("Look up fruit prices with get_fruit_price.".to_string());
        info
    }
}

// Each MCP session gets its own handler.
pub fn router(path: &str) -> Router {
    let service = StreamableHttpService::new(
        || Ok(FruitPrices::new()),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    );
    Router::new().nest_service(path, service)
}
