pub mod api;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::api::{Health, QueryError, ServiceInfo};
use fruitstore_core::{Agent, AgentError, ChatModel, ErrorStatus, RunObserver, ToolConnector};

pub const FRUIT_PROMPT: &str = "What is the price of apples? Use the tool to get the price.";
pub const RUN_NAME: &str = "fruit_agent";

// Shared per-process state. Agents themselves are built fresh per request.
#[derive(Clone)]
pub struct AppState {
    pub brain: Arc<dyn ChatModel>,
    pub tools: Arc<dyn ToolConnector>,
    pub observers: Vec<Arc<dyn RunObserver>>,
    pub recursion_limit: usize,
    pub error_status: ErrorStatus,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/api/fruits", post(fruit_query))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Diagnostic only: nothing discovered here is cached.
pub async fn log_startup_tools(connector: &dyn ToolConnector) {
    match connector.connect().await {
        Ok(source) => {
            let tools = source.tools();
            info!("Total tools loaded: {}", tools.len());
            for tool in tools {
                info!("Tool: {}", tool.name);
                info!("Tool description: {}", tool.description);
            }
            info!("Agent initialized successfully with MCP tools");
        }
        Err(e) => {
            error!("Error initializing agent: {}", e);
            info!("Application will continue without MCP tools");
        }
    }
}

// --- HANDLERS ---

async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::current())
}

async fn health_check() -> Json<Health> {
    Json(Health::healthy())
}

async fn fruit_query(State(state): State<AppState>) -> Result<Json<String>, QueryError> {
    let fail = |source: AgentError| {
        error!("Error in fruit query: {}", source);
        QueryError {
            source,
            mode: state.error_status,
        }
    };

    // Rediscover on every request so a restarted tool server is picked up.
    let tools = state.tools.connect().await.map_err(fail)?;

    let agent = Agent::new(state.brain.clone(), tools)
        .with_run_name(RUN_NAME)
        .with_recursion_limit(state.recursion_limit)
        .with_observers(state.observers.iter().cloned());

    let answer = agent.run(FRUIT_PROMPT).await.map_err(fail)?;
    Ok(Json(answer))
}
