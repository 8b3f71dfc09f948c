use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use fruitstore_core::{Brain, LangfuseHandler, LogObserver, McpConnector, RunObserver, Settings};
use fruitstore_gateway::{build_router, log_startup_tools, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging Setup
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .compact()
        .init();

    info!("Fruit Store Gateway Initializing...");

    // 2. Configuration. Missing credentials stop the process here.
    let settings = Settings::from_env().context("invalid configuration")?;

    // 3. The Brain
    let brain = Arc::new(Brain::new(settings.model.clone()));
    info!("LLM configured successfully with model: {}", settings.model.model);

    // 4. Tracing callbacks, shared by every run
    let observers: Vec<Arc<dyn RunObserver>> = vec![
        Arc::new(LogObserver),
        Arc::new(LangfuseHandler::new(settings.langfuse.clone())),
    ];

    // 5. Tool server. Listed once for the logs; each request reconnects.
    let tools = Arc::new(McpConnector::new(settings.tool_server_url.clone()));
    info!("Connecting to MCP tool server at {}", tools.url());
    log_startup_tools(tools.as_ref()).await;

    let state = AppState {
        brain,
        tools,
        observers,
        recursion_limit: settings.recursion_limit,
        error_status: settings.error_status,
    };
    let app = build_router(state);

    // 6. Start Server
    let listener = TcpListener::bind(&settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;
    info!("Gateway listening on {}...", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    info!("Shutting down agent and MCP client");
    Ok(())
}
