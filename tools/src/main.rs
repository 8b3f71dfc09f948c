use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "fruitstore-tools", about = "Fruit_Prices MCP tool server")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "FRUIT_TOOLS_ADDR", default_value = "0.0.0.0:8000")]
    addr: String,

    /// Path the MCP endpoint is mounted at.
    #[arg(long, env = "FRUIT_TOOLS_PATH", default_value = fruitstore_tools::DEFAULT_PATH)]
    path: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();

    let app = fruitstore_tools::router(&args.path).layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(&args.addr).await?;
    info!(
        "{} serving MCP on {}{}",
        fruitstore_tools::SERVER_NAME,
        listener.local_addr()?,
        args.path
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    info!("Tool server stopped");
    Ok(())
}
