/// Marketo MCP Server - JSON-RPC (stdio) + HTTP API
///
/// Serves either the data agent or the action agent tool set:
/// 1. JSON-RPC over stdin/stdout (for direct MCP protocol)
/// 2. HTTP endpoints (for the backend bridge and remote access)
///
/// Run the action agent over HTTP: ./marketo-mcp (default)
/// Run the data agent over MCP:    MCP_AGENT=data MCP_MODE=jsonrpc ./marketo-mcp
use anyhow::{anyhow, Result};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use marketo_core::{ActionAgent, DataAgent, MarketoClient, Settings};
use marketo_mcp::{http, rpc, ActionTools, DataTools, ToolProvider};

#[tokio::main]
async fn main() -> Result<()> {
    // stdout is reserved for JSON-RPC frames
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::load()?;
    let client = Arc::new(MarketoClient::from_settings(&settings.marketo)?);
    let credentials = client.tokens().credentials();
    tracing::info!(
        "Marketo client {} against {}",
        credentials.client_id(),
        credentials.rest_base()
    );

    let agent = std::env::var("MCP_AGENT").unwrap_or_else(|_| "action".to_string());
    let (provider, port): (Arc<dyn ToolProvider>, u16) = match agent.as_str() {
        "data" => (
            Arc::new(DataTools::new(DataAgent::new(client))),
            settings.mcp.data_agent_port,
        ),
        "action" => (
            Arc::new(ActionTools::new(ActionAgent::new(client))),
            settings.mcp.action_agent_port,
        ),
        other => return Err(anyhow!("Unknown MCP_AGENT: {} (expected data or action)", other)),
    };

    let mode = std::env::var("MCP_MODE").unwrap_or_else(|_| "http".to_string());
    match mode.as_str() {
        "jsonrpc" => {
            tracing::info!("[MCP] {} serving JSON-RPC on stdio", provider.name());
            rpc::run_stdio(provider.as_ref()).await
        }
        _ => start_http_server(provider, &settings.mcp.host, port).await,
    }
}

/// Start HTTP server
async fn start_http_server(provider: Arc<dyn ToolProvider>, host: &str, port: u16) -> Result<()> {
    let tools = provider.tools();
    let name = provider.name();
    let app = http::router(provider);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;

    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║           Marketo MCP Server - HTTP                        ║");
    println!("╚════════════════════════════════════════════════════════════╝\n");
    println!("✓ {} listening on http://{}:{}\n", name, host, port);
    println!("Endpoints:");
    println!("  GET    http://{}:{}/health", host, port);
    println!("  GET    http://{}:{}/tools", host, port);
    println!("  POST   http://{}:{}/tool", host, port);
    println!("  POST   http://{}:{}/mcp", host, port);
    for tool in &tools {
        println!("  POST   http://{}:{}/tools/{}", host, port, tool.name);
    }
    println!();

    axum::serve(listener, app).await?;

    Ok(())
}
