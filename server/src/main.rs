/// Marketo backend - HTTP bridge between a frontend and the tool servers
///
/// Run with: ./marketo-backend
/// Set BACKEND_USE_MCP=false to skip the tool servers and call the agents in-process.
use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use marketo_backend::{router, AppState, McpRoutes};
use marketo_core::{ActionAgent, DataAgent, HistoryStore, MarketoClient, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::load()?;
    let client = Arc::new(MarketoClient::from_settings(&settings.marketo)?);

    let history = HistoryStore::open(&settings.memory.db_path)
        .await?
        .with_retention(settings.memory.retention);
    history.initialize().await?;

    let mcp = settings
        .server
        .use_mcp
        .then(|| McpRoutes::from_settings(&settings.mcp));

    let state = Arc::new(AppState {
        data: DataAgent::new(client.clone()),
        action: ActionAgent::new(client.clone()),
        history: Arc::new(history),
        mcp,
    });

    let host = &settings.server.host;
    let port = settings.server.port;
    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;

    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║           Marketo Backend - HTTP Bridge                    ║");
    println!("╚════════════════════════════════════════════════════════════╝\n");
    println!("✓ Server listening on http://{}:{}\n", host, port);
    println!(
        "Marketo: client {} at {}\n",
        client.tokens().credentials().client_id(),
        client.rest_base()
    );
    match &state.mcp {
        Some(routes) => println!(
            "Tool servers: data {} / action {}\n",
            routes.data_url(),
            routes.action_url()
        ),
        None => println!("Tool servers: disabled (direct agent calls)\n"),
    }
    println!("Endpoints:");
    println!("  GET    http://{}:{}/health", host, port);
    println!("  POST   http://{}:{}/query", host, port);
    println!("  POST   http://{}:{}/action", host, port);
    println!("  GET    http://{}:{}/history?limit=20\n", host, port);

    axum::serve(listener, router(state)).await?;

    Ok(())
}
