//! Marketo backend bridge
//!
//! Thin HTTP layer in front of the tool servers:
//!   POST /query   -> data agent (read operations)
//!   POST /action  -> action agent (trigger/update)
//!   GET  /history -> recent interactions from the history store
//!
//! Every request is logged as an `in` record before it is handled and every
//! successful response as an `out` record.

pub mod commands;
pub mod mcp_http;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use marketo_core::{ActionAgent, DataAgent, Direction, HistoryRecord, HistoryStore};

pub use commands::{ActionCommand, DataCommand};
pub use mcp_http::{McpError, McpRoutes};

pub const VIA_MCP: &str = "mcp_http";
pub const VIA_DIRECT: &str = "direct_agent";

const DEFAULT_HISTORY_LIMIT: u32 = 20;

pub struct AppState {
    pub data: DataAgent,
    pub action: ActionAgent,
    pub history: Arc<HistoryStore>,
    /// `None` routes everything to the in-process façades.
    pub mcp: Option<McpRoutes>,
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    Marketo(#[from] marketo_core::Error),

    #[error(transparent)]
    Mcp(#[from] McpError),
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        tracing::error!("[BRIDGE] request failed: {}", self);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": self.to_string() })),
        )
            .into_response()
    }
}

/// Body of `POST /query` and `POST /action`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandPayload {
    pub command: String,
    #[serde(default)]
    pub payload: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub count: usize,
    pub items: Vec<HistoryRecord>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/query", post(query))
        .route("/action", post(action))
        .route("/history", get(history))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CommandPayload>,
) -> Result<Json<Value>, BridgeError> {
    record_request(&state, &req, "query").await?;

    let command = DataCommand::parse(&req.command)?;
    let target = state.mcp.as_ref().map(|m| (m, m.data_url()));
    let (response, via) = dispatch(
        target,
        command.tool_name(),
        command.tool_args(),
        command.run(&state.data),
    )
    .await?;

    record_response(&state, &response, via).await?;
    Ok(Json(response))
}

async fn action(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CommandPayload>,
) -> Result<Json<Value>, BridgeError> {
    record_request(&state, &req, "action").await?;

    let command = ActionCommand::parse(&req.command, req.payload.clone())?;
    let target = state.mcp.as_ref().map(|m| (m, m.action_url()));
    let (response, via) = dispatch(
        target,
        command.tool_name(),
        command.tool_args(),
        command.run(&state.action),
    )
    .await?;

    record_response(&state, &response, via).await?;
    Ok(Json(response))
}

async fn history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, BridgeError> {
    let items = state
        .history
        .recent(params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
        .await?;
    Ok(Json(HistoryResponse {
        count: items.len(),
        items,
    }))
}

/// Try the tool server first; run `direct` only if it cannot be reached.
async fn dispatch<F>(
    target: Option<(&McpRoutes, &str)>,
    tool: &str,
    args: Value,
    direct: F,
) -> Result<(Value, &'static str), BridgeError>
where
    F: Future<Output = marketo_core::Result<Value>>,
{
    if let Some((routes, base_url)) = target {
        match routes.call(base_url, tool, args).await {
            Ok(response) => return Ok((response, VIA_MCP)),
            Err(McpError::Unreachable(reason)) => {
                tracing::warn!(
                    "[BRIDGE] {} unreachable ({}), falling back to direct agent",
                    base_url,
                    reason
                );
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok((direct.await?, VIA_DIRECT))
}

async fn record_request(
    state: &AppState,
    req: &CommandPayload,
    kind: &str,
) -> marketo_core::Result<i64> {
    state
        .history
        .append(
            Utc::now().timestamp(),
            Direction::In,
            &json!({ "command": req.command, "payload": req.payload }),
            Some(&json!({ "type": kind })),
        )
        .await
}

async fn record_response(
    state: &AppState,
    response: &Value,
    via: &str,
) -> marketo_core::Result<i64> {
    state
        .history
        .append(
            Utc::now().timestamp(),
            Direction::Out,
            response,
            Some(&json!({ "via": via })),
        )
        .await
}
