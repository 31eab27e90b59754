//! HTTP transport for a tool provider
//!
//! `POST /tool` with `{tool, args}` is the convention the backend bridge uses;
//! `POST /tools/:name` takes the arguments as the whole body.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use marketo_core::Error;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::rpc;
use crate::tools::ToolProvider;

type SharedProvider = Arc<dyn ToolProvider>;

/// HTTP Response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct HttpResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> HttpResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
        }
    }
}

/// Body of `POST /tool`
#[derive(Debug, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub args: Value,
}

/// HTTP status for a failed tool call.
pub fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::Api { status: Some(_), .. } | Error::Auth(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn router(provider: SharedProvider) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tools", get(list_tools))
        .route("/tool", post(call_tool))
        .route("/tools/:name", post(call_named_tool))
        .route("/mcp", post(mcp_message))
        .layer(CorsLayer::permissive())
        .with_state(provider)
}

async fn health(State(provider): State<SharedProvider>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": provider.name(),
        "protocols": ["http", "jsonrpc-stdio"],
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn list_tools(State(provider): State<SharedProvider>) -> Json<Value> {
    Json(json!({ "tools": provider.tools() }))
}

async fn call_tool(
    State(provider): State<SharedProvider>,
    Json(req): Json<ToolCall>,
) -> Response {
    dispatch(provider.as_ref(), &req.tool, req.args).await
}

async fn call_named_tool(
    State(provider): State<SharedProvider>,
    Path(name): Path<String>,
    body: Option<Json<Value>>,
) -> Response {
    let args = body.map(|Json(v)| v).unwrap_or(Value::Null);
    dispatch(provider.as_ref(), &name, args).await
}

async fn dispatch(provider: &dyn ToolProvider, tool: &str, args: Value) -> Response {
    if !provider.has_tool(tool) {
        return (
            StatusCode::NOT_FOUND,
            Json(HttpResponse::<()>::err(format!("Unknown tool: {}", tool))),
        )
            .into_response();
    }

    match provider.call(tool, args).await {
        Ok(result) => (StatusCode::OK, Json(HttpResponse::ok(result))).into_response(),
        Err(e) => {
            tracing::warn!("[HTTP] {} failed: {}", tool, e);
            (status_for(&e), Json(HttpResponse::<()>::err(e))).into_response()
        }
    }
}

async fn mcp_message(State(provider): State<SharedProvider>, body: String) -> Response {
    match rpc::handle_line(provider.as_ref(), &body).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}
