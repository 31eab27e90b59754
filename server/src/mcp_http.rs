//! HTTP calls to the data/action tool servers
//!
//! Uses the tool servers' `POST /tool {tool, args}` contract and unwraps the
//! `{success, data, error}` envelope.

use marketo_core::config::McpSettings;
use serde_json::{json, Value};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum McpError {
    /// No connection could be made. Nothing reached the tool server.
    #[error("MCP server unreachable: {0}")]
    Unreachable(String),

    /// The tool server answered with a failure, or the exchange broke after
    /// the request was sent.
    #[error("{0}")]
    Tool(String),
}

#[derive(Debug, Clone)]
pub struct McpRoutes {
    http: reqwest::Client,
    data_url: String,
    action_url: String,
    timeout: Duration,
}

impl McpRoutes {
    pub fn new(data_url: impl Into<String>, action_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            data_url: data_url.into().trim_end_matches('/').to_string(),
            action_url: action_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn from_settings(settings: &McpSettings) -> Self {
        Self::new(
            settings.data_agent_url(),
            settings.action_agent_url(),
            settings.call_timeout(),
        )
    }

    pub fn data_url(&self) -> &str {
        &self.data_url
    }

    pub fn action_url(&self) -> &str {
        &self.action_url
    }

    /// Call `tool` on the server at `base_url` and return its `data` payload.
    pub async fn call(&self, base_url: &str, tool: &str, args: Value) -> Result<Value, McpError> {
        let url = format!("{}/tool", base_url);
        tracing::info!("[MCP] → {} {}", url, tool);

        let response = self
            .http
            .post(&url)
            .json(&json!({ "tool": tool, "args": args }))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    McpError::Unreachable(e.without_url().to_string())
                } else if e.is_timeout() {
                    McpError::Tool(format!("MCP call to {} timed out", tool))
                } else {
                    McpError::Tool(format!("MCP call to {} failed: {}", tool, e.without_url()))
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| McpError::Tool(format!("MCP response from {} unreadable: {}", tool, e)))?;
        let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);

        let succeeded = body.get("success").and_then(Value::as_bool).unwrap_or(false);
        if !status.is_success() || !succeeded {
            let message = body
                .get("error")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("MCP server returned {}: {}", status, text));
            return Err(McpError::Tool(message));
        }

        Ok(body.get("data").cloned().unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_closed_port_is_unreachable() {
        // bind then drop to get a port nobody is listening on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let routes = McpRoutes::new(format!("http://{}", addr), "http://unused", Duration::from_secs(2));
        let err = routes
            .call(routes.data_url(), "get_smart_list", json!({ "smart_list_id": 1 }))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::Unreachable(_)));
    }

    #[test]
    fn test_urls_are_trimmed() {
        let routes = McpRoutes::new("http://127.0.0.1:8001/", "http://127.0.0.1:8002", Duration::from_secs(1));
        assert_eq!(routes.data_url(), "http://127.0.0.1:8001");
        assert_eq!(routes.action_url(), "http://127.0.0.1:8002");
    }
}
