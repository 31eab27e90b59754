//! JSON-RPC 2.0 framing for MCP clients
//!
//! One message per line on stdio, or one message per `POST /mcp` body.

use anyhow::Result;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::tools::ToolProvider;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i64 = -32700;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

fn success(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

fn failure(id: Value, code: i64, message: impl std::fmt::Display) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": code,
            "message": message.to_string()
        }
    })
}

/// Handle one decoded message. Notifications (no `id`) produce `None`.
pub async fn handle_message(provider: &dyn ToolProvider, request: Value) -> Option<Value> {
    let id = request.get("id").cloned();
    let method = request
        .get("method")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let Some(id) = id else {
        tracing::debug!("[RPC] notification {}", method);
        return None;
    };

    let response = match method.as_str() {
        "initialize" => success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "serverInfo": {
                    "name": provider.name(),
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        ),

        "ping" => success(id, json!({})),

        "tools/list" => success(id, json!({ "tools": provider.tools() })),

        "tools/call" => {
            let params = request.get("params").cloned().unwrap_or(json!({}));
            let Some(tool_name) = params.get("name").and_then(|v| v.as_str()) else {
                return Some(failure(id, INVALID_PARAMS, "Missing tool name"));
            };
            if !provider.has_tool(tool_name) {
                return Some(failure(
                    id,
                    INVALID_PARAMS,
                    format!("Unknown tool: {}", tool_name),
                ));
            }
            let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

            match provider.call(tool_name, arguments).await {
                Ok(result) => success(
                    id,
                    json!({
                        "content": [{
                            "type": "text",
                            "text": result.to_string()
                        }],
                        "isError": false
                    }),
                ),
                Err(e) => {
                    tracing::warn!("[RPC] {} failed: {}", tool_name, e);
                    success(
                        id,
                        json!({
                            "content": [{
                                "type": "text",
                                "text": e.to_string()
                            }],
                            "isError": true
                        }),
                    )
                }
            }
        }

        _ => failure(id, METHOD_NOT_FOUND, format!("Method not found: {}", method)),
    };

    Some(response)
}

/// Handle one raw line. Unparsable input gets a `-32700` with a null id.
pub async fn handle_line(provider: &dyn ToolProvider, line: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(line) {
        Ok(request) => handle_message(provider, request).await,
        Err(e) => Some(failure(Value::Null, PARSE_ERROR, format!("Parse error: {}", e))),
    }
}

/// Serve JSON-RPC over stdin/stdout until stdin closes.
pub async fn run_stdio(provider: &dyn ToolProvider) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(response) = handle_line(provider, &line).await {
            stdout.write_all(response.to_string().as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ActionTools;
    use marketo_core::test_utils::MockMarketo;
    use marketo_core::ActionAgent;

    fn action_tools(mock: &MockMarketo) -> ActionTools {
        ActionTools::new(ActionAgent::new(mock.client()))
    }

    #[tokio::test]
    async fn test_initialize_reports_server_info() {
        let mock = MockMarketo::start().await;
        let tools = action_tools(&mock);

        let response = handle_message(
            &tools,
            json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {} }),
        )
        .await
        .unwrap();

        assert_eq!(response["id"], json!(1));
        assert_eq!(response["result"]["protocolVersion"], json!(PROTOCOL_VERSION));
        assert_eq!(
            response["result"]["serverInfo"]["name"],
            json!("marketo-action-agent")
        );
    }

    #[tokio::test]
    async fn test_tools_list_exposes_input_schema() {
        let mock = MockMarketo::start().await;
        let tools = action_tools(&mock);

        let response = handle_message(&tools, json!({ "jsonrpc": "2.0", "id": "a", "method": "tools/list" }))
            .await
            .unwrap();

        let listed = response["result"]["tools"].as_array().unwrap();
        let names: Vec<&str> = listed.iter().filter_map(|t| t["name"].as_str()).collect();
        assert_eq!(names, vec!["trigger_campaign", "update_smart_list", "get_campaign"]);
        assert_eq!(listed[0]["inputSchema"]["type"], json!("object"));
    }

    #[tokio::test]
    async fn test_tool_call_returns_text_content() {
        let mock = MockMarketo::start().await;
        let tools = action_tools(&mock);

        let response = handle_message(
            &tools,
            json!({
                "jsonrpc": "2.0",
                "id": 7,
                "method": "tools/call",
                "params": { "name": "get_campaign", "arguments": { "campaign_id": 6120 } }
            }),
        )
        .await
        .unwrap();

        let result = &response["result"];
        assert_eq!(result["isError"], json!(false));
        let text = result["content"][0]["text"].as_str().unwrap();
        let body: Value = serde_json::from_str(text).unwrap();
        assert_eq!(body["path"], json!("/asset/v1/smartCampaign/6120.json"));
    }

    #[tokio::test]
    async fn test_tool_failure_is_error_content() {
        let mock = MockMarketo::start().await;
        let tools = action_tools(&mock);

        let response = handle_message(
            &tools,
            json!({
                "jsonrpc": "2.0",
                "id": 8,
                "method": "tools/call",
                "params": {
                    "name": "trigger_campaign",
                    "arguments": { "campaign_id": "abc", "input_payload": {} }
                }
            }),
        )
        .await
        .unwrap();

        assert_eq!(response["result"]["isError"], json!(true));
        assert!(response.get("error").is_none());
        assert_eq!(mock.resource_calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_invalid_params() {
        let mock = MockMarketo::start().await;
        let tools = action_tools(&mock);

        let response = handle_message(
            &tools,
            json!({
                "jsonrpc": "2.0",
                "id": 9,
                "method": "tools/call",
                "params": { "name": "get_smart_list", "arguments": { "smart_list_id": 1 } }
            }),
        )
        .await
        .unwrap();

        assert_eq!(response["error"]["code"], json!(INVALID_PARAMS));
    }

    #[tokio::test]
    async fn test_unknown_method_and_notification() {
        let mock = MockMarketo::start().await;
        let tools = action_tools(&mock);

        let response = handle_message(&tools, json!({ "jsonrpc": "2.0", "id": 2, "method": "resources/list" }))
            .await
            .unwrap();
        assert_eq!(response["error"]["code"], json!(METHOD_NOT_FOUND));

        let notification = handle_message(
            &tools,
            json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }),
        )
        .await;
        assert!(notification.is_none());
    }

    #[tokio::test]
    async fn test_garbage_line_is_parse_error() {
        let mock = MockMarketo::start().await;
        let tools = action_tools(&mock);

        let response = handle_line(&tools, "{not json").await.unwrap();
        assert_eq!(response["error"]["code"], json!(PARSE_ERROR));
        assert_eq!(response["id"], Value::Null);
    }
}
