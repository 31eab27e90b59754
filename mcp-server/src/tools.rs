//! Tool registry over the bare façades
//!
//! `DataAgent` and `ActionAgent` know nothing about tools. The providers here
//! wrap them by composition, giving each operation a stable name and a JSON
//! schema generated from its argument struct.

use async_trait::async_trait;
use marketo_core::{ActionAgent, DataAgent, Error, Result};
use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::{
    CampaignArgs, CampaignMembersArgs, SmartListArgs, TriggerCampaignArgs, UpdateSmartListArgs,
};

/// Tool Definition
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl ToolDefinition {
    pub fn new<T: JsonSchema>(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema: input_schema::<T>(),
        }
    }
}

fn input_schema<T: JsonSchema>() -> Value {
    let generator = SchemaSettings::draft07()
        .with(|s| s.inline_subschemas = true)
        .into_generator();
    let schema = generator.into_root_schema_for::<T>();
    serde_json::to_value(schema).unwrap_or_else(|_| json!({ "type": "object" }))
}

/// Decode tool arguments; a missing argument object counts as `{}`.
fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T> {
    let arguments = if arguments.is_null() {
        json!({})
    } else {
        arguments
    };
    serde_json::from_value(arguments)
        .map_err(|e| Error::Validation(format!("invalid arguments for {}: {}", tool, e)))
}

fn unknown_tool(name: &str) -> Error {
    Error::Validation(format!("Unknown tool: {}", name))
}

/// A named set of callable tools.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Server name reported to MCP clients
    fn name(&self) -> &'static str;

    fn tools(&self) -> Vec<ToolDefinition>;

    async fn call(&self, tool: &str, arguments: Value) -> Result<Value>;

    fn has_tool(&self, tool: &str) -> bool {
        self.tools().iter().any(|t| t.name == tool)
    }
}

/// Read-only tools backed by `DataAgent`
pub struct DataTools {
    agent: DataAgent,
}

impl DataTools {
    pub fn new(agent: DataAgent) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl ToolProvider for DataTools {
    fn name(&self) -> &'static str {
        "marketo-data-agent"
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::new::<CampaignArgs>(
                "get_campaign_details",
                "Fetch smart campaign asset details from Marketo",
            ),
            ToolDefinition::new::<SmartListArgs>(
                "get_smart_list",
                "Fetch a smart list asset from Marketo",
            ),
            ToolDefinition::new::<CampaignMembersArgs>(
                "get_campaign_members",
                "List members of a campaign, 200 per page starting at offset",
            ),
        ]
    }

    async fn call(&self, tool: &str, arguments: Value) -> Result<Value> {
        tracing::info!("[TOOL] {} called", tool);
        match tool {
            "get_campaign_details" => {
                let args: CampaignArgs = parse_args(tool, arguments)?;
                self.agent.get_campaign_details(&args.campaign_id).await
            }
            "get_smart_list" => {
                let args: SmartListArgs = parse_args(tool, arguments)?;
                self.agent.get_smart_list(args.smart_list_id).await
            }
            "get_campaign_members" => {
                let args: CampaignMembersArgs = parse_args(tool, arguments)?;
                self.agent
                    .get_campaign_members(&args.campaign_id, args.offset)
                    .await
            }
            _ => Err(unknown_tool(tool)),
        }
    }
}

/// Write/trigger tools backed by `ActionAgent`
pub struct ActionTools {
    agent: ActionAgent,
}

impl ActionTools {
    pub fn new(agent: ActionAgent) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl ToolProvider for ActionTools {
    fn name(&self) -> &'static str {
        "marketo-action-agent"
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::new::<TriggerCampaignArgs>(
                "trigger_campaign",
                "Trigger a Marketo campaign by id with a trigger payload",
            ),
            ToolDefinition::new::<UpdateSmartListArgs>(
                "update_smart_list",
                "Update a Marketo smart list",
            ),
            ToolDefinition::new::<CampaignArgs>(
                "get_campaign",
                "Retrieve details about a specific Marketo campaign",
            ),
        ]
    }

    async fn call(&self, tool: &str, arguments: Value) -> Result<Value> {
        tracing::info!("[TOOL] {} called", tool);
        match tool {
            "trigger_campaign" => {
                let args: TriggerCampaignArgs = parse_args(tool, arguments)?;
                self.agent
                    .trigger_campaign(&args.campaign_id, &args.input_payload)
                    .await
            }
            "update_smart_list" => {
                let args: UpdateSmartListArgs = parse_args(tool, arguments)?;
                self.agent
                    .update_smart_list(args.smart_list_id, &args.payload)
                    .await
            }
            "get_campaign" => {
                let args: CampaignArgs = parse_args(tool, arguments)?;
                self.agent.get_campaign(&args.campaign_id).await
            }
            _ => Err(unknown_tool(tool)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args_null_is_empty_object() {
        let result: Result<CampaignArgs> = parse_args("get_campaign", Value::Null);
        // campaign_id is required, so an empty object is still rejected
        assert!(matches!(result, Err(Error::Validation(msg)) if msg.contains("get_campaign")));
    }

    #[test]
    fn test_input_schema_inlines_campaign_id() {
        let schema = input_schema::<CampaignArgs>();
        let campaign = &schema["properties"]["campaign_id"];
        assert_eq!(campaign["type"], json!(["integer", "string"]));
        assert_eq!(schema["required"], json!(["campaign_id"]));
    }

    #[test]
    fn test_smart_list_id_must_be_integer() {
        let result: Result<SmartListArgs> =
            parse_args("get_smart_list", json!({ "smart_list_id": "abc" }));
        assert!(matches!(result, Err(Error::Validation(_))));
    }
}
