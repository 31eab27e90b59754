//! Marketo MCP Server Library
//!
//! Exposes the Marketo façades as MCP tools:
//! - data agent: get_campaign_details, get_smart_list, get_campaign_members
//! - action agent: trigger_campaign, update_smart_list, get_campaign
//!
//! Tools are reachable over JSON-RPC (stdio or `POST /mcp`) and over plain HTTP.

pub mod http;
pub mod rpc;
pub mod tools;

use marketo_core::{CampaignId, SmartListId};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use tools::{ActionTools, DataTools, ToolDefinition, ToolProvider};

/// Arguments for tools addressing a single campaign
#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct CampaignArgs {
    /// Marketo campaign id
    pub campaign_id: CampaignId,
}

/// Arguments for listing campaign members
#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct CampaignMembersArgs {
    /// Marketo campaign id
    pub campaign_id: CampaignId,
    /// Offset into the member list (page size is 200)
    #[serde(default)]
    pub offset: u32,
}

/// Arguments for tools addressing a single smart list
#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct SmartListArgs {
    /// Marketo smart list id
    pub smart_list_id: SmartListId,
}

/// Arguments for triggering a campaign
#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct TriggerCampaignArgs {
    /// Marketo campaign id (must be an integer)
    pub campaign_id: CampaignId,
    /// Trigger payload, e.g. {"input": [{"id": 318581}]}
    #[serde(default = "empty_object")]
    pub input_payload: Value,
}

/// Arguments for updating a smart list
#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct UpdateSmartListArgs {
    /// Marketo smart list id
    pub smart_list_id: SmartListId,
    /// Fields to update
    #[serde(default = "empty_object")]
    pub payload: Value,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_args_schema() {
        let schema = schemars::schema_for!(TriggerCampaignArgs);
        let object = schema.schema.object.as_ref().unwrap();
        assert!(object.required.contains("campaign_id"));
        assert!(!object.required.contains("input_payload"));
    }

    #[test]
    fn test_trigger_args_default_payload() {
        let args: TriggerCampaignArgs =
            serde_json::from_value(serde_json::json!({ "campaign_id": 1029 })).unwrap();
        assert_eq!(args.campaign_id.as_integer(), Some(1029));
        assert_eq!(args.input_payload, serde_json::json!({}));
    }
}
