//! Text command parsing for the bridge
//!
//! Commands look like `<verb> <id> [offset]`. Verbs are case-insensitive.

use marketo_core::{ActionAgent, CampaignId, DataAgent, Error, Result, SmartListId};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum DataCommand {
    CampaignDetails(CampaignId),
    SmartList(SmartListId),
    CampaignMembers { campaign_id: CampaignId, offset: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionCommand {
    Trigger { campaign_id: CampaignId, payload: Value },
    UpdateSmartList { smart_list_id: SmartListId, payload: Value },
    GetCampaign(CampaignId),
}

fn split(command: &str) -> (String, Vec<&str>) {
    let mut parts = command.split_whitespace();
    let verb = parts.next().unwrap_or_default().to_lowercase();
    (verb, parts.collect())
}

fn campaign_id(args: &[&str]) -> Result<CampaignId> {
    args.first()
        .map(|id| CampaignId::from(*id))
        .ok_or_else(|| Error::Validation("missing campaign id".to_string()))
}

fn smart_list_id(args: &[&str]) -> Result<SmartListId> {
    let raw = args
        .first()
        .ok_or_else(|| Error::Validation("missing smart list id".to_string()))?;
    raw.parse()
        .map_err(|_| Error::Validation(format!("smart list id must be an integer, got {:?}", raw)))
}

fn offset(args: &[&str]) -> Result<u32> {
    match args.get(1) {
        None => Ok(0),
        Some(raw) => raw
            .parse()
            .map_err(|_| Error::Validation(format!("offset must be a non-negative integer, got {:?}", raw))),
    }
}

impl DataCommand {
    pub fn parse(command: &str) -> Result<Self> {
        let (verb, args) = split(command);
        match verb.as_str() {
            "get_campaign_details" | "get_campaign" | "campaign" => {
                Ok(Self::CampaignDetails(campaign_id(&args)?))
            }
            "get_smart_list" | "smartlist" => Ok(Self::SmartList(smart_list_id(&args)?)),
            "get_campaign_members" | "members" => Ok(Self::CampaignMembers {
                campaign_id: campaign_id(&args)?,
                offset: offset(&args)?,
            }),
            _ => Err(Error::Validation("Unrecognized data command".to_string())),
        }
    }

    pub fn tool_name(&self) -> &'static str {
        match self {
            Self::CampaignDetails(_) => "get_campaign_details",
            Self::SmartList(_) => "get_smart_list",
            Self::CampaignMembers { .. } => "get_campaign_members",
        }
    }

    pub fn tool_args(&self) -> Value {
        match self {
            Self::CampaignDetails(id) => json!({ "campaign_id": id }),
            Self::SmartList(id) => json!({ "smart_list_id": id }),
            Self::CampaignMembers { campaign_id, offset } => {
                json!({ "campaign_id": campaign_id, "offset": offset })
            }
        }
    }

    pub async fn run(&self, agent: &DataAgent) -> Result<Value> {
        match self {
            Self::CampaignDetails(id) => agent.get_campaign_details(id).await,
            Self::SmartList(id) => agent.get_smart_list(*id).await,
            Self::CampaignMembers { campaign_id, offset } => {
                agent.get_campaign_members(campaign_id, *offset).await
            }
        }
    }
}

impl ActionCommand {
    /// A missing payload is sent as `{}`.
    pub fn parse(command: &str, payload: Option<Value>) -> Result<Self> {
        let (verb, args) = split(command);
        let payload = payload.unwrap_or_else(|| json!({}));
        match verb.as_str() {
            "trigger_campaign" | "trigger" => Ok(Self::Trigger {
                campaign_id: campaign_id(&args)?,
                payload,
            }),
            "update_smart_list" | "update" => Ok(Self::UpdateSmartList {
                smart_list_id: smart_list_id(&args)?,
                payload,
            }),
            "get_campaign" => Ok(Self::GetCampaign(campaign_id(&args)?)),
            _ => Err(Error::Validation("Unrecognized action command".to_string())),
        }
    }

    pub fn tool_name(&self) -> &'static str {
        match self {
            Self::Trigger { .. } => "trigger_campaign",
            Self::UpdateSmartList { .. } => "update_smart_list",
            Self::GetCampaign(_) => "get_campaign",
        }
    }

    pub fn tool_args(&self) -> Value {
        match self {
            Self::Trigger { campaign_id, payload } => {
                json!({ "campaign_id": campaign_id, "input_payload": payload })
            }
            Self::UpdateSmartList { smart_list_id, payload } => {
                json!({ "smart_list_id": smart_list_id, "payload": payload })
            }
            Self::GetCampaign(id) => json!({ "campaign_id": id }),
        }
    }

    pub async fn run(&self, agent: &ActionAgent) -> Result<Value> {
        match self {
            Self::Trigger { campaign_id, payload } => {
                agent.trigger_campaign(campaign_id, payload).await
            }
            Self::UpdateSmartList { smart_list_id, payload } => {
                agent.update_smart_list(*smart_list_id, payload).await
            }
            Self::GetCampaign(id) => agent.get_campaign(id).await,
        }
    }
}
