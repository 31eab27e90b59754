//! Read and write façades over the REST client
//!
//! These are the stable, narrow entry points that tool servers and HTTP routes
//! call. They stay deliberately thin: the provider is the source of truth for
//! payload correctness, so the only local check is the integer campaign id
//! required before triggering a campaign.

use serde_json::Value;
use std::sync::Arc;

use crate::client::MarketoClient;
use crate::error::{Error, Result};
use crate::ids::{CampaignId, Pagination, SmartListId};

/// Read-only Marketo operations.
#[derive(Clone)]
pub struct DataAgent {
    client: Arc<MarketoClient>,
}

impl DataAgent {
    pub fn new(client: Arc<MarketoClient>) -> Self {
        Self { client }
    }

    pub async fn get_campaign_details(&self, campaign_id: &CampaignId) -> Result<Value> {
        self.client.get_campaign(campaign_id).await
    }

    pub async fn get_smart_list(&self, smart_list_id: SmartListId) -> Result<Value> {
        self.client.get_smart_list(smart_list_id).await
    }

    pub async fn get_campaign_members(&self, campaign_id: &CampaignId, offset: u32) -> Result<Value> {
        self.client
            .get_campaign_members(campaign_id, Pagination::from_offset(offset))
            .await
    }
}

/// Write/trigger operations, plus the campaign lookup actions need for context.
#[derive(Clone)]
pub struct ActionAgent {
    client: Arc<MarketoClient>,
}

impl ActionAgent {
    pub fn new(client: Arc<MarketoClient>) -> Self {
        Self { client }
    }

    pub async fn get_campaign(&self, campaign_id: &CampaignId) -> Result<Value> {
        self.client.get_campaign(campaign_id).await
    }

    /// Trigger a campaign. The id must be an integer; this is checked before
    /// any token or REST call is made.
    pub async fn trigger_campaign(&self, campaign_id: &CampaignId, input_payload: &Value) -> Result<Value> {
        if campaign_id.as_integer().is_none() {
            return Err(Error::Validation(format!(
                "campaign_id must be an integer, got {:?}",
                campaign_id.as_str()
            )));
        }
        self.client.trigger_campaign(campaign_id, input_payload).await
    }

    pub async fn update_smart_list(&self, smart_list_id: SmartListId, payload: &Value) -> Result<Value> {
        self.client.update_smart_list(smart_list_id, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockMarketo;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_expired_token_is_replaced_between_calls() {
        let mock = MockMarketo::builder()
            .tokens(["T1", "T2"])
            .expires_in(Some(1))
            .start()
            .await;
        let agent = ActionAgent::new(mock.client());

        agent.get_campaign(&CampaignId::from("6120")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        agent.get_campaign(&CampaignId::from("6120")).await.unwrap();

        let requests = mock.requests();
        assert_eq!(mock.token_calls(), 2);
        assert_eq!(requests[0].authorization.as_deref(), Some("Bearer T1"));
        assert_eq!(requests[1].authorization.as_deref(), Some("Bearer T2"));
    }

    #[tokio::test]
    async fn test_trigger_rejects_non_integer_id_before_network() {
        let mock = MockMarketo::start().await;
        let agent = ActionAgent::new(mock.client());

        let err = agent
            .trigger_campaign(&CampaignId::from("summer-promo"), &json!({ "input": [] }))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(mock.token_calls(), 0);
        assert_eq!(mock.resource_calls(), 0);
    }

    #[tokio::test]
    async fn test_trigger_with_integer_id_reaches_provider() {
        let mock = MockMarketo::start().await;
        let agent = ActionAgent::new(mock.client());
        let payload = json!({ "input": [{ "id": 42 }] });

        let response = agent
            .trigger_campaign(&CampaignId::from(1029), &payload)
            .await
            .unwrap();

        assert_eq!(response["path"], json!("/rest/v1/campaigns/1029/trigger.json"));
        assert_eq!(mock.requests()[0].body, Some(payload));
    }

    #[tokio::test]
    async fn test_missing_smart_list_surfaces_api_error() {
        let mock = MockMarketo::builder()
            .respond("/rest/asset/v1/smart/list/999.json", 404, json!({ "success": false }))
            .start()
            .await;
        let agent = DataAgent::new(mock.client());

        let err = agent.get_smart_list(999).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn test_data_agent_members_use_default_page_size() {
        let mock = MockMarketo::start().await;
        let agent = DataAgent::new(mock.client());

        agent.get_campaign_members(&CampaignId::from(5), 200).await.unwrap();
        agent.get_campaign_details(&CampaignId::from(5)).await.unwrap();

        let requests = mock.requests();
        let query = requests[0].query.as_deref().unwrap_or_default();
        assert!(query.contains("offset=200"));
        assert!(query.contains("maxReturn=200"));
        assert_eq!(requests[1].path, "/asset/v1/smartCampaign/5.json");
    }

    #[tokio::test]
    async fn test_update_smart_list_passes_payload_through() {
        let mock = MockMarketo::start().await;
        let agent = ActionAgent::new(mock.client());

        agent
            .update_smart_list(3, &json!({ "description": "anything goes" }))
            .await
            .unwrap();
        let request = &mock.requests()[0];
        assert_eq!(request.method, "POST");
        assert_eq!(request.body, Some(json!({ "description": "anything goes" })));
    }
}
