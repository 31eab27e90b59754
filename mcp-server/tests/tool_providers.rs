use marketo_core::test_utils::MockMarketo;
use marketo_core::{ActionAgent, DataAgent, Error};
use marketo_mcp::{ActionTools, DataTools, ToolProvider};
use serde_json::json;

#[tokio::test]
async fn data_tools_route_to_read_endpoints() {
    let mock = MockMarketo::start().await;
    let tools = DataTools::new(DataAgent::new(mock.client()));

    tools
        .call("get_campaign_details", json!({ "campaign_id": 6120 }))
        .await
        .unwrap();
    tools
        .call("get_smart_list", json!({ "smart_list_id": 31 }))
        .await
        .unwrap();
    tools
        .call("get_campaign_members", json!({ "campaign_id": "6120" }))
        .await
        .unwrap();

    let paths: Vec<String> = mock.requests().into_iter().map(|r| r.path).collect();
    assert_eq!(
        paths,
        vec![
            "/asset/v1/smartCampaign/6120.json",
            "/rest/asset/v1/smart/list/31.json",
            "/rest/v1/campaigns/6120/members.json",
        ]
    );
    // one grant shared by all three calls
    assert_eq!(mock.token_calls(), 1);
}

#[tokio::test]
async fn action_tools_trigger_with_payload() {
    let mock = MockMarketo::start().await;
    let tools = ActionTools::new(ActionAgent::new(mock.client()));
    let payload = json!({ "input": [{ "id": 318581 }] });

    let result = tools
        .call(
            "trigger_campaign",
            json!({ "campaign_id": "1029", "input_payload": payload }),
        )
        .await
        .unwrap();

    assert_eq!(result["success"], json!(true));
    let request = &mock.requests()[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/rest/v1/campaigns/1029/trigger.json");
    assert_eq!(request.body, Some(payload));
}

#[tokio::test]
async fn providers_reject_each_others_tools() {
    let mock = MockMarketo::start().await;
    let data = DataTools::new(DataAgent::new(mock.client()));
    let action = ActionTools::new(ActionAgent::new(mock.client()));

    assert!(!data.has_tool("trigger_campaign"));
    assert!(!action.has_tool("get_smart_list"));

    let err = data
        .call("update_smart_list", json!({ "smart_list_id": 1 }))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(ref msg) if msg.contains("Unknown tool")));
    assert_eq!(mock.resource_calls(), 0);
}

#[tokio::test]
async fn missing_required_argument_is_validation_error() {
    let mock = MockMarketo::start().await;
    let tools = ActionTools::new(ActionAgent::new(mock.client()));

    let err = tools.call("get_campaign", json!({})).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(mock.token_calls(), 0);
}
