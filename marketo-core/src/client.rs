//! Marketo REST client
//!
//! Builds bearer-authenticated requests against `rest_base` and returns the
//! provider's JSON untouched. A single failed call surfaces immediately: there
//! is no retry, backoff or circuit breaking at this layer.

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::auth::{Credentials, TokenManager};
use crate::config::MarketoSettings;
use crate::error::{Error, Result};
use crate::ids::{CampaignId, Pagination, SmartListId};

/// Per-call timeouts for the two endpoint families.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub token: Duration,
    pub request: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            token: Duration::from_secs(10),
            request: Duration::from_secs(15),
        }
    }
}

pub struct MarketoClient {
    http: reqwest::Client,
    tokens: TokenManager,
    rest_base: String,
    request_timeout: Duration,
}

impl MarketoClient {
    pub fn new(credentials: Credentials, timeouts: Timeouts) -> Self {
        let http = reqwest::Client::new();
        let rest_base = credentials.rest_base().to_string();
        Self {
            tokens: TokenManager::new(credentials, http.clone(), timeouts.token),
            http,
            rest_base,
            request_timeout: timeouts.request,
        }
    }

    pub fn from_settings(settings: &MarketoSettings) -> Result<Self> {
        let timeouts = Timeouts {
            token: settings.token_timeout(),
            request: settings.request_timeout(),
        };
        Ok(Self::new(settings.credentials()?, timeouts))
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn rest_base(&self) -> &str {
        &self.rest_base
    }

    /// Issue one authenticated call against `rest_base + path`.
    pub async fn request<Q>(
        &self,
        method: Method,
        path: &str,
        query: Option<&Q>,
        body: Option<&Value>,
    ) -> Result<Value>
    where
        Q: Serialize + ?Sized,
    {
        let token = self.tokens.ensure_token().await?;
        let url = format!("{}{}", self.rest_base, path);
        tracing::info!("→ Marketo {} {}", method, path);

        let mut builder = self
            .http
            .request(method.clone(), &url)
            .bearer_auth(&token)
            .timeout(self.request_timeout);

        if let Some(query) = query {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::transport(&url, e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::transport(&url, e))?;

        if !status.is_success() {
            tracing::warn!("✗ Marketo {} {} returned {}", method, path, status);
            return Err(Error::Api {
                status: Some(status.as_u16()),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn get(&self, path: &str) -> Result<Value> {
        self.request::<()>(Method::GET, path, None, None).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.request::<()>(Method::POST, path, None, Some(body)).await
    }

    /// GET /asset/v1/smartCampaign/{id}.json
    pub async fn get_campaign(&self, campaign_id: &CampaignId) -> Result<Value> {
        self.get(&format!("/asset/v1/smartCampaign/{}.json", campaign_id.path_segment()))
            .await
    }

    /// GET /rest/asset/v1/smart/list/{id}.json
    pub async fn get_smart_list(&self, smart_list_id: SmartListId) -> Result<Value> {
        self.get(&format!("/rest/asset/v1/smart/list/{}.json", smart_list_id))
            .await
    }

    /// GET /rest/v1/campaigns/{id}/members.json?offset=..&maxReturn=..
    pub async fn get_campaign_members(
        &self,
        campaign_id: &CampaignId,
        page: Pagination,
    ) -> Result<Value> {
        let path = format!("/rest/v1/campaigns/{}/members.json", campaign_id.path_segment());
        let query = [("offset", page.offset), ("maxReturn", page.max_return)];
        self.request(Method::GET, &path, Some(&query[..]), None).await
    }

    /// POST /rest/v1/campaigns/{id}/trigger.json
    ///
    /// `payload` follows Marketo's trigger shape, e.g. `{"input": [{"id": leadId}]}`.
    pub async fn trigger_campaign(&self, campaign_id: &CampaignId, payload: &Value) -> Result<Value> {
        self.post(&format!("/rest/v1/campaigns/{}/trigger.json", campaign_id.path_segment()), payload)
            .await
    }

    /// POST /rest/asset/v1/smart/list/{id}.json
    pub async fn update_smart_list(&self, smart_list_id: SmartListId, payload: &Value) -> Result<Value> {
        self.post(&format!("/rest/asset/v1/smart/list/{}.json", smart_list_id), payload)
            .await
    }
}
