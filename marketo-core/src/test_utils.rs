//! Local stand-in for the Marketo identity and REST endpoints.
//!
//! Binds an axum router on `127.0.0.1:0`, counts identity calls, and records
//! every resource request (method, path, query, bearer header, body) so tests
//! can assert on what actually went over the wire.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::auth::Credentials;
use crate::client::{MarketoClient, Timeouts};

pub const TEST_CLIENT_ID: &str = "test-client";
pub const TEST_CLIENT_SECRET: &str = "test-secret";

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

struct MockState {
    token_calls: AtomicUsize,
    tokens: Vec<String>,
    expires_in: Option<i64>,
    token_status: StatusCode,
    token_delay: Option<Duration>,
    delay: Option<Duration>,
    overrides: HashMap<String, (StatusCode, Value)>,
    requests: Mutex<Vec<RecordedRequest>>,
}

pub struct MockMarketoBuilder {
    tokens: Vec<String>,
    expires_in: Option<i64>,
    token_status: StatusCode,
    token_delay: Option<Duration>,
    delay: Option<Duration>,
    overrides: HashMap<String, (StatusCode, Value)>,
}

impl MockMarketoBuilder {
    /// Tokens handed out by successive grant requests; the last one repeats.
    pub fn tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tokens = tokens.into_iter().map(Into::into).collect();
        self
    }

    /// `None` omits `expires_in` from the identity response.
    pub fn expires_in(mut self, secs: Option<i64>) -> Self {
        self.expires_in = secs;
        self
    }

    pub fn token_status(mut self, status: u16) -> Self {
        self.token_status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        self
    }

    /// Delay every identity response.
    pub fn token_delay(mut self, delay: Duration) -> Self {
        self.token_delay = Some(delay);
        self
    }

    /// Delay every resource response.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fixed response for a resource path, regardless of method.
    pub fn respond(mut self, path: &str, status: u16, body: Value) -> Self {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        self.overrides.insert(path.to_string(), (status, body));
        self
    }

    pub async fn start(self) -> MockMarketo {
        let state = Arc::new(MockState {
            token_calls: AtomicUsize::new(0),
            tokens: self.tokens,
            expires_in: self.expires_in,
            token_status: self.token_status,
            token_delay: self.token_delay,
            delay: self.delay,
            overrides: self.overrides,
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/identity/oauth/token", get(token))
            .fallback(resource)
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock Marketo listener");
        let addr = listener.local_addr().expect("mock listener address");
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        MockMarketo {
            base_url: format!("http://{}", addr),
            state,
            handle,
        }
    }
}

pub struct MockMarketo {
    base_url: String,
    state: Arc<MockState>,
    handle: JoinHandle<()>,
}

impl MockMarketo {
    pub fn builder() -> MockMarketoBuilder {
        MockMarketoBuilder {
            tokens: vec!["T1".to_string()],
            expires_in: Some(3600),
            token_status: StatusCode::OK,
            token_delay: None,
            delay: None,
            overrides: HashMap::new(),
        }
    }

    pub async fn start() -> Self {
        Self::builder().start().await
    }

    pub fn rest_base(&self) -> &str {
        &self.base_url
    }

    pub fn identity_base(&self) -> String {
        format!("{}/identity", self.base_url)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(
            TEST_CLIENT_ID,
            TEST_CLIENT_SECRET,
            &self.identity_base(),
            self.rest_base(),
        )
    }

    pub fn client(&self) -> Arc<MarketoClient> {
        self.client_with(Timeouts::default())
    }

    pub fn client_with(&self, timeouts: Timeouts) -> Arc<MarketoClient> {
        Arc::new(MarketoClient::new(self.credentials(), timeouts))
    }

    pub fn token_calls(&self) -> usize {
        self.state.token_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state
            .requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn resource_calls(&self) -> usize {
        self.requests().len()
    }
}

impl Drop for MockMarketo {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn token(
    State(state): State<Arc<MockState>>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let n = state.token_calls.fetch_add(1, Ordering::SeqCst);

    if let Some(delay) = state.token_delay {
        tokio::time::sleep(delay).await;
    }

    if state.token_status != StatusCode::OK {
        return (state.token_status, Json(json!({ "error": "unavailable" })));
    }

    let valid = params.get("grant_type").map(String::as_str) == Some("client_credentials")
        && params.get("client_id").map(String::as_str) == Some(TEST_CLIENT_ID)
        && params.get("client_secret").map(String::as_str) == Some(TEST_CLIENT_SECRET);
    if !valid {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid_client", "error_description": "Bad client credentials" })),
        );
    }

    let access_token = state
        .tokens
        .get(n)
        .or_else(|| state.tokens.last())
        .cloned()
        .unwrap_or_default();

    let mut body = json!({
        "access_token": access_token,
        "token_type": "bearer",
        "scope": "api@example.com",
    });
    if let Some(expires_in) = state.expires_in {
        body["expires_in"] = json!(expires_in);
    }
    (StatusCode::OK, Json(body))
}

async fn resource(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    let path = uri.path().to_string();
    let body: Option<Value> = serde_json::from_str(&body).ok();

    if let Ok(mut requests) = state.requests.lock() {
        requests.push(RecordedRequest {
            method: method.to_string(),
            path: path.clone(),
            query: uri.query().map(str::to_string),
            authorization: headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            body: body.clone(),
        });
    }

    if let Some(delay) = state.delay {
        tokio::time::sleep(delay).await;
    }

    if let Some((status, response)) = state.overrides.get(&path) {
        return (*status, Json(response.clone()));
    }

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "requestId": "mock#1",
            "method": method.as_str(),
            "path": path,
            "query": uri.query(),
            "body": body,
        })),
    )
}
