//! Client-credentials token management
//!
//! Every REST call goes through `ensure_token`, so the cached path must stay
//! free of network I/O. A token is refreshed when none has been fetched yet or
//! when the current time is within `EXPIRY_MARGIN` of its expiry.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::error::{Error, Result};

/// Safety margin subtracted from the provider's expiry.
pub const EXPIRY_MARGIN_SECS: i64 = 30;

/// Lifetime assumed when the identity response omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Immutable credential set supplied at construction.
#[derive(Clone)]
pub struct Credentials {
    client_id: String,
    client_secret: String,
    identity_base: String,
    rest_base: String,
}

impl Credentials {
    /// Base URLs are stored without a trailing slash.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        identity_base: &str,
        rest_base: &str,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            identity_base: identity_base.trim().trim_end_matches('/').to_string(),
            rest_base: rest_base.trim().trim_end_matches('/').to_string(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn identity_base(&self) -> &str {
        &self.identity_base
    }

    pub fn rest_base(&self) -> &str {
        &self.rest_base
    }

    fn token_url(&self) -> String {
        format!("{}/oauth/token", self.identity_base)
    }
}

// Keep the secret out of logs and panic messages.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("identity_base", &self.identity_base)
            .field("rest_base", &self.rest_base)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at - ChronoDuration::seconds(EXPIRY_MARGIN_SECS)
    }
}

/// Identity endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// `now + expires_in`, rejecting lifetimes that are non-positive or out of range.
fn expiry_after(now: DateTime<Utc>, expires_in: i64) -> Result<DateTime<Utc>> {
    if expires_in <= 0 {
        return Err(Error::Auth(format!("invalid expires_in {} in token response", expires_in)));
    }
    ChronoDuration::try_seconds(expires_in)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| Error::Auth(format!("invalid expires_in {} in token response", expires_in)))
}

/// Acquires and caches one bearer token for one credential set.
pub struct TokenManager {
    credentials: Credentials,
    http: reqwest::Client,
    timeout: Duration,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenManager {
    pub fn new(credentials: Credentials, http: reqwest::Client, timeout: Duration) -> Self {
        Self {
            credentials,
            http,
            timeout,
            cached: Mutex::new(None),
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Return a valid access token, refreshing it first if needed.
    ///
    /// The cache lock is held across the refresh, so callers sharing this
    /// manager wait for one grant request instead of issuing their own.
    pub async fn ensure_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();

        if let Some(token) = cached.as_ref() {
            if token.is_fresh(now) {
                tracing::debug!("Using cached Marketo token (expires {})", token.expires_at);
                return Ok(token.access_token.clone());
            }
        }

        let token = self.fetch_token(now).await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// Snapshot of the cached token, if any.
    pub async fn cached(&self) -> Option<CachedToken> {
        self.cached.lock().await.clone()
    }

    /// Drop the cached token; the next call performs a fresh grant.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    async fn fetch_token(&self, now: DateTime<Utc>) -> Result<CachedToken> {
        let url = self.credentials.token_url();
        tracing::info!("→ Requesting Marketo access token from {}", url);

        let response = self
            .http
            .get(&url)
            .query(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
            ])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Auth(format!("token request timed out after {:?}", self.timeout))
                } else {
                    Error::Auth(format!("token request failed: {}", e.without_url()))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Auth(format!("failed to read token response: {}", e.without_url())))?;

        if !status.is_success() {
            return Err(Error::Auth(format!(
                "identity endpoint returned {}: {}",
                status.as_u16(),
                body
            )));
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Auth(format!("malformed token response: {}", e)))?;

        let access_token = match parsed.access_token.filter(|t| !t.is_empty()) {
            Some(token) => token,
            None => {
                let reason = parsed
                    .error_description
                    .or(parsed.error)
                    .unwrap_or_else(|| "no access_token in response".to_string());
                return Err(Error::Auth(reason));
            }
        };

        let expires_in = parsed.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let expires_at = expiry_after(now, expires_in)?;
        tracing::info!("✓ Marketo token refreshed, valid for {}s", expires_in);

        Ok(CachedToken {
            access_token,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_strip_trailing_slash() {
        let creds = Credentials::new("id", "secret", "https://x.mktorest.com/identity/", "https://x.mktorest.com//");
        assert_eq!(creds.identity_base(), "https://x.mktorest.com/identity");
        assert_eq!(creds.rest_base(), "https://x.mktorest.com");
        assert_eq!(creds.token_url(), "https://x.mktorest.com/identity/oauth/token");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds = Credentials::new("id", "super-secret", "https://a", "https://b");
        let rendered = format!("{:?}", creds);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_freshness_respects_margin() {
        let now = Utc::now();
        let token = CachedToken {
            access_token: "T".to_string(),
            expires_at: now + ChronoDuration::seconds(31),
        };
        assert!(token.is_fresh(now));
        assert!(!token.is_fresh(now + ChronoDuration::seconds(1)));

        let short = CachedToken {
            access_token: "T".to_string(),
            expires_at: now + ChronoDuration::seconds(1),
        };
        assert!(!short.is_fresh(now));
    }

    #[test]
    fn test_expiry_rejects_out_of_range_lifetimes() {
        let now = Utc::now();
        assert_eq!(
            expiry_after(now, 3600).unwrap(),
            now + ChronoDuration::seconds(3600)
        );
        for bad in [0, -5, i64::MAX, 1_000_000_000_000_000] {
            assert!(matches!(expiry_after(now, bad), Err(Error::Auth(_))));
        }
    }

    #[tokio::test]
    async fn test_unreachable_identity_endpoint_is_auth_error() {
        // Port 9 (discard) on localhost is closed in test environments.
        let creds = Credentials::new("id", "secret", "http://127.0.0.1:9/identity", "http://127.0.0.1:9");
        let manager = TokenManager::new(creds, reqwest::Client::new(), Duration::from_secs(2));
        let err = manager.ensure_token().await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
        assert!(manager.cached().await.is_none());
    }
}
