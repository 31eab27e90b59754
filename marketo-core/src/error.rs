//! Error taxonomy shared by every layer of the core.
//!
//! Nothing here is recovered locally: each variant propagates unchanged to the
//! immediate caller, and the HTTP/tool boundaries decide how to present it.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Identity endpoint failure or a token response without an access token.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Non-2xx from a resource endpoint, or a transport failure (`status` is `None`).
    #[error("{}", api_message(.status, .body))]
    Api { status: Option<u16>, body: String },

    /// Façade-level precondition failure.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

fn api_message(status: &Option<u16>, body: &str) -> String {
    match status {
        Some(code) => format!("Marketo API returned {}: {}", code, body),
        None => format!("Marketo API request failed: {}", body),
    }
}

impl Error {
    /// HTTP status carried by an `Api` error, if the provider answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => *status,
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Api { status: None, body } => body.contains("timed out"),
            Error::Auth(reason) => reason.contains("timed out"),
            _ => false,
        }
    }

    /// Build a status-less `Api` error from a reqwest failure, flagging timeouts.
    pub(crate) fn transport(url: &str, err: reqwest::Error) -> Self {
        let body = if err.is_timeout() {
            format!("request to {} timed out", url)
        } else {
            format!("request to {} failed: {}", url, err)
        };
        Error::Api { status: None, body }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_message_includes_status_and_body() {
        let err = Error::Api {
            status: Some(404),
            body: "{\"errors\":[]}".to_string(),
        };
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.to_string(), "Marketo API returned 404: {\"errors\":[]}");
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_timeout_flavour() {
        let err = Error::Api {
            status: None,
            body: "request to http://x/y timed out".to_string(),
        };
        assert!(err.is_timeout());
        assert_eq!(err.status(), None);
        assert!(Error::Auth("token request timed out".into()).is_timeout());
        assert!(!Error::Validation("campaign_id must be an integer".into()).is_timeout());
    }
}
