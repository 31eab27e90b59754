//! Marketo core library
//!
//! Everything with real state lives here:
//! - `auth`: client-credentials token acquisition and caching
//! - `client`: authenticated REST calls against the Marketo endpoints
//! - `agents`: the read (data) and write (action) façades used by tools and routes
//! - `history`: append-only interaction log plus a small context table

pub mod agents;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod history;
pub mod ids;

#[cfg(any(test, feature = "test-util"))]
pub mod test_utils;

pub use agents::{ActionAgent, DataAgent};
pub use auth::{CachedToken, Credentials, TokenManager};
pub use client::{MarketoClient, Timeouts};
pub use config::Settings;
pub use error::{Error, Result};
pub use history::{ContextRecord, Direction, HistoryRecord, HistoryStore};
pub use ids::{CampaignId, Pagination, SmartListId};
