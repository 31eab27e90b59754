//! Marketo resource identifiers
//!
//! Campaign ids arrive as numbers from some callers and as strings from others.
//! They are kept as strings everywhere because they only ever end up as URL path
//! segments; the write façade is the one place that insists on an integer.

use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, Schema, SchemaObject};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Smart list ids are always numeric in the asset API.
pub type SmartListId = u64;

/// Default page size for list endpoints.
pub const DEFAULT_MAX_RETURN: u32 = 200;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawId")]
pub struct CampaignId(String);

/// Wire form accepted for a campaign id: `6120` or `"6120"`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(serde_json::Number),
    Text(String),
}

impl From<RawId> for CampaignId {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Number(n) => CampaignId(n.to_string()),
            RawId::Text(s) => CampaignId(s.trim().to_string()),
        }
    }
}

impl CampaignId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The id as an integer, if it is a plain run of ASCII digits.
    pub fn as_integer(&self) -> Option<u64> {
        if self.0.is_empty() || !self.0.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        self.0.parse().ok()
    }

    /// The id percent-encoded as a single URL path segment.
    pub fn path_segment(&self) -> Cow<'_, str> {
        urlencoding::encode(&self.0)
    }
}

impl fmt::Display for CampaignId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for CampaignId {
    fn from(id: u64) -> Self {
        CampaignId(id.to_string())
    }
}

impl From<&str> for CampaignId {
    fn from(id: &str) -> Self {
        CampaignId(id.trim().to_string())
    }
}

impl From<String> for CampaignId {
    fn from(id: String) -> Self {
        CampaignId::from(id.as_str())
    }
}

impl JsonSchema for CampaignId {
    fn schema_name() -> String {
        "CampaignId".to_string()
    }

    fn json_schema(_gen: &mut SchemaGenerator) -> Schema {
        let mut schema = SchemaObject {
            instance_type: Some(vec![InstanceType::Integer, InstanceType::String].into()),
            ..Default::default()
        };
        schema.metadata().description =
            Some("Marketo campaign id, as a number or a numeric string".to_string());
        schema.into()
    }
}

/// Offset/size pair for paginated list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub offset: u32,
    pub max_return: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            max_return: DEFAULT_MAX_RETURN,
        }
    }
}

impl Pagination {
    pub fn from_offset(offset: u32) -> Self {
        Self {
            offset,
            ..Self::default()
        }
    }
}
