//! Process settings
//!
//! Read once at start-up from a TOML file, then overridden by environment
//! variables. The resulting `Settings` value is handed to constructors; nothing
//! in the core looks configuration up on its own.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use std::{env, fs, io};

use crate::auth::Credentials;
use crate::error::{Error, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub marketo: MarketoSettings,
    pub mcp: McpSettings,
    pub memory: MemorySettings,
    pub server: ServerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketoSettings {
    pub client_id: String,
    pub client_secret: String,
    /// e.g. `https://123-ABC-456.mktorest.com/identity`
    pub identity_base: String,
    /// e.g. `https://123-ABC-456.mktorest.com`
    pub rest_base: String,
    pub token_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for MarketoSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            identity_base: String::new(),
            rest_base: String::new(),
            token_timeout_secs: 10,
            request_timeout_secs: 15,
        }
    }
}

impl MarketoSettings {
    /// Immutable credential set for one client instance.
    pub fn credentials(&self) -> Result<Credentials> {
        let missing: Vec<&str> = [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("identity_base", &self.identity_base),
            ("rest_base", &self.rest_base),
        ]
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();

        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "missing Marketo settings: {}",
                missing.join(", ")
            )));
        }

        Ok(Credentials::new(
            self.client_id.trim(),
            self.client_secret.trim(),
            &self.identity_base,
            &self.rest_base,
        ))
    }

    pub fn token_timeout(&self) -> Duration {
        Duration::from_secs(self.token_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct McpSettings {
    pub host: String,
    pub data_agent_port: u16,
    pub action_agent_port: u16,
    pub call_timeout_secs: u64,
}

impl Default for McpSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            data_agent_port: 8001,
            action_agent_port: 8002,
            call_timeout_secs: 20,
        }
    }
}

impl McpSettings {
    pub fn data_agent_url(&self) -> String {
        format!("http://{}:{}", self.host, self.data_agent_port)
    }

    pub fn action_agent_url(&self) -> String {
        format!("http://{}:{}", self.host, self.action_agent_port)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySettings {
    pub db_path: String,
    /// Maximum number of history records kept; `None` keeps everything.
    pub retention: Option<u64>,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            db_path: "memory/agent_memory.db".to_string(),
            retention: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Route commands through the MCP tool servers before falling back to
    /// in-process façades.
    pub use_mcp: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            use_mcp: true,
        }
    }
}

impl Settings {
    /// Load `.env`, then the file named by `MARKETO_CONFIG` (or the default path).
    pub fn load() -> Result<Self> {
        let _ = dotenv::dotenv();
        let path = env::var("MARKETO_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(path)
    }

    /// A missing file yields defaults; an unreadable or malformed one is an error.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut settings = match fs::read_to_string(path) {
            Ok(raw) => toml::from_str(&raw)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("No config file at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => return Err(Error::Config(format!("{}: {}", path.display(), e))),
        };

        settings.apply_overrides(|key| env::var(key).ok())?;
        Ok(settings)
    }

    /// Environment values win over file values. Empty values are ignored.
    /// The merged result is validated afterwards.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("MARKETO_CLIENT_ID") {
            self.marketo.client_id = v;
        }
        if let Some(v) = get("MARKETO_CLIENT_SECRET") {
            self.marketo.client_secret = v;
        }
        if let Some(v) = get("MARKETO_IDENTITY_BASE") {
            self.marketo.identity_base = v;
        }
        if let Some(v) = get("MARKETO_REST_BASE") {
            self.marketo.rest_base = v;
        }
        if let Some(v) = get("MCP_HOST") {
            self.mcp.host = v;
        }
        if let Some(v) = get("DATA_AGENT_PORT") {
            self.mcp.data_agent_port = parse_override("DATA_AGENT_PORT", &v)?;
        }
        if let Some(v) = get("ACTION_AGENT_PORT") {
            self.mcp.action_agent_port = parse_override("ACTION_AGENT_PORT", &v)?;
        }
        if let Some(v) = get("MEMORY_DB_PATH") {
            self.memory.db_path = v;
        }
        if let Some(v) = get("MEMORY_RETENTION") {
            self.memory.retention = Some(parse_override("MEMORY_RETENTION", &v)?);
        }
        if let Some(v) = get("BACKEND_HOST") {
            self.server.host = v;
        }
        if let Some(v) = get("BACKEND_PORT") {
            self.server.port = parse_override("BACKEND_PORT", &v)?;
        }
        if let Some(v) = get("BACKEND_USE_MCP") {
            self.server.use_mcp = parse_override("BACKEND_USE_MCP", &v.to_lowercase())?;
        }

        if self.memory.retention == Some(0) {
            return Err(Error::Config(
                "memory retention must be at least 1; leave it unset to keep everything".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_override<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("invalid {}={:?}: {}", key, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_file_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load_from(dir.path().join("nope.toml")).unwrap();
        assert_eq!(settings.marketo.token_timeout_secs, 10);
        assert_eq!(settings.marketo.request_timeout_secs, 15);
        assert_eq!(settings.mcp.data_agent_port, 8001);
        assert_eq!(settings.mcp.action_agent_port, 8002);
        assert_eq!(settings.memory.db_path, "memory/agent_memory.db");
        assert!(settings.memory.retention.is_none());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[marketo]
client_id = "abc"
client_secret = "shh"
identity_base = "https://123-ABC-456.mktorest.com/identity/"
rest_base = "https://123-ABC-456.mktorest.com"

[memory]
retention = 500
"#,
        )
        .unwrap();

        let mut settings: Settings = toml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        settings.apply_overrides(lookup_from(&[])).unwrap();

        assert_eq!(settings.marketo.client_id, "abc");
        assert_eq!(settings.marketo.request_timeout_secs, 15);
        assert_eq!(settings.memory.retention, Some(500));
        assert_eq!(settings.server.port, 8000);

        let creds = settings.marketo.credentials().unwrap();
        assert_eq!(creds.identity_base(), "https://123-ABC-456.mktorest.com/identity");
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "this is not valid toml {{{{").unwrap();
        assert!(matches!(Settings::load_from(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_environment_overrides_file_values() {
        let mut settings = Settings::default();
        settings.marketo.client_id = "from-file".to_string();
        settings
            .apply_overrides(lookup_from(&[
                ("MARKETO_CLIENT_ID", "from-env"),
                ("MARKETO_REST_BASE", "https://rest.example"),
                ("ACTION_AGENT_PORT", "9002"),
                ("BACKEND_USE_MCP", "FALSE"),
                ("MEMORY_DB_PATH", ""),
            ]))
            .unwrap();

        assert_eq!(settings.marketo.client_id, "from-env");
        assert_eq!(settings.marketo.rest_base, "https://rest.example");
        assert_eq!(settings.mcp.action_agent_port, 9002);
        assert_eq!(settings.mcp.action_agent_url(), "http://127.0.0.1:9002");
        assert!(!settings.server.use_mcp);
        // empty values do not clobber
        assert_eq!(settings.memory.db_path, "memory/agent_memory.db");
    }

    #[test]
    fn test_bad_numeric_override_is_an_error() {
        let mut settings = Settings::default();
        let result = settings.apply_overrides(lookup_from(&[("BACKEND_PORT", "eighty")]));
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("BACKEND_PORT")));
    }

    #[test]
    fn test_credentials_require_all_fields() {
        let mut marketo = MarketoSettings::default();
        marketo.client_id = "abc".to_string();
        let err = marketo.credentials().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("client_secret"));
        assert!(msg.contains("identity_base"));
        assert!(msg.contains("rest_base"));
        assert!(!msg.contains("client_id,"));
    }

    #[test]
    fn test_unreadable_config_path_is_an_error() {
        // a directory exists but cannot be read as a file
        let dir = TempDir::new().unwrap();
        assert!(matches!(Settings::load_from(dir.path()), Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_retention_is_rejected() {
        let mut settings = Settings::default();
        let err = settings
            .apply_overrides(lookup_from(&[("MEMORY_RETENTION", "0")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("retention")));

        let mut settings: Settings = toml::from_str("[memory]\nretention = 0\n").unwrap();
        assert!(settings.apply_overrides(lookup_from(&[])).is_err());
    }
}
