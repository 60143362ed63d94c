//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.relay/config.json`) and environment.
//! Secrets and ids may come from the environment instead of the file; see the
//! `resolve_*` functions.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::chat::{GraphCredentials, DEFAULT_AUTHORITY_URL, DEFAULT_GRAPH_BASE_URL};
use crate::format::DEFAULT_APP_URL;
use crate::messaging::DEFAULT_INTERCOM_BASE_URL;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Intercom API and webhook settings.
    #[serde(default)]
    pub intercom: IntercomConfig,

    /// Microsoft Graph (Teams) app registration.
    #[serde(default)]
    pub graph: GraphConfig,

    /// Where notifications are delivered.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Teams/channels mapping store.
    #[serde(default)]
    pub store: StoreConfig,
}

/// Bind address, port and webhook path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for HTTP (default 8000).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_gateway_bind")]
    pub bind: String,

    /// Path Intercom POSTs webhooks to (default "/webhooks/intercom").
    #[serde(default = "default_webhook_path")]
    pub webhook_path: String,
}

fn default_gateway_port() -> u16 {
    8000
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_webhook_path() -> String {
    "/webhooks/intercom".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
            webhook_path: default_webhook_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntercomConfig {
    /// API access token. Overridden by INTERCOM_ACCESS_TOKEN env.
    pub access_token: Option<String>,
    /// Shared secret for webhook signatures. Overridden by INTERCOM_WEBHOOK_SECRET env.
    /// When unset, signature verification is skipped (local development only).
    pub webhook_secret: Option<String>,
    #[serde(default = "default_intercom_base_url")]
    pub base_url: String,
    /// Base for conversation deep links in notifications.
    #[serde(default = "default_app_url")]
    pub app_url: String,
}

fn default_intercom_base_url() -> String {
    DEFAULT_INTERCOM_BASE_URL.to_string()
}

fn default_app_url() -> String {
    DEFAULT_APP_URL.to_string()
}

impl Default for IntercomConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            webhook_secret: None,
            base_url: default_intercom_base_url(),
            app_url: default_app_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphConfig {
    /// Overridden by AZURE_TENANT_ID env.
    pub tenant_id: Option<String>,
    /// Overridden by AZURE_CLIENT_ID env.
    pub client_id: Option<String>,
    /// Overridden by AZURE_CLIENT_SECRET env.
    pub client_secret: Option<String>,
    #[serde(default = "default_graph_base_url")]
    pub base_url: String,
    #[serde(default = "default_authority_url")]
    pub authority_url: String,
}

fn default_graph_base_url() -> String {
    DEFAULT_GRAPH_BASE_URL.to_string()
}

fn default_authority_url() -> String {
    DEFAULT_AUTHORITY_URL.to_string()
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            tenant_id: None,
            client_id: None,
            client_secret: None,
            base_url: default_graph_base_url(),
            authority_url: default_authority_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfig {
    /// Team that receives notifications. Overridden by DEFAULT_TEAM_ID env. Unset = no delivery.
    pub default_team_id: Option<String>,
    /// Channel found (case-insensitively) or created in the default team.
    #[serde(default = "default_channel_name")]
    pub default_channel_name: String,
    /// Description given to the channel when it has to be created.
    #[serde(default = "default_channel_description")]
    pub channel_description: String,
}

fn default_channel_name() -> String {
    "Customer Support".to_string()
}

fn default_channel_description() -> String {
    "Customer support inquiries from Intercom".to_string()
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            default_team_id: None,
            default_channel_name: default_channel_name(),
            channel_description: default_channel_description(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    /// Mapping file. Relative paths resolve against the config file's directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

const STORE_FILE_NAME: &str = "teams_channels_config.json";

/// Trimmed, non-empty env var.
fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

fn config_value(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolve the webhook secret: env INTERCOM_WEBHOOK_SECRET overrides config.
pub fn resolve_webhook_secret(config: &Config) -> Option<String> {
    env_value("INTERCOM_WEBHOOK_SECRET").or_else(|| config_value(&config.intercom.webhook_secret))
}

/// Resolve the Intercom access token: env INTERCOM_ACCESS_TOKEN overrides config.
pub fn resolve_intercom_token(config: &Config) -> Option<String> {
    env_value("INTERCOM_ACCESS_TOKEN").or_else(|| config_value(&config.intercom.access_token))
}

/// Resolve the default team id: env DEFAULT_TEAM_ID overrides config.
pub fn resolve_default_team_id(config: &Config) -> Option<String> {
    env_value("DEFAULT_TEAM_ID").or_else(|| config_value(&config.relay.default_team_id))
}

/// Resolve Graph credentials (env AZURE_* overrides config). None unless tenant and client id are both set.
pub fn resolve_graph_credentials(config: &Config) -> Option<GraphCredentials> {
    let tenant_id = env_value("AZURE_TENANT_ID").or_else(|| config_value(&config.graph.tenant_id))?;
    let client_id = env_value("AZURE_CLIENT_ID").or_else(|| config_value(&config.graph.client_id))?;
    let client_secret = env_value("AZURE_CLIENT_SECRET")
        .or_else(|| config_value(&config.graph.client_secret))
        .unwrap_or_default();
    Some(GraphCredentials {
        tenant_id,
        client_id,
        client_secret,
    })
}

/// True if the bind address is loopback (127.0.0.1, ::1, etc.).
pub fn is_loopback_bind(bind: &str) -> bool {
    let b = bind.trim();
    b == "127.0.0.1" || b == "::1" || b == "localhost"
}

/// Webhook path with a leading slash.
pub fn normalized_webhook_path(config: &Config) -> String {
    let p = config.gateway.webhook_path.trim();
    if p.is_empty() {
        default_webhook_path()
    } else if p.starts_with('/') {
        p.to_string()
    } else {
        format!("/{}", p)
    }
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("RELAY_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".relay").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

fn config_dir(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Resolve the mapping store path: `store.path` (relative to the config file's directory) or the default file next to the config.
pub fn resolve_store_path(config: &Config, config_path: &Path) -> PathBuf {
    match &config.store.path {
        Some(p) if !p.as_os_str().is_empty() => {
            if p.is_absolute() {
                p.clone()
            } else {
                config_dir(config_path).join(p)
            }
        }
        _ => config_dir(config_path).join(STORE_FILE_NAME),
    }
}

/// Load config from the given path (or the default). Missing file => default config.
/// Returns the config and the path that was used (for resolving the store path).
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = Config::default();
        assert_eq!(c.gateway.port, 8000);
        assert_eq!(c.gateway.bind, "127.0.0.1");
        assert_eq!(c.gateway.webhook_path, "/webhooks/intercom");
        assert_eq!(c.intercom.base_url, "https://api.intercom.io");
        assert_eq!(c.relay.default_channel_name, "Customer Support");
        assert!(c.relay.default_team_id.is_none());
    }

    #[test]
    fn parses_camel_case_with_partial_sections() {
        let c: Config = serde_json::from_str(
            r#"{
                "gateway": { "port": 9000, "webhookPath": "hooks/intercom" },
                "intercom": { "webhookSecret": "s3cret" },
                "relay": { "defaultTeamId": "team-1" }
            }"#,
        )
        .expect("parse");
        assert_eq!(c.gateway.port, 9000);
        assert_eq!(c.gateway.bind, "127.0.0.1");
        assert_eq!(normalized_webhook_path(&c), "/hooks/intercom");
        assert_eq!(c.intercom.webhook_secret.as_deref(), Some("s3cret"));
        assert_eq!(c.intercom.app_url, DEFAULT_APP_URL);
        assert_eq!(c.relay.default_team_id.as_deref(), Some("team-1"));
        assert_eq!(c.relay.default_channel_name, "Customer Support");
    }

    #[test]
    fn blank_config_values_are_unset() {
        assert_eq!(config_value(&Some("  ".to_string())), None);
        assert_eq!(config_value(&Some(" x ".to_string())), Some("x".to_string()));
    }

    #[test]
    fn store_path_default_and_relative() {
        let path = Path::new("/home/user/.relay/config.json");
        let mut config = Config::default();
        assert_eq!(
            resolve_store_path(&config, path),
            PathBuf::from("/home/user/.relay/teams_channels_config.json")
        );
        config.store.path = Some(PathBuf::from("data/mapping.json"));
        assert_eq!(
            resolve_store_path(&config, path),
            PathBuf::from("/home/user/.relay/data/mapping.json")
        );
        config.store.path = Some(PathBuf::from("/srv/mapping.json"));
        assert_eq!(resolve_store_path(&config, path), PathBuf::from("/srv/mapping.json"));
    }

    #[test]
    fn load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (c, p) = load_config(Some(dir.path().join("absent.json"))).expect("load");
        assert_eq!(c.gateway.port, 8000);
        assert_eq!(p, dir.path().join("absent.json"));
    }

    #[test]
    fn loopback_binds() {
        assert!(is_loopback_bind("127.0.0.1"));
        assert!(is_loopback_bind(" localhost "));
        assert!(!is_loopback_bind("0.0.0.0"));
    }
}
