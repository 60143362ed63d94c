//! Microsoft Graph client for Teams channels and messages.
//!
//! Authenticates with the OAuth2 client-credentials grant and caches the access token
//! until shortly before it expires.

use crate::chat::{
    ChannelMessage, ChannelRef, ChatError, ChatPlatform, ContentType, SentMessage, Team,
};
use async_trait::async_trait;
use reqwest::{Method, Url};
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";
pub const DEFAULT_AUTHORITY_URL: &str = "https://login.microsoftonline.com";
const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";
/// Refresh this long before the token actually expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Azure AD app registration used for the client-credentials grant.
#[derive(Debug, Clone, Default)]
pub struct GraphCredentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Graph API client. Shared by all request handlers and background tasks.
pub struct GraphClient {
    base_url: String,
    authority_url: String,
    credentials: Option<GraphCredentials>,
    authenticated: AtomicBool,
    token: RwLock<Option<CachedToken>>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Deserialize)]
struct ValueList<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTeam {
    id: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireChannel {
    id: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl From<WireChannel> for ChannelRef {
    fn from(c: WireChannel) -> Self {
        ChannelRef {
            id: c.id,
            display_name: c.display_name.unwrap_or_default(),
            description: c.description.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    id: String,
    #[serde(default)]
    body: Option<WireBody>,
    #[serde(default)]
    created_date_time: Option<String>,
    #[serde(default)]
    from: Option<WireFrom>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireBody {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireFrom {
    #[serde(default)]
    user: Option<WireUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireUser {
    #[serde(default)]
    display_name: Option<String>,
}

impl GraphClient {
    pub fn new(
        base_url: Option<String>,
        authority_url: Option<String>,
        credentials: Option<GraphCredentials>,
    ) -> Self {
        let trim = |u: String| u.trim_end_matches('/').to_string();
        Self {
            base_url: base_url
                .map(trim)
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| DEFAULT_GRAPH_BASE_URL.to_string()),
            authority_url: authority_url
                .map(trim)
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| DEFAULT_AUTHORITY_URL.to_string()),
            credentials,
            authenticated: AtomicBool::new(false),
            token: RwLock::new(None),
            client: reqwest::Client::new(),
        }
    }

    /// Acquire an app-only access token. On failure the client stays unauthenticated.
    pub async fn authenticate(&self) -> Result<(), ChatError> {
        match self.fetch_token().await {
            Ok(token) => {
                *self.token.write().await = Some(token);
                self.authenticated.store(true, Ordering::SeqCst);
                log::info!("authenticated with Microsoft Graph");
                Ok(())
            }
            Err(e) => {
                self.authenticated.store(false, Ordering::SeqCst);
                log::error!("microsoft graph authentication failed: {}", e);
                Err(e)
            }
        }
    }

    /// Drop the cached token and mark the client unauthenticated.
    pub async fn close(&self) {
        *self.token.write().await = None;
        self.authenticated.store(false, Ordering::SeqCst);
        log::info!("graph client closed");
    }

    async fn fetch_token(&self) -> Result<CachedToken, ChatError> {
        let creds = self
            .credentials
            .as_ref()
            .filter(|c| !c.tenant_id.is_empty() && !c.client_id.is_empty())
            .ok_or_else(|| ChatError::Config("azure tenant id and client id are required".to_string()))?;
        let mut url = parse_base(&self.authority_url)?;
        url.path_segments_mut()
            .map_err(|_| ChatError::Config(format!("invalid authority url {}", self.authority_url)))?
            .pop_if_empty()
            .extend([creds.tenant_id.as_str(), "oauth2", "v2.0", "token"]);
        let form = [
            ("client_id", creds.client_id.as_str()),
            ("client_secret", creds.client_secret.as_str()),
            ("scope", GRAPH_SCOPE),
            ("grant_type", "client_credentials"),
        ];
        let res = self.client.post(url).form(&form).send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ChatError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        let token: TokenResponse = res.json().await?;
        Ok(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        })
    }

    /// Current bearer token, refreshed when close to expiry.
    async fn bearer(&self) -> Result<String, ChatError> {
        if !self.is_authenticated() {
            return Err(ChatError::NotAuthenticated);
        }
        {
            let guard = self.token.read().await;
            if let Some(t) = guard.as_ref() {
                if t.expires_at > Instant::now() + TOKEN_EXPIRY_MARGIN {
                    return Ok(t.value.clone());
                }
            }
        }
        log::debug!("graph access token expired, refreshing");
        let fresh = self.fetch_token().await?;
        let value = fresh.value.clone();
        *self.token.write().await = Some(fresh);
        Ok(value)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ChatError> {
        let mut url = parse_base(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| ChatError::Config(format!("invalid graph base url {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<T, ChatError> {
        let token = self.bearer().await?;
        let mut req = self.client.request(method, url).bearer_auth(token);
        if let Some(b) = body {
            req = req.json(&b);
        }
        let res = req.send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| {
                    v.get("error")
                        .and_then(|e| e.get("message"))
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                })
                .unwrap_or(body);
            return Err(ChatError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(res.json().await?)
    }
}

fn parse_base(base: &str) -> Result<Url, ChatError> {
    Url::parse(base).map_err(|e| ChatError::Config(format!("invalid url {}: {}", base, e)))
}

#[async_trait]
impl ChatPlatform for GraphClient {
    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    /// GET /teams
    async fn get_teams(&self) -> Result<Vec<Team>, ChatError> {
        let url = self.endpoint(&["teams"])?;
        let list: ValueList<WireTeam> = self.call(Method::GET, url, None).await?;
        let teams: Vec<Team> = list
            .value
            .into_iter()
            .map(|t| Team {
                id: t.id,
                display_name: t.display_name.unwrap_or_default(),
                description: t.description.unwrap_or_default(),
            })
            .collect();
        log::info!("retrieved {} teams", teams.len());
        Ok(teams)
    }

    /// GET /teams/{team}/channels
    async fn get_channels(&self, team_id: &str) -> Result<Vec<ChannelRef>, ChatError> {
        let url = self.endpoint(&["teams", team_id, "channels"])?;
        let list: ValueList<WireChannel> = self.call(Method::GET, url, None).await?;
        let channels: Vec<ChannelRef> = list.value.into_iter().map(ChannelRef::from).collect();
        log::debug!("retrieved {} channels for team {}", channels.len(), team_id);
        Ok(channels)
    }

    /// POST /teams/{team}/channels
    async fn create_channel(
        &self,
        team_id: &str,
        name: &str,
        description: &str,
    ) -> Result<ChannelRef, ChatError> {
        let url = self.endpoint(&["teams", team_id, "channels"])?;
        let body = json!({ "displayName": name, "description": description });
        let created: WireChannel = self.call(Method::POST, url, Some(body)).await?;
        log::info!("created channel '{}' in team {}", name, team_id);
        Ok(created.into())
    }

    /// POST /teams/{team}/channels/{channel}/messages
    async fn send_message(
        &self,
        team_id: &str,
        channel_id: &str,
        content: &str,
        content_type: ContentType,
    ) -> Result<SentMessage, ChatError> {
        let url = self.endpoint(&["teams", team_id, "channels", channel_id, "messages"])?;
        let body = json!({ "body": { "contentType": content_type, "content": content } });
        let sent: WireMessage = self.call(Method::POST, url, Some(body)).await?;
        log::info!("sent message to team {}, channel {}", team_id, channel_id);
        Ok(SentMessage {
            id: sent.id,
            content: sent
                .body
                .and_then(|b| b.content)
                .unwrap_or_else(|| content.to_string()),
            created_date_time: sent.created_date_time,
        })
    }

    /// GET /teams/{team}/channels/{channel}/messages, truncated to `limit`.
    async fn get_messages(
        &self,
        team_id: &str,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<ChannelMessage>, ChatError> {
        let url = self.endpoint(&["teams", team_id, "channels", channel_id, "messages"])?;
        let list: ValueList<WireMessage> = self.call(Method::GET, url, None).await?;
        Ok(list
            .value
            .into_iter()
            .take(limit)
            .map(|m| {
                let (content, content_type) = match m.body {
                    Some(b) => (
                        b.content.unwrap_or_default(),
                        b.content_type
                            .as_deref()
                            .map(ContentType::parse)
                            .unwrap_or(ContentType::Text),
                    ),
                    None => (String::new(), ContentType::Text),
                };
                ChannelMessage {
                    id: m.id,
                    content,
                    content_type,
                    created_date_time: m.created_date_time,
                    from: m
                        .from
                        .and_then(|f| f.user)
                        .and_then(|u| u.display_name)
                        .unwrap_or_else(|| "Unknown".to_string()),
                }
            })
            .collect())
    }
}
