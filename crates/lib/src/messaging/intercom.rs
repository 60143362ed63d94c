//! Intercom REST client (https://api.intercom.io by default).
//!
//! Every call owns its request and response; the pooled connection goes back to the
//! pool when the response is dropped, whichever way the caller exits.

use crate::messaging::{
    AiSuggestion, Author, Conversation, ConversationPart, MessagingError, MessagingPlatform,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, Url};
use serde::Deserialize;
use serde_json::json;

pub const DEFAULT_INTERCOM_BASE_URL: &str = "https://api.intercom.io";

/// Client for the Intercom API. Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct IntercomClient {
    base_url: String,
    access_token: Option<String>,
    client: reqwest::Client,
}

impl IntercomClient {
    pub fn new(base_url: Option<String>, access_token: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_INTERCOM_BASE_URL.to_string());
        Self {
            base_url,
            access_token,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, MessagingError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| MessagingError::Config(format!("invalid base url {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| MessagingError::Config(format!("invalid base url {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn request(
        &self,
        method: Method,
        url: Url,
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, MessagingError> {
        let token = self
            .access_token
            .as_deref()
            .ok_or_else(|| MessagingError::Config("intercom access token not configured".to_string()))?;
        let mut req = self
            .client
            .request(method, url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(b) = body {
            req = req.json(b);
        }
        let res = req.send().await?;
        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|v| api_error_message(&v))
                .unwrap_or(text);
            log::error!("intercom api error {}: {}", status, message);
            return Err(MessagingError::Api {
                status: status.as_u16(),
                message,
            });
        }
        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

/// First `errors[].message` of an Intercom error body.
fn api_error_message(body: &serde_json::Value) -> Option<String> {
    body.get("errors")?
        .as_array()?
        .first()?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

#[derive(Debug, Default, Deserialize)]
struct WireConversation {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    created_at: Option<i64>,
    #[serde(default)]
    source: Option<WireSource>,
    #[serde(default)]
    conversation_parts: Option<WirePartList>,
}

#[derive(Debug, Default, Deserialize)]
struct WireSource {
    #[serde(default)]
    author: Option<Author>,
}

#[derive(Debug, Default, Deserialize)]
struct WirePartList {
    #[serde(default)]
    conversation_parts: Vec<WirePart>,
}

#[derive(Debug, Default, Deserialize)]
struct WirePart {
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    author: Option<Author>,
}

impl WireConversation {
    fn into_conversation(self, requested_id: &str) -> Conversation {
        let id = match self.id {
            Some(serde_json::Value::String(s)) => s,
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => requested_id.to_string(),
        };
        Conversation {
            id,
            author: self.source.and_then(|s| s.author).unwrap_or_default(),
            created_at: self
                .created_at
                .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
            parts: self
                .conversation_parts
                .map(|p| p.conversation_parts)
                .unwrap_or_default()
                .into_iter()
                .map(|p| ConversationPart {
                    body: p.body,
                    author: p.author.unwrap_or_default(),
                })
                .collect(),
        }
    }
}

fn conversations_field(value: serde_json::Value) -> Vec<serde_json::Value> {
    match value {
        serde_json::Value::Object(mut m) => match m.remove("conversations") {
            Some(serde_json::Value::Array(list)) => list,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

#[async_trait]
impl MessagingPlatform for IntercomClient {
    /// GET /conversations/{id}
    async fn get_conversation(&self, conversation_id: &str) -> Result<Conversation, MessagingError> {
        let url = self.endpoint(&["conversations", conversation_id])?;
        let value = self.request(Method::GET, url, None).await?;
        let wire: WireConversation = serde_json::from_value(value)?;
        log::info!("retrieved conversation {}", conversation_id);
        Ok(wire.into_conversation(conversation_id))
    }

    /// GET /conversations?per_page={limit}
    async fn get_conversations(&self, limit: u32) -> Result<Vec<serde_json::Value>, MessagingError> {
        let mut url = self.endpoint(&["conversations"])?;
        url.query_pairs_mut()
            .append_pair("per_page", &limit.to_string());
        let conversations = conversations_field(self.request(Method::GET, url, None).await?);
        log::info!("retrieved {} conversations", conversations.len());
        Ok(conversations)
    }

    /// POST /conversations/search: `query` is a substring match on part bodies.
    async fn search_conversations(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<serde_json::Value>, MessagingError> {
        let url = self.endpoint(&["conversations", "search"])?;
        let body = json!({
            "query": {
                "operator": "AND",
                "value": [
                    { "field": "conversation_parts.body", "operator": "~", "value": query }
                ]
            },
            "pagination": { "per_page": limit }
        });
        let conversations = conversations_field(self.request(Method::POST, url, Some(&body)).await?);
        log::info!("found {} conversations matching '{}'", conversations.len(), query);
        Ok(conversations)
    }

    /// POST /conversations/{id}/reply
    async fn reply_to_conversation(
        &self,
        conversation_id: &str,
        body: &str,
        message_type: &str,
        admin_id: Option<&str>,
    ) -> Result<serde_json::Value, MessagingError> {
        let url = self.endpoint(&["conversations", conversation_id, "reply"])?;
        let mut payload = json!({ "message_type": message_type, "body": body });
        if let Some(admin) = admin_id {
            payload["admin_id"] = serde_json::Value::String(admin.to_string());
        }
        let res = self.request(Method::POST, url, Some(&payload)).await?;
        log::info!("replied to conversation {}", conversation_id);
        Ok(res)
    }

    /// POST /conversations
    async fn create_conversation(
        &self,
        user_id: &str,
        body: &str,
        message_type: &str,
    ) -> Result<serde_json::Value, MessagingError> {
        let url = self.endpoint(&["conversations"])?;
        let payload = json!({
            "from": { "type": "user", "id": user_id },
            "body": body,
            "message_type": message_type,
        });
        let res = self.request(Method::POST, url, Some(&payload)).await?;
        log::info!("created conversation for user {}", user_id);
        Ok(res)
    }

    /// POST /users
    async fn create_or_update_user(&self, email: &str) -> Result<serde_json::Value, MessagingError> {
        let url = self.endpoint(&["users"])?;
        let payload = json!({ "email": email, "role": "user" });
        let res = self.request(Method::POST, url, Some(&payload)).await?;
        log::info!("created/updated user {}", email);
        Ok(res)
    }

    /// POST /conversations/ai/suggest (provisional endpoint; the shape may change upstream).
    async fn trigger_ai_suggestion(
        &self,
        conversation_id: &str,
        query: &str,
    ) -> Result<AiSuggestion, MessagingError> {
        let url = self.endpoint(&["conversations", "ai", "suggest"])?;
        let payload = json!({
            "conversation_id": conversation_id,
            "query": query,
            "ai_model": "fin",
        });
        let res = self.request(Method::POST, url, Some(&payload)).await?;
        Ok(serde_json::from_value(res)?)
    }
}
