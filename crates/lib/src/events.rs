//! Webhook envelope and typed per-topic events.
//!
//! The endpoint only needs the topic (`WebhookEnvelope`); the background task decodes
//! `data.item` into a `WebhookEvent` variant for the topic it was routed to.

use crate::routing::Topic;
use serde::{Deserialize, Deserializer};

/// Raw inbound payload: `{ topic, data: { item } }`. `data` is kept untyped until dispatch.
#[derive(Debug, Clone)]
pub struct WebhookEnvelope {
    pub topic: String,
    pub data: serde_json::Value,
}

#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("Invalid JSON payload")]
    InvalidJson(#[source] serde_json::Error),
    #[error("Invalid JSON payload: expected an object")]
    NotAnObject,
    #[error("Missing topic")]
    MissingTopic,
}

impl WebhookEnvelope {
    /// Parse a request body: a JSON object with a non-blank string `topic`.
    /// The topic is returned exactly as sent.
    pub fn parse(body: &[u8]) -> Result<(String, Self), EnvelopeError> {
        let value: serde_json::Value =
            serde_json::from_slice(body).map_err(EnvelopeError::InvalidJson)?;
        let serde_json::Value::Object(mut map) = value else {
            return Err(EnvelopeError::NotAnObject);
        };
        let topic = match map.get("topic") {
            Some(serde_json::Value::String(t)) if !t.trim().is_empty() => t.clone(),
            _ => return Err(EnvelopeError::MissingTopic),
        };
        let data = map.remove("data").unwrap_or(serde_json::Value::Null);
        Ok((topic.clone(), WebhookEnvelope { topic, data }))
    }

    /// `data.item.id` as a string, if present. Used for log context before decoding.
    pub fn item_id(&self) -> Option<String> {
        match self.data.get("item")?.get("id")? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn item(&self) -> serde_json::Value {
        self.data
            .get("item")
            .cloned()
            .unwrap_or(serde_json::Value::Null)
    }
}

/// `data.item` for conversation-scoped topics. `id` may be absent; handlers report that as an error result.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConversationItem {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
}

/// `data.item` for `conversation.admin.assigned`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssignedItem {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub assignee: Option<Assignee>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Assignee {
    #[serde(default)]
    pub name: Option<String>,
}

/// One decoded webhook event, one variant per registered topic.
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    UserCreated(ConversationItem),
    UserReplied(ConversationItem),
    AdminReplied(ConversationItem),
    AdminAssigned(AssignedItem),
    AdminClosed(ConversationItem),
}

impl WebhookEvent {
    /// Decode the envelope's item into the shape registered for `topic`.
    /// A missing or null item decodes to the default (id-less) shape; any other
    /// non-object item is an error.
    pub fn decode(topic: Topic, envelope: &WebhookEnvelope) -> Result<Self, serde_json::Error> {
        let item = match envelope.item() {
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            other => other,
        };
        Ok(match topic {
            Topic::UserCreated => WebhookEvent::UserCreated(serde_json::from_value(item)?),
            Topic::UserReplied => WebhookEvent::UserReplied(serde_json::from_value(item)?),
            Topic::AdminReplied => WebhookEvent::AdminReplied(serde_json::from_value(item)?),
            Topic::AdminAssigned => WebhookEvent::AdminAssigned(serde_json::from_value(item)?),
            Topic::AdminClosed => WebhookEvent::AdminClosed(serde_json::from_value(item)?),
        })
    }

    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            WebhookEvent::UserCreated(i)
            | WebhookEvent::UserReplied(i)
            | WebhookEvent::AdminReplied(i)
            | WebhookEvent::AdminClosed(i) => i.id.as_deref(),
            WebhookEvent::AdminAssigned(i) => i.id.as_deref(),
        }
    }
}

/// Intercom ids are strings, but accept numbers too; empty strings count as absent.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
