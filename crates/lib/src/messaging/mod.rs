//! Messaging platform (Intercom): conversations, replies, and AI suggestions.
//!
//! `MessagingPlatform` is the capability set the relay consumes; `IntercomClient`
//! implements it over the Intercom REST API.

mod intercom;

pub use intercom::{IntercomClient, DEFAULT_INTERCOM_BASE_URL};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("intercom request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("intercom api error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("intercom response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("intercom client misconfigured: {0}")]
    Config(String),
}

/// Conversation author or part author.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// One message in a conversation. `body` is HTML as delivered by Intercom.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationPart {
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub author: Author,
}

/// Conversation detail. `parts` is chronological: first = initial message, last = latest reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub author: Author,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub parts: Vec<ConversationPart>,
}

impl Conversation {
    pub fn first_part(&self) -> Option<&ConversationPart> {
        self.parts.first()
    }

    pub fn latest_part(&self) -> Option<&ConversationPart> {
        self.parts.last()
    }
}

/// Response of the (provisional) AI suggestion endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiSuggestion {
    #[serde(default)]
    pub suggested_reply: Option<String>,
}

impl AiSuggestion {
    /// Suggested reply text, if non-blank.
    pub fn reply(&self) -> Option<&str> {
        self.suggested_reply
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Operations the relay needs from the messaging platform.
///
/// Implementations are shared across concurrent background tasks and must tolerate
/// concurrent calls.
#[async_trait]
pub trait MessagingPlatform: Send + Sync {
    async fn get_conversation(&self, conversation_id: &str) -> Result<Conversation, MessagingError>;

    /// Ordered parts of a conversation.
    async fn get_conversation_parts(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<ConversationPart>, MessagingError> {
        Ok(self.get_conversation(conversation_id).await?.parts)
    }

    async fn get_conversations(&self, limit: u32) -> Result<Vec<serde_json::Value>, MessagingError>;

    async fn search_conversations(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<serde_json::Value>, MessagingError>;

    async fn reply_to_conversation(
        &self,
        conversation_id: &str,
        body: &str,
        message_type: &str,
        admin_id: Option<&str>,
    ) -> Result<serde_json::Value, MessagingError>;

    async fn create_conversation(
        &self,
        user_id: &str,
        body: &str,
        message_type: &str,
    ) -> Result<serde_json::Value, MessagingError>;

    /// Create or update a user by email; the returned object carries the user `id`.
    async fn create_or_update_user(&self, email: &str) -> Result<serde_json::Value, MessagingError>;

    /// Ask the platform's AI for a suggested reply. Callers treat any error as "no suggestion".
    async fn trigger_ai_suggestion(
        &self,
        conversation_id: &str,
        query: &str,
    ) -> Result<AiSuggestion, MessagingError>;
}
