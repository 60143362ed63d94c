//! Chat platform (Microsoft Teams via Graph): teams, channels, and channel messages.
//!
//! `ChatPlatform` is the capability set the relay consumes. `find_or_create_channel`
//! is provided on the trait so every backend shares the same lookup policy.

mod graph;

pub use graph::{GraphClient, GraphCredentials, DEFAULT_AUTHORITY_URL, DEFAULT_GRAPH_BASE_URL};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("not authenticated with Microsoft Graph")]
    NotAuthenticated,
    #[error("graph request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("graph api error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("graph client misconfigured: {0}")]
    Config(String),
}

/// Message body format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Html,
    Text,
}

impl ContentType {
    /// "html" (any case) is HTML; everything else is plain text.
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("html") {
            ContentType::Html
        } else {
            ContentType::Text
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
}

/// A channel within a team, as resolved by lookup or creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelRef {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentMessage {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub created_date_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMessage {
    pub id: String,
    pub content: String,
    pub content_type: ContentType,
    #[serde(default)]
    pub created_date_time: Option<String>,
    pub from: String,
}

/// Operations the relay needs from the chat platform.
///
/// One authenticated handle is shared by all concurrent tasks; implementations must
/// tolerate concurrent calls and fail with `ChatError::NotAuthenticated` when not signed in.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    fn is_authenticated(&self) -> bool;

    async fn get_teams(&self) -> Result<Vec<Team>, ChatError>;

    async fn get_channels(&self, team_id: &str) -> Result<Vec<ChannelRef>, ChatError>;

    async fn create_channel(
        &self,
        team_id: &str,
        name: &str,
        description: &str,
    ) -> Result<ChannelRef, ChatError>;

    async fn send_message(
        &self,
        team_id: &str,
        channel_id: &str,
        content: &str,
        content_type: ContentType,
    ) -> Result<SentMessage, ChatError>;

    async fn get_messages(
        &self,
        team_id: &str,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<ChannelMessage>, ChatError>;

    /// Return the channel whose display name matches `name` case-insensitively, creating it if absent.
    ///
    /// Not atomic: two concurrent callers can both miss and both create.
    async fn find_or_create_channel(
        &self,
        team_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<ChannelRef, ChatError> {
        let wanted = name.to_lowercase();
        let channels = self.get_channels(team_id).await?;
        if let Some(found) = channels
            .into_iter()
            .find(|c| c.display_name.to_lowercase() == wanted)
        {
            log::debug!("found existing channel '{}' in team {}", name, team_id);
            return Ok(found);
        }
        log::info!("channel '{}' not found, creating it in team {}", name, team_id);
        self.create_channel(team_id, name, description.unwrap_or(""))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ListOnly {
        channels: Vec<ChannelRef>,
        created: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatPlatform for ListOnly {
        fn is_authenticated(&self) -> bool {
            true
        }
        async fn get_teams(&self) -> Result<Vec<Team>, ChatError> {
            Ok(Vec::new())
        }
        async fn get_channels(&self, _team_id: &str) -> Result<Vec<ChannelRef>, ChatError> {
            Ok(self.channels.clone())
        }
        async fn create_channel(
            &self,
            _team_id: &str,
            name: &str,
            description: &str,
        ) -> Result<ChannelRef, ChatError> {
            self.created.lock().unwrap().push(name.to_string());
            Ok(ChannelRef {
                id: "new".to_string(),
                display_name: name.to_string(),
                description: description.to_string(),
            })
        }
        async fn send_message(
            &self,
            _team_id: &str,
            _channel_id: &str,
            _content: &str,
            _content_type: ContentType,
        ) -> Result<SentMessage, ChatError> {
            Err(ChatError::NotAuthenticated)
        }
        async fn get_messages(
            &self,
            _team_id: &str,
            _channel_id: &str,
            _limit: usize,
        ) -> Result<Vec<ChannelMessage>, ChatError> {
            Ok(Vec::new())
        }
    }

    fn channel(id: &str, name: &str) -> ChannelRef {
        ChannelRef {
            id: id.to_string(),
            display_name: name.to_string(),
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn find_matches_case_insensitively() {
        let chat = ListOnly {
            channels: vec![channel("1", "General"), channel("2", "Customer Support")],
            created: Mutex::new(Vec::new()),
        };
        let found = chat
            .find_or_create_channel("t", "customer support", None)
            .await
            .expect("channel");
        assert_eq!(found.id, "2");
        assert!(chat.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn creates_when_missing() {
        let chat = ListOnly {
            channels: vec![channel("1", "General")],
            created: Mutex::new(Vec::new()),
        };
        let found = chat
            .find_or_create_channel("t", "Customer Support", Some("desc"))
            .await
            .expect("channel");
        assert_eq!(found.id, "new");
        assert_eq!(found.description, "desc");
        assert_eq!(*chat.created.lock().unwrap(), vec!["Customer Support".to_string()]);
    }

    #[test]
    fn content_type_parse() {
        assert_eq!(ContentType::parse("HTML"), ContentType::Html);
        assert_eq!(ContentType::parse("text"), ContentType::Text);
        assert_eq!(ContentType::parse("markdown"), ContentType::Text);
    }
}
