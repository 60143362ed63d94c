//! In-memory chat and messaging collaborators for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use relay::chat::{
    ChannelMessage, ChannelRef, ChatError, ChatPlatform, ContentType, SentMessage, Team,
};
use relay::config::Config;
use relay::events::WebhookEnvelope;
use relay::format::NotificationFormatter;
use relay::messaging::{
    AiSuggestion, Author, Conversation, ConversationPart, MessagingError, MessagingPlatform,
};
use relay::processor::{DeliveryTarget, EventProcessor};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TEAM_ID: &str = "team-1";
pub const CHANNEL_NAME: &str = "Customer Support";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posted {
    pub team_id: String,
    pub channel_id: String,
    pub content: String,
    pub content_type: ContentType,
}

/// Chat platform that keeps channels and posted messages in memory.
pub struct FakeChat {
    authenticated: AtomicBool,
    channels: Mutex<Vec<ChannelRef>>,
    created: Mutex<Vec<String>>,
    posted: Mutex<Vec<Posted>>,
}

impl FakeChat {
    pub fn new() -> Self {
        Self {
            authenticated: AtomicBool::new(true),
            channels: Mutex::new(vec![ChannelRef {
                id: "general".to_string(),
                display_name: "General".to_string(),
                description: String::new(),
            }]),
            created: Mutex::new(Vec::new()),
            posted: Mutex::new(Vec::new()),
        }
    }

    pub fn unauthenticated() -> Self {
        let chat = Self::new();
        chat.authenticated.store(false, Ordering::SeqCst);
        chat
    }

    /// Pre-existing channel; not recorded as created.
    pub fn add_channel(&self, id: &str, name: &str) {
        self.channels.lock().unwrap().push(ChannelRef {
            id: id.to_string(),
            display_name: name.to_string(),
            description: String::new(),
        });
    }

    pub fn posted(&self) -> Vec<Posted> {
        self.posted.lock().unwrap().clone()
    }

    pub fn created(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }

    /// Wait until at least `n` messages have been posted, or give up after ~5s.
    pub async fn wait_for_posts(&self, n: usize) -> Vec<Posted> {
        for _ in 0..100 {
            let posted = self.posted();
            if posted.len() >= n {
                return posted;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        self.posted()
    }

    fn check(&self) -> Result<(), ChatError> {
        if self.authenticated.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ChatError::NotAuthenticated)
        }
    }
}

#[async_trait]
impl ChatPlatform for FakeChat {
    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    async fn get_teams(&self) -> Result<Vec<Team>, ChatError> {
        self.check()?;
        Ok(vec![Team {
            id: TEAM_ID.to_string(),
            display_name: "Support".to_string(),
            description: String::new(),
        }])
    }

    async fn get_channels(&self, _team_id: &str) -> Result<Vec<ChannelRef>, ChatError> {
        self.check()?;
        Ok(self.channels.lock().unwrap().clone())
    }

    async fn create_channel(
        &self,
        _team_id: &str,
        name: &str,
        description: &str,
    ) -> Result<ChannelRef, ChatError> {
        self.check()?;
        let mut channels = self.channels.lock().unwrap();
        let channel = ChannelRef {
            id: format!("channel-{}", channels.len()),
            display_name: name.to_string(),
            description: description.to_string(),
        };
        channels.push(channel.clone());
        self.created.lock().unwrap().push(name.to_string());
        Ok(channel)
    }

    async fn send_message(
        &self,
        team_id: &str,
        channel_id: &str,
        content: &str,
        content_type: ContentType,
    ) -> Result<SentMessage, ChatError> {
        self.check()?;
        let mut posted = self.posted.lock().unwrap();
        posted.push(Posted {
            team_id: team_id.to_string(),
            channel_id: channel_id.to_string(),
            content: content.to_string(),
            content_type,
        });
        Ok(SentMessage {
            id: format!("msg-{}", posted.len()),
            content: content.to_string(),
            created_date_time: Some("2025-01-01T10:00:00Z".to_string()),
        })
    }

    async fn get_messages(
        &self,
        _team_id: &str,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<ChannelMessage>, ChatError> {
        self.check()?;
        Ok(self
            .posted()
            .into_iter()
            .filter(|p| p.channel_id == channel_id)
            .enumerate()
            .map(|(i, p)| ChannelMessage {
                id: format!("msg-{}", i + 1),
                content: p.content,
                content_type: p.content_type,
                created_date_time: None,
                from: "Relay".to_string(),
            })
            .take(limit)
            .collect())
    }
}

/// What the fake AI suggestion call does.
#[derive(Debug, Clone)]
pub enum AiBehavior {
    Fail,
    Reply(String),
}

/// Messaging platform backed by a fixed set of conversations.
pub struct FakeMessaging {
    conversations: HashMap<String, Conversation>,
    ai: AiBehavior,
    replies: Mutex<Vec<(String, String)>>,
    opened: Mutex<Vec<(String, String)>>,
}

impl FakeMessaging {
    pub fn new(ai: AiBehavior) -> Self {
        let mut conversations = HashMap::new();
        conversations.insert("conv1".to_string(), conversation("conv1"));
        Self {
            conversations,
            ai,
            replies: Mutex::new(Vec::new()),
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn with_conversation(mut self, conversation: Conversation) -> Self {
        self.conversations
            .insert(conversation.id.clone(), conversation);
        self
    }

    /// (conversation id, body) of every reply sent.
    pub fn replies(&self) -> Vec<(String, String)> {
        self.replies.lock().unwrap().clone()
    }

    /// (user id, body) of every conversation opened.
    pub fn opened(&self) -> Vec<(String, String)> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingPlatform for FakeMessaging {
    async fn get_conversation(&self, conversation_id: &str) -> Result<Conversation, MessagingError> {
        self.conversations
            .get(conversation_id)
            .cloned()
            .ok_or_else(|| MessagingError::Api {
                status: 404,
                message: "Resource Not Found".to_string(),
            })
    }

    async fn get_conversations(&self, limit: u32) -> Result<Vec<serde_json::Value>, MessagingError> {
        let mut ids: Vec<&String> = self.conversations.keys().collect();
        ids.sort();
        Ok(ids
            .into_iter()
            .take(limit as usize)
            .map(|id| json!({ "id": id }))
            .collect())
    }

    async fn search_conversations(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<serde_json::Value>, MessagingError> {
        let mut hits: Vec<&Conversation> = self
            .conversations
            .values()
            .filter(|c| {
                c.parts
                    .iter()
                    .any(|p| p.body.as_deref().unwrap_or("").contains(query))
            })
            .collect();
        hits.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(hits
            .into_iter()
            .take(limit as usize)
            .map(|c| json!({ "id": c.id }))
            .collect())
    }

    async fn reply_to_conversation(
        &self,
        conversation_id: &str,
        body: &str,
        message_type: &str,
        _admin_id: Option<&str>,
    ) -> Result<serde_json::Value, MessagingError> {
        self.replies
            .lock()
            .unwrap()
            .push((conversation_id.to_string(), body.to_string()));
        Ok(json!({ "type": "conversation", "id": conversation_id, "message_type": message_type }))
    }

    async fn create_conversation(
        &self,
        user_id: &str,
        body: &str,
        _message_type: &str,
    ) -> Result<serde_json::Value, MessagingError> {
        self.opened
            .lock()
            .unwrap()
            .push((user_id.to_string(), body.to_string()));
        Ok(json!({ "type": "user_message", "conversation_id": "new-conv" }))
    }

    async fn create_or_update_user(&self, email: &str) -> Result<serde_json::Value, MessagingError> {
        Ok(json!({ "type": "contact", "id": "user-42", "email": email }))
    }

    async fn trigger_ai_suggestion(
        &self,
        _conversation_id: &str,
        _query: &str,
    ) -> Result<AiSuggestion, MessagingError> {
        match &self.ai {
            AiBehavior::Fail => Err(MessagingError::Api {
                status: 404,
                message: "Resource Not Found".to_string(),
            }),
            AiBehavior::Reply(reply) => Ok(AiSuggestion {
                suggested_reply: Some(reply.clone()),
            }),
        }
    }
}

/// A conversation from "Test User <test@example.com>" with two parts.
pub fn conversation(id: &str) -> Conversation {
    Conversation {
        id: id.to_string(),
        author: Author {
            name: Some("Test User".to_string()),
            email: Some("test@example.com".to_string()),
        },
        created_at: None,
        parts: vec![
            ConversationPart {
                body: Some("<p>Hello, I need help</p>".to_string()),
                author: Author::default(),
            },
            ConversationPart {
                body: Some("<p>Is anyone there?</p>".to_string()),
                author: Author::default(),
            },
        ],
    }
}

pub fn target(team_id: Option<&str>) -> DeliveryTarget {
    DeliveryTarget {
        team_id: team_id.map(str::to_string),
        channel_name: CHANNEL_NAME.to_string(),
        channel_description: "Customer support inquiries from Intercom".to_string(),
    }
}

pub fn event_processor(
    chat: Arc<FakeChat>,
    messaging: Arc<FakeMessaging>,
    team_id: Option<&str>,
) -> Arc<EventProcessor> {
    Arc::new(EventProcessor::new(
        chat,
        messaging,
        NotificationFormatter::default(),
        target(team_id),
    ))
}

/// Config for router tests: a webhook secret and the default team set.
pub fn config(secret: Option<&str>) -> Config {
    let mut config = Config::default();
    config.intercom.webhook_secret = secret.map(str::to_string);
    config.relay.default_team_id = Some(TEAM_ID.to_string());
    config
}

pub fn envelope(topic: &str, item: serde_json::Value) -> WebhookEnvelope {
    let body = json!({ "topic": topic, "data": { "item": item } }).to_string();
    WebhookEnvelope::parse(body.as_bytes()).expect("envelope").1
}
