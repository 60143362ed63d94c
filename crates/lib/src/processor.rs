//! Event processing: route a verified webhook to its handler, fetch detail from
//! Intercom, format a notification and post it to the Teams channel.
//!
//! Processing runs as a detached tokio task after the webhook has been acknowledged.
//! Failures there are only visible in the logs; nothing is retried and duplicate
//! deliveries produce duplicate messages.

use crate::chat::{ChatError, ChatPlatform, ContentType, SentMessage};
use crate::events::{AssignedItem, ConversationItem, WebhookEnvelope, WebhookEvent};
use crate::format::{NotificationFormatter, NotificationMessage};
use crate::messaging::{AiSuggestion, MessagingError, MessagingPlatform};
use crate::routing::{self, Route};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error(transparent)]
    Messaging(#[from] MessagingError),
    #[error("intercom did not return a user id")]
    MissingUserId,
}

/// What a successful handler did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    ConversationCreatedNotification,
    UserReplyNotification,
    AdminReplyLogged,
    AssignmentNotification,
    ClosureNotification,
}

/// Structured result of processing one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ProcessOutcome {
    Success {
        action: Action,
        conversation_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        fin_ai_used: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        assignee: Option<String>,
    },
    Ignored {
        event_type: String,
    },
    Error {
        message: String,
    },
}

impl ProcessOutcome {
    fn success(action: Action, conversation_id: &str) -> Self {
        ProcessOutcome::Success {
            action,
            conversation_id: conversation_id.to_string(),
            fin_ai_used: None,
            assignee: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        ProcessOutcome::Error {
            message: message.into(),
        }
    }
}

const MISSING_CONVERSATION_ID: &str = "Missing conversation ID";

/// Where notifications go: the default team and the channel name to find or create in it.
#[derive(Debug, Clone)]
pub struct DeliveryTarget {
    /// When unset, handlers skip delivery but still succeed.
    pub team_id: Option<String>,
    pub channel_name: String,
    pub channel_description: String,
}

/// Handles webhook events against the shared chat and messaging clients.
pub struct EventProcessor {
    chat: Arc<dyn ChatPlatform>,
    messaging: Arc<dyn MessagingPlatform>,
    formatter: NotificationFormatter,
    target: DeliveryTarget,
}

impl EventProcessor {
    pub fn new(
        chat: Arc<dyn ChatPlatform>,
        messaging: Arc<dyn MessagingPlatform>,
        formatter: NotificationFormatter,
        target: DeliveryTarget,
    ) -> Self {
        Self {
            chat,
            messaging,
            formatter,
            target,
        }
    }

    pub fn chat(&self) -> &Arc<dyn ChatPlatform> {
        &self.chat
    }

    pub fn messaging(&self) -> &Arc<dyn MessagingPlatform> {
        &self.messaging
    }

    pub fn target(&self) -> &DeliveryTarget {
        &self.target
    }

    /// Route and handle one webhook. Unknown topics return `Ignored`; upstream failures return `Err`.
    pub async fn process(
        &self,
        topic: &str,
        envelope: &WebhookEnvelope,
    ) -> Result<ProcessOutcome, ProcessError> {
        log::info!("processing webhook event: {}", topic);
        let topic = match routing::route(topic) {
            Route::Handle(t) => t,
            Route::Ignored { event_type } => {
                log::info!("unhandled webhook topic: {}", event_type);
                return Ok(ProcessOutcome::Ignored { event_type });
            }
        };
        let event = match WebhookEvent::decode(topic, envelope) {
            Ok(e) => e,
            Err(e) => {
                log::error!("invalid item for {}: {}", topic, e);
                return Ok(ProcessOutcome::error(format!("Invalid event item: {}", e)));
            }
        };
        self.handle(event).await
    }

    /// Run the handler for an already-decoded event.
    pub async fn handle(&self, event: WebhookEvent) -> Result<ProcessOutcome, ProcessError> {
        match event {
            WebhookEvent::UserCreated(item) => self.conversation_created(item).await,
            WebhookEvent::UserReplied(item) => self.user_replied(item).await,
            WebhookEvent::AdminReplied(item) => Ok(self.admin_replied(item)),
            WebhookEvent::AdminAssigned(item) => self.conversation_assigned(item).await,
            WebhookEvent::AdminClosed(item) => self.conversation_closed(item).await,
        }
    }

    async fn conversation_created(
        &self,
        item: ConversationItem,
    ) -> Result<ProcessOutcome, ProcessError> {
        let Some(id) = item.id else {
            log::error!("no conversation id in conversation.user.created webhook");
            return Ok(ProcessOutcome::error(MISSING_CONVERSATION_ID));
        };
        let conversation = self.messaging.get_conversation(&id).await?;
        let created_at = conversation.created_at.unwrap_or_else(Utc::now);
        let message = self.formatter.new_conversation(&conversation, created_at);
        let description = self.target.channel_description.clone();
        self.deliver(&message, Some(&description)).await?;
        Ok(ProcessOutcome::success(
            Action::ConversationCreatedNotification,
            &id,
        ))
    }

    async fn user_replied(&self, item: ConversationItem) -> Result<ProcessOutcome, ProcessError> {
        let Some(id) = item.id else {
            return Ok(ProcessOutcome::error(MISSING_CONVERSATION_ID));
        };
        let parts = self.messaging.get_conversation_parts(&id).await?;
        let Some(latest) = parts.last() else {
            return Ok(ProcessOutcome::error("No conversation parts found"));
        };
        let body = latest.body.clone().unwrap_or_default();
        let suggestion = self.ai_suggestion(&id, &body).await;
        let message = self.formatter.user_reply(
            &id,
            &body,
            suggestion.as_ref().and_then(AiSuggestion::reply),
            Utc::now(),
        );
        self.deliver(&message, None).await?;
        Ok(ProcessOutcome::Success {
            action: Action::UserReplyNotification,
            conversation_id: id,
            fin_ai_used: Some(suggestion.is_some()),
            assignee: None,
        })
    }

    /// Best-effort: any error means "no suggestion".
    async fn ai_suggestion(&self, conversation_id: &str, query: &str) -> Option<AiSuggestion> {
        match self
            .messaging
            .trigger_ai_suggestion(conversation_id, query)
            .await
        {
            Ok(s) => {
                log::info!("generated AI suggestion for conversation {}", conversation_id);
                Some(s)
            }
            Err(e) => {
                log::warn!(
                    "AI suggestion not available for conversation {}: {}",
                    conversation_id,
                    e
                );
                None
            }
        }
    }

    fn admin_replied(&self, item: ConversationItem) -> ProcessOutcome {
        let Some(id) = item.id else {
            return ProcessOutcome::error(MISSING_CONVERSATION_ID);
        };
        log::info!("admin replied to conversation {}", id);
        ProcessOutcome::success(Action::AdminReplyLogged, &id)
    }

    async fn conversation_assigned(
        &self,
        item: AssignedItem,
    ) -> Result<ProcessOutcome, ProcessError> {
        let Some(id) = item.id else {
            return Ok(ProcessOutcome::error(MISSING_CONVERSATION_ID));
        };
        let assignee = item
            .assignee
            .and_then(|a| a.name)
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| "Unknown".to_string());
        let message = self.formatter.assignment(&id, &assignee, Utc::now());
        self.deliver(&message, None).await?;
        Ok(ProcessOutcome::Success {
            action: Action::AssignmentNotification,
            conversation_id: id,
            fin_ai_used: None,
            assignee: Some(assignee),
        })
    }

    async fn conversation_closed(
        &self,
        item: ConversationItem,
    ) -> Result<ProcessOutcome, ProcessError> {
        let Some(id) = item.id else {
            return Ok(ProcessOutcome::error(MISSING_CONVERSATION_ID));
        };
        let message = self.formatter.closure(&id, Utc::now());
        self.deliver(&message, None).await?;
        Ok(ProcessOutcome::success(Action::ClosureNotification, &id))
    }

    /// Post to the default team's channel. No team configured means nothing to do.
    async fn deliver(
        &self,
        message: &NotificationMessage,
        description: Option<&str>,
    ) -> Result<Option<SentMessage>, ProcessError> {
        let Some(team_id) = self.target.team_id.as_deref() else {
            log::debug!(
                "no default team configured, skipping notification for {}",
                message.conversation_id
            );
            return Ok(None);
        };
        let sent = self.post_to_team(team_id, message, description).await?;
        log::info!(
            "sent notification for conversation {} to team {}",
            message.conversation_id,
            team_id
        );
        Ok(Some(sent))
    }

    /// Resolve the channel in `team_id` (find or create, every time) and post the message.
    async fn post_to_team(
        &self,
        team_id: &str,
        message: &NotificationMessage,
        description: Option<&str>,
    ) -> Result<SentMessage, ProcessError> {
        if !self.chat.is_authenticated() {
            return Err(ChatError::NotAuthenticated.into());
        }
        let channel = self
            .chat
            .find_or_create_channel(team_id, &self.target.channel_name, description)
            .await?;
        Ok(self
            .chat
            .send_message(team_id, &channel.id, &message.content, ContentType::Html)
            .await?)
    }

    /// Operator-triggered sync of one conversation's latest message to a team.
    pub async fn sync_conversation(
        &self,
        conversation_id: &str,
        team_id: &str,
    ) -> Result<SentMessage, ProcessError> {
        let conversation = self.messaging.get_conversation(conversation_id).await?;
        let message = self.formatter.manual_sync(&conversation);
        let description = self.target.channel_description.clone();
        self.post_to_team(team_id, &message, Some(&description))
            .await
    }

    /// Forward a chat-originated message into Intercom: reply when a conversation id is
    /// given, otherwise upsert the user by email and open a new conversation.
    pub async fn forward_chat_message(
        &self,
        message: &str,
        user_email: &str,
        conversation_id: Option<&str>,
    ) -> Result<serde_json::Value, ProcessError> {
        if let Some(id) = conversation_id.filter(|id| !id.trim().is_empty()) {
            return Ok(self
                .messaging
                .reply_to_conversation(id, message, "comment", None)
                .await?);
        }
        let user = self.messaging.create_or_update_user(user_email).await?;
        let user_id = match user.get("id") {
            Some(serde_json::Value::String(s)) if !s.is_empty() => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => return Err(ProcessError::MissingUserId),
        };
        Ok(self
            .messaging
            .create_conversation(&user_id, message, "comment")
            .await?)
    }
}

/// Process a webhook on a detached task. The handle is only useful to tests; the
/// webhook endpoint drops it.
pub fn spawn_processing(
    processor: Arc<EventProcessor>,
    delivery_id: String,
    topic: String,
    envelope: WebhookEnvelope,
) -> JoinHandle<Option<ProcessOutcome>> {
    tokio::spawn(async move { process_in_background(&processor, &delivery_id, &topic, &envelope).await })
}

/// Background boundary: handler errors are logged here and go no further.
pub async fn process_in_background(
    processor: &EventProcessor,
    delivery_id: &str,
    topic: &str,
    envelope: &WebhookEnvelope,
) -> Option<ProcessOutcome> {
    match processor.process(topic, envelope).await {
        Ok(outcome) => {
            let rendered = serde_json::to_string(&outcome).unwrap_or_default();
            log::info!("webhook {} ({}) processed: {}", delivery_id, topic, rendered);
            Some(outcome)
        }
        Err(e) => {
            log::error!(
                "background webhook processing failed: delivery={} topic={} conversation={} error={}",
                delivery_id,
                topic,
                envelope.item_id().as_deref().unwrap_or("-"),
                e
            );
            None
        }
    }
}
