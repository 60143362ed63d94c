//! Notification formatting: conversation events -> Teams HTML messages.
//!
//! Everything here is pure; timestamps are passed in by the caller. Every message ends
//! with a link back to the conversation in Intercom.

use crate::messaging::Conversation;
use chrono::{DateTime, Utc};

pub const DEFAULT_APP_URL: &str = "https://app.intercom.com/a/apps";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// A formatted chat message about one conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationMessage {
    pub conversation_id: String,
    /// HTML content.
    pub content: String,
}

/// Builds notification messages; `app_url` is the base for deep links.
#[derive(Debug, Clone)]
pub struct NotificationFormatter {
    app_url: String,
}

impl Default for NotificationFormatter {
    fn default() -> Self {
        Self::new(None)
    }
}

impl NotificationFormatter {
    pub fn new(app_url: Option<String>) -> Self {
        let app_url = app_url
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_APP_URL.to_string());
        Self { app_url }
    }

    /// Deep link to a conversation.
    pub fn conversation_link(&self, conversation_id: &str) -> String {
        format!("{}/{}", self.app_url, conversation_id)
    }

    fn link_line(&self, conversation_id: &str) -> String {
        format!(
            "<p><a href=\"{}\">View in Intercom</a></p>",
            escape_html(&self.conversation_link(conversation_id))
        )
    }

    /// New conversation: customer, id, creation time and the first message.
    pub fn new_conversation(
        &self,
        conversation: &Conversation,
        created_at: DateTime<Utc>,
    ) -> NotificationMessage {
        let id = &conversation.id;
        let name = non_blank(conversation.author.name.as_deref()).unwrap_or("Unknown User");
        let email = non_blank(conversation.author.email.as_deref()).unwrap_or("No email");
        let first = conversation
            .first_part()
            .and_then(|p| non_blank(p.body.as_deref()))
            .unwrap_or("No message content");
        let content = [
            "<p>🔔 <strong>New Customer Inquiry</strong></p>".to_string(),
            format!(
                "<p><strong>Customer:</strong> {} ({})<br>\n<strong>Conversation ID:</strong> {}<br>\n<strong>Created:</strong> {}</p>",
                escape_html(name),
                escape_html(email),
                escape_html(id),
                created_at.format(TIME_FORMAT)
            ),
            "<p><strong>Message:</strong></p>".to_string(),
            format!("<div>{}</div>", first),
            self.link_line(id),
        ]
        .join("\n");
        NotificationMessage {
            conversation_id: id.clone(),
            content,
        }
    }

    /// Customer reply: latest message plus an optional AI-suggested response.
    pub fn user_reply(
        &self,
        conversation_id: &str,
        message_body: &str,
        suggestion: Option<&str>,
        at: DateTime<Utc>,
    ) -> NotificationMessage {
        let mut lines = vec![
            format!(
                "<p>💬 <strong>Customer Reply - Conversation {}</strong></p>",
                escape_html(conversation_id)
            ),
            "<p><strong>Customer Message:</strong></p>".to_string(),
            format!("<div>{}</div>", message_body),
            format!("<p><strong>Time:</strong> {}</p>", at.format(TIME_FORMAT)),
        ];
        if let Some(reply) = suggestion.and_then(|s| non_blank(Some(s))) {
            lines.push("<p>🤖 <strong>FIN AI Suggested Response:</strong></p>".to_string());
            lines.push(format!("<p>{}</p>", escape_html(reply)));
        }
        lines.push(self.link_line(conversation_id));
        NotificationMessage {
            conversation_id: conversation_id.to_string(),
            content: lines.join("\n"),
        }
    }

    pub fn assignment(
        &self,
        conversation_id: &str,
        assignee: &str,
        at: DateTime<Utc>,
    ) -> NotificationMessage {
        let content = [
            "<p>👤 <strong>Conversation Assigned</strong></p>".to_string(),
            format!(
                "<p><strong>Conversation ID:</strong> {}<br>\n<strong>Assigned to:</strong> {}<br>\n<strong>Time:</strong> {}</p>",
                escape_html(conversation_id),
                escape_html(assignee),
                at.format(TIME_FORMAT)
            ),
            self.link_line(conversation_id),
        ]
        .join("\n");
        NotificationMessage {
            conversation_id: conversation_id.to_string(),
            content,
        }
    }

    pub fn closure(&self, conversation_id: &str, closed_at: DateTime<Utc>) -> NotificationMessage {
        let content = [
            "<p>✅ <strong>Conversation Closed</strong></p>".to_string(),
            format!(
                "<p><strong>Conversation ID:</strong> {}<br>\n<strong>Closed at:</strong> {}</p>",
                escape_html(conversation_id),
                closed_at.format(TIME_FORMAT)
            ),
            self.link_line(conversation_id),
        ]
        .join("\n");
        NotificationMessage {
            conversation_id: conversation_id.to_string(),
            content,
        }
    }

    /// Operator-triggered sync: customer and the latest message.
    pub fn manual_sync(&self, conversation: &Conversation) -> NotificationMessage {
        let id = &conversation.id;
        let name = non_blank(conversation.author.name.as_deref()).unwrap_or("Unknown User");
        let email = non_blank(conversation.author.email.as_deref()).unwrap_or("No email");
        let latest = conversation
            .latest_part()
            .and_then(|p| non_blank(p.body.as_deref()))
            .unwrap_or("No message content");
        let content = [
            format!(
                "<p>🔄 <strong>Manual Sync - Conversation {}</strong></p>",
                escape_html(id)
            ),
            format!(
                "<p><strong>Customer:</strong> {} ({})</p>",
                escape_html(name),
                escape_html(email)
            ),
            "<p><strong>Latest Message:</strong></p>".to_string(),
            format!("<div>{}</div>", latest),
            self.link_line(id),
        ]
        .join("\n");
        NotificationMessage {
            conversation_id: id.clone(),
            content,
        }
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.trim().is_empty())
}

/// Escape text for embedding in HTML element content or attribute values.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
