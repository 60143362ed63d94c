//! Topic routing: webhook topic string -> handler.
//!
//! Exact string match only. Topics without a handler are routed to `Route::Ignored`,
//! which is a normal outcome rather than an error.

use std::fmt;

/// Registered webhook topics, one handler each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    UserCreated,
    UserReplied,
    AdminReplied,
    AdminAssigned,
    AdminClosed,
}

impl Topic {
    pub const ALL: [Topic; 5] = [
        Topic::UserCreated,
        Topic::UserReplied,
        Topic::AdminReplied,
        Topic::AdminAssigned,
        Topic::AdminClosed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Topic::UserCreated => "conversation.user.created",
            Topic::UserReplied => "conversation.user.replied",
            Topic::AdminReplied => "conversation.admin.replied",
            Topic::AdminAssigned => "conversation.admin.assigned",
            Topic::AdminClosed => "conversation.admin.closed",
        }
    }

    /// Exact, case-sensitive lookup.
    pub fn from_topic(topic: &str) -> Option<Topic> {
        Topic::ALL.into_iter().find(|t| t.as_str() == topic)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of looking a topic up in the routing table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Handle(Topic),
    Ignored { event_type: String },
}

/// Route a topic to its handler, or to `Ignored` when nothing is registered.
pub fn route(topic: &str) -> Route {
    match Topic::from_topic(topic) {
        Some(t) => Route::Handle(t),
        None => Route::Ignored {
            event_type: topic.to_string(),
        },
    }
}
