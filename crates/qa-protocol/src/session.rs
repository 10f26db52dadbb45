//! Session and REST payload types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifies one conversation against one backend.
///
/// Passed explicitly into the client and consumer; there is no ambient
/// session state. The token is opaque plumbing attached as a bearer header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub base_url: String,
    pub session_id: String,
    pub auth_token: Option<String>,
}

impl SessionContext {
    pub fn new(base_url: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            session_id: session_id.into(),
            auth_token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }
}

/// Role in a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A message in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Body for POST /conversations/{id}/messages and the streaming variants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendMessageRequest {
    pub content: String,
}

/// A single reply from the non-streaming message endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Conversation history as returned by GET /conversations/{id}/messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessagesResponse {
    pub session_id: String,
    pub messages: Vec<ConversationMessage>,
}

/// Conversation metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationInfo {
    pub session_id: String,
    pub title: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}
