//! Bounded conversation history kept in the persistent tier

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::ConversationId;

/// Default number of messages retained per conversation
pub const DEFAULT_WINDOW_SIZE: usize = 20;

/// Role of the message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message from the user
    User,
    /// Message from the assistant
    Assistant,
    /// System prompt or instruction
    System,
}

/// A single message in a conversation window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the sender
    pub role: MessageRole,
    /// Message content
    pub content: String,
    /// When the message was created
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::Assistant, content)
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::System, content)
    }

    fn with_role(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// The most recent messages of one conversation
///
/// Append-only; once `capacity` is reached the oldest message is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationWindow {
    /// Conversation this window belongs to
    pub conversation_id: ConversationId,
    /// Messages, oldest first
    pub messages: VecDeque<Message>,
    /// Time of the last append
    pub last_write: DateTime<Utc>,
    /// Maximum retained messages
    capacity: usize,
}

impl ConversationWindow {
    /// Create an empty window with the default capacity
    pub fn new(conversation_id: ConversationId) -> Self {
        Self::with_capacity(conversation_id, DEFAULT_WINDOW_SIZE)
    }

    /// Create an empty window; a zero capacity is raised to one
    pub fn with_capacity(conversation_id: ConversationId, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            conversation_id,
            messages: VecDeque::with_capacity(capacity),
            last_write: Utc::now(),
            capacity,
        }
    }

    /// Maximum retained messages
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a message, evicting the oldest when full
    ///
    /// Returns the evicted message, if any.
    pub fn push(&mut self, message: Message) -> Option<Message> {
        let evicted = if self.messages.len() >= self.capacity {
            self.messages.pop_front()
        } else {
            None
        };
        self.last_write = message.created_at.max(self.last_write);
        self.messages.push_back(message);
        evicted
    }

    /// Change the capacity, trimming the oldest messages if needed
    pub fn resize(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.messages.len() > self.capacity {
            self.messages.pop_front();
        }
    }

    /// Number of retained messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the window holds no messages
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The last `n` messages, oldest first
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &Message> {
        self.messages.iter().skip(self.messages.len().saturating_sub(n))
    }
}
