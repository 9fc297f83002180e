//! Conversation context service
//!
//! Keeps the last N messages of each conversation in the shared Tier-2
//! store only, so every replica sees the same window. Each write refreshes
//! the inactivity TTL.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use domain::{ConversationWindow, DEFAULT_WINDOW_SIZE, Message, value_objects::ConversationId};
use tracing::{debug, instrument, warn};

use crate::ports::{CachePort, CachePortExt, prefix, ttl};

/// Configuration for conversation context
#[derive(Debug, Clone)]
pub struct ConversationContextConfig {
    /// Maximum messages kept per conversation (oldest evicted first)
    pub max_messages: usize,
    /// Inactivity period after which a window is dropped
    pub ttl: Duration,
}

impl Default for ConversationContextConfig {
    fn default() -> Self {
        Self {
            max_messages: DEFAULT_WINDOW_SIZE,
            ttl: ttl::CONVERSATION,
        }
    }
}

/// Service for managing conversation windows
///
/// Concurrent appends to the same conversation are last-write-wins.
pub struct ConversationContextService {
    store: Arc<dyn CachePort>,
    config: ConversationContextConfig,
}

impl std::fmt::Debug for ConversationContextService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationContextService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ConversationContextService {
    /// Create a new conversation context service
    pub fn new(store: Arc<dyn CachePort>, config: ConversationContextConfig) -> Self {
        Self { store, config }
    }

    fn storage_key(id: &ConversationId) -> String {
        format!("{}:{id}", prefix::CONVERSATION)
    }

    /// Current window, if the conversation is known and not expired
    #[instrument(skip(self))]
    pub async fn window(&self, id: &ConversationId) -> Option<ConversationWindow> {
        let mut window: ConversationWindow =
            self.store.get_or_evict(&Self::storage_key(id)).await?;
        if window.capacity() != self.config.max_messages {
            window.resize(self.config.max_messages);
        }
        Some(window)
    }

    /// Append a message and persist the window
    ///
    /// Returns the window as written. If the store is unavailable the
    /// message is only reflected in the returned value.
    #[instrument(skip(self, message), fields(role = ?message.role))]
    pub async fn append(&self, id: &ConversationId, message: Message) -> ConversationWindow {
        let mut window = match self.window(id).await {
            Some(window) => window,
            None => ConversationWindow::with_capacity(*id, self.config.max_messages),
        };

        if window.push(message).is_some() {
            debug!(conversation_id = %id, "Oldest message evicted from window");
        }
        window.last_write = Utc::now();

        if !self
            .store
            .put_soft(&Self::storage_key(id), &window, self.config.ttl)
            .await
        {
            warn!(conversation_id = %id, "Conversation window not persisted");
        }
        window
    }

    /// End a conversation and drop its window
    #[instrument(skip(self))]
    pub async fn close(&self, id: &ConversationId) {
        if let Err(e) = self.store.invalidate(&Self::storage_key(id)).await {
            warn!(conversation_id = %id, error = %e, "Failed to drop conversation window");
        }
    }
}
