//! Cache tier and semantic cache configuration.

use std::time::Duration;

use application::DEFAULT_THRESHOLD;
use domain::DEFAULT_WINDOW_SIZE;
use serde::{Deserialize, Serialize};

use super::default_true;
use crate::cache::{DEFAULT_CAPACITY, DEFAULT_MAX_ENTRIES, DEFAULT_MAX_SCAN};

/// Tier 1 sizing and TTLs per cache kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether the in-process Tier 1 is used
    #[serde(default = "default_true")]
    pub tier1_enabled: bool,

    /// Tier 1 entries per cache kind (default: 100)
    #[serde(default = "default_tier1_capacity")]
    pub tier1_capacity: usize,

    /// TTL for exact-match answers in seconds (default: 24 hours)
    #[serde(default = "default_answer_ttl")]
    pub answer_ttl_secs: u64,

    /// TTL for retrieval results in seconds (default: 1 hour)
    #[serde(default = "default_retrieval_ttl")]
    pub retrieval_ttl_secs: u64,

    /// Inactivity TTL for conversation windows in seconds (default: 1 hour)
    #[serde(default = "default_conversation_ttl")]
    pub conversation_ttl_secs: u64,

    /// Messages kept per conversation window (default: 20)
    #[serde(default = "default_conversation_max_messages")]
    pub conversation_max_messages: usize,
}

const fn default_tier1_capacity() -> usize {
    DEFAULT_CAPACITY
}

const fn default_answer_ttl() -> u64 {
    24 * 60 * 60 // 24 hours
}

const fn default_retrieval_ttl() -> u64 {
    60 * 60 // 1 hour
}

const fn default_conversation_ttl() -> u64 {
    60 * 60 // 1 hour
}

const fn default_conversation_max_messages() -> usize {
    DEFAULT_WINDOW_SIZE
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            tier1_enabled: true,
            tier1_capacity: default_tier1_capacity(),
            answer_ttl_secs: default_answer_ttl(),
            retrieval_ttl_secs: default_retrieval_ttl(),
            conversation_ttl_secs: default_conversation_ttl(),
            conversation_max_messages: default_conversation_max_messages(),
        }
    }
}

impl CacheConfig {
    /// Get the answer TTL as a Duration
    #[must_use]
    pub const fn answer_ttl(&self) -> Duration {
        Duration::from_secs(self.answer_ttl_secs)
    }

    /// Get the retrieval TTL as a Duration
    #[must_use]
    pub const fn retrieval_ttl(&self) -> Duration {
        Duration::from_secs(self.retrieval_ttl_secs)
    }

    /// Get the conversation TTL as a Duration
    #[must_use]
    pub const fn conversation_ttl(&self) -> Duration {
        Duration::from_secs(self.conversation_ttl_secs)
    }
}

/// Semantic (embedding similarity) cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticConfig {
    /// Whether paraphrase lookups are attempted
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minimum cosine similarity for a hit, inclusive (default: 0.95)
    #[serde(default = "default_threshold")]
    pub threshold: f32,

    /// Most recent entries compared per lookup (default: 100)
    #[serde(default = "default_max_scan")]
    pub max_scan: usize,

    /// Index size before the oldest entries are evicted (default: 10000)
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

const fn default_threshold() -> f32 {
    DEFAULT_THRESHOLD
}

const fn default_max_scan() -> usize {
    DEFAULT_MAX_SCAN
}

const fn default_max_entries() -> usize {
    DEFAULT_MAX_ENTRIES
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: default_threshold(),
            max_scan: default_max_scan(),
            max_entries: default_max_entries(),
        }
    }
}
