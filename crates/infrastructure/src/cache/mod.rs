//! Cache implementations
//!
//! Provides the storage tiers behind the application cache services:
//! - `BoundedLru`: per-process Tier 1 with strict LRU eviction and TTL
//! - `RedbStore`: embedded durable Tier 2 for single-host deployments
//! - `RedisStore`: shared Tier 2 for multi-process deployments
//! - `NullStore`: disabled Tier 2
//! - `FailSoftStore`: deadline + fail-soft wrapper around any Tier 2
//! - `TieredCache`: Tier 1 over Tier 2 with backfill, one per cache kind
//! - `InMemorySemanticIndex`: embedding index for the semantic cache

mod fail_soft;
mod lru_cache;
mod null_store;
mod redb_store;
mod redis_store;
mod semantic_index;
mod tiered;

pub use fail_soft::{DEFAULT_STORE_TIMEOUT, FailSoftStore};
pub use lru_cache::{BoundedLru, DEFAULT_CAPACITY};
pub use null_store::NullStore;
pub use redb_store::RedbStore;
pub use redis_store::RedisStore;
pub use semantic_index::{
    DEFAULT_MAX_ENTRIES, DEFAULT_MAX_SCAN, InMemorySemanticIndex, SemanticIndexConfig,
};
pub use tiered::TieredCache;
