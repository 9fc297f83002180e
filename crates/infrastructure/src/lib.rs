//! Infrastructure layer - Adapters for external systems
//!
//! Implements ports defined in the application layer.
//! Contains the cache tiers (LRU, redb, Redis), the reranker fallback chain,
//! configuration loading and the wiring that builds a cache stack.

pub mod adapters;
pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod telemetry;
#[cfg(test)]
pub mod testing;

pub use adapters::*;
pub use bootstrap::{CacheStack, StackStats, Tier2Store, build_embedder, build_reranker};
pub use cache::{
    BoundedLru, FailSoftStore, InMemorySemanticIndex, NullStore, RedbStore, RedisStore,
    SemanticIndexConfig, TieredCache,
};
pub use config::{
    AppConfig, CacheConfig, RerankerAppConfig, SemanticConfig, StoreBackend, StoreConfig,
};
pub use telemetry::{TelemetryConfig, TelemetryError, init_telemetry};
