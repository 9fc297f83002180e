//! Application configuration
//!
//! Split into focused sub-modules:
//! - `cache`: Tier 1 sizing, per-kind TTLs, semantic cache
//! - `store`: Tier 2 backend selection and deadline
//! - `reranker`: device preference, model budgets, remote service
//!
//! Sources, lowest precedence first: built-in defaults, an optional
//! `config.toml`, then `QUERYCACHE_*` environment variables with `__`
//! between nesting levels (`QUERYCACHE_CACHE__TIER1_CAPACITY=200`).

mod cache;
mod reranker;
mod store;

use std::path::Path;

use ai_core::EmbeddingConfig;
use application::ApplicationError;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub use cache::{CacheConfig, SemanticConfig};
pub use reranker::RerankerAppConfig;
pub use store::{StoreBackend, StoreConfig};

use crate::telemetry::TelemetryConfig;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "QUERYCACHE";

/// Shared default for boolean `true` fields across config structs
pub(crate) const fn default_true() -> bool {
    true
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Tier 1 and TTL configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Semantic cache configuration
    #[serde(default)]
    pub semantic: SemanticConfig,

    /// Tier 2 store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Reranker configuration
    #[serde(default)]
    pub reranker: RerankerAppConfig,

    /// Embedding service; its dimension is the semantic index dimension
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Logging configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load configuration from environment and optional `config.toml`
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::from_sources(None, Self::environment())
    }

    /// Load configuration from an explicit file plus environment
    pub fn load_from(path: &Path) -> Result<Self, config::ConfigError> {
        Self::from_sources(Some(path), Self::environment())
    }

    /// Environment source with the `QUERYCACHE` prefix
    pub fn environment() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    /// Build from a file (`None` = optional `config.toml`) and an environment source
    pub fn from_sources(
        file: Option<&Path>,
        env: config::Environment,
    ) -> Result<Self, config::ConfigError> {
        let file = match file {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("config").required(false),
        };

        config::Config::builder()
            .add_source(file)
            .add_source(env)
            .build()?
            .try_deserialize()
    }

    /// Reject settings that would make a component misbehave silently
    pub fn validate(&self) -> Result<(), ApplicationError> {
        let invalid = |msg: String| -> Result<(), ApplicationError> {
            Err(ApplicationError::Configuration(msg))
        };

        if self.cache.tier1_enabled && self.cache.tier1_capacity == 0 {
            return invalid("cache.tier1_capacity must be positive when Tier 1 is enabled".into());
        }
        if self.cache.conversation_max_messages == 0 {
            return invalid("cache.conversation_max_messages must be positive".into());
        }
        if self.embedding.dimensions == 0 {
            return invalid("embedding.dimensions must be positive".into());
        }
        if !(-1.0..=1.0).contains(&self.semantic.threshold) {
            return invalid(format!(
                "semantic.threshold must be within [-1, 1], got {}",
                self.semantic.threshold
            ));
        }
        if self.semantic.enabled && (self.semantic.max_scan == 0 || self.semantic.max_entries == 0)
        {
            return invalid("semantic.max_scan and semantic.max_entries must be positive".into());
        }
        if self.store.timeout_ms == 0 {
            return invalid("store.timeout_ms must be positive".into());
        }
        if self.store.connect_timeout_ms == 0 {
            return invalid("store.connect_timeout_ms must be positive".into());
        }
        if self.store.backend == StoreBackend::Redis
            && self.store.redis_url.as_deref().is_none_or(str::is_empty)
        {
            return invalid("store.redis_url is required for the redis backend".into());
        }
        if self.reranker.remote.is_some() && self.reranker.remote_timeout_ms == 0 {
            return invalid("reranker.remote_timeout_ms must be positive".into());
        }

        if self.reranker.preferred_device == application::ports::DeviceKind::Accelerated
            && self.reranker.accelerator.is_none()
        {
            warn!("Accelerated reranking preferred but no accelerator configured; will degrade");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, io::Write};

    use application::ports::DeviceKind;

    use super::*;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        AppConfig::environment().source(Some(map))
    }

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache.tier1_capacity, 100);
        assert_eq!(config.cache.answer_ttl().as_secs(), 24 * 60 * 60);
        assert_eq!(config.cache.retrieval_ttl().as_secs(), 60 * 60);
        assert!((config.semantic.threshold - 0.95).abs() < f32::EPSILON);
        assert_eq!(config.semantic.max_scan, 100);
        assert_eq!(config.store.backend, StoreBackend::Redb);
        assert_eq!(config.store.timeout().as_millis(), 250);
        assert_eq!(config.store.connect_timeout().as_millis(), 2000);
        assert_eq!(config.reranker.preferred_device, DeviceKind::Accelerated);
    }

    #[test]
    fn environment_overrides_nested_keys() {
        let config = AppConfig::from_sources(
            None,
            env(&[
                ("QUERYCACHE_CACHE__TIER1_CAPACITY", "200"),
                ("QUERYCACHE_STORE__BACKEND", "redis"),
                ("QUERYCACHE_STORE__REDIS_URL", "redis://cache:6379"),
                ("QUERYCACHE_RERANKER__PREFERRED_DEVICE", "unaccelerated"),
            ]),
        )
        .unwrap();

        assert_eq!(config.cache.tier1_capacity, 200);
        assert_eq!(config.store.backend, StoreBackend::Redis);
        assert_eq!(config.store.redis_url.as_deref(), Some("redis://cache:6379"));
        assert_eq!(config.reranker.preferred_device, DeviceKind::Unaccelerated);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn file_values_are_overridden_by_environment() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[semantic]
threshold = 0.9
max_scan = 50

[store]
backend = "none"
timeout_ms = 100

[embedding]
dimensions = 768
"#
        )
        .unwrap();

        let config = AppConfig::from_sources(
            Some(file.path()),
            env(&[("QUERYCACHE_SEMANTIC__MAX_SCAN", "75")]),
        )
        .unwrap();

        assert!((config.semantic.threshold - 0.9).abs() < f32::EPSILON);
        assert_eq!(config.semantic.max_scan, 75);
        assert_eq!(config.store.backend, StoreBackend::None);
        assert_eq!(config.store.timeout_ms, 100);
        assert_eq!(config.embedding.dimensions, 768);
        assert_eq!(config.cache.tier1_capacity, 100);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let missing = Path::new("/nonexistent/querycache.toml");
        assert!(AppConfig::from_sources(Some(missing), env(&[])).is_err());
    }

    #[test]
    fn validation_rejects_nonsense() {
        let mut config = AppConfig::default();
        config.cache.tier1_capacity = 0;
        assert!(config.validate().unwrap_err().is_configuration());

        let mut config = AppConfig::default();
        config.cache.tier1_enabled = false;
        config.cache.tier1_capacity = 0;
        assert!(config.validate().is_ok());

        let mut config = AppConfig::default();
        config.embedding.dimensions = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.semantic.threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.store.backend = StoreBackend::Redis;
        assert!(config.validate().is_err());
    }

    #[test]
    fn store_backend_parses() {
        assert_eq!("REDIS".parse::<StoreBackend>().unwrap(), StoreBackend::Redis);
        assert_eq!("disabled".parse::<StoreBackend>().unwrap(), StoreBackend::None);
        assert!("memcached".parse::<StoreBackend>().is_err());
        assert_eq!(StoreBackend::Redb.to_string(), "redb");
    }
}
