//! Cache stack wiring
//!
//! Builds every cache component exactly once from an [`AppConfig`] and
//! hands out shared handles. Nothing here is global: a process that wants
//! two independent stacks (tests do) simply builds two.

use std::sync::Arc;

use application::{
    AnswerCache, ApplicationError, CacheInvalidationCoordinator, ConversationContextConfig,
    ConversationContextService, InvalidationStats, QueryService, RetrievalCache, SemanticCache,
    ports::{
        AnswerGeneratorPort, CachePort, CacheStats, EmbeddingPort, RemoteRerankPort,
        RerankerStats, SimilaritySearchPort, prefix,
    },
};
use tracing::{info, warn};

use crate::{
    adapters::{
        CircuitBreaker, LexicalRerankLoader, OllamaEmbeddingAdapter, RemoteRerankAdapter,
        ResilientReranker,
    },
    cache::{
        BoundedLru, FailSoftStore, InMemorySemanticIndex, NullStore, RedbStore, RedisStore,
        SemanticIndexConfig, TieredCache,
    },
    config::{AppConfig, RerankerAppConfig, StoreBackend, StoreConfig},
};

/// The shared Tier 2 store, wrapped in its fail-soft layer
#[derive(Debug, Clone)]
pub enum Tier2Store {
    /// Embedded redb file
    Redb(Arc<FailSoftStore<RedbStore>>),
    /// Redis server
    Redis(Arc<FailSoftStore<RedisStore>>),
    /// Tier 2 disabled
    Disabled(Arc<NullStore>),
    /// Any other implementation, used as given
    Custom(Arc<dyn CachePort>),
}

impl Tier2Store {
    /// Open the configured backend
    ///
    /// A malformed configuration is an error. An unreachable or unopenable
    /// store is not: Tier 2 is disabled for this process with a warning.
    pub async fn open(config: &StoreConfig) -> Result<Self, ApplicationError> {
        let timeout = config.timeout();
        let opened = match config.backend {
            StoreBackend::Redb => RedbStore::open(&config.path)
                .map(|store| Self::Redb(Arc::new(FailSoftStore::new(store, timeout)))),
            StoreBackend::Redis => {
                let url = config.redis_url.as_deref().ok_or_else(|| {
                    ApplicationError::Configuration(
                        "store.redis_url is required for the redis backend".into(),
                    )
                })?;
                RedisStore::connect(url, config.connect_timeout())
                    .await
                    .map(|store| Self::Redis(Arc::new(FailSoftStore::new(store, timeout))))
            },
            StoreBackend::None => Ok(Self::Disabled(Arc::new(NullStore))),
        };

        match opened {
            Ok(store) => Ok(store),
            Err(e) if e.is_configuration() => Err(e),
            Err(e) => {
                warn!(backend = %config.backend, error = %e, "Tier 2 store unavailable, running without it");
                Ok(Self::Disabled(Arc::new(NullStore)))
            },
        }
    }

    /// Port handed to the cache services
    pub fn port(&self) -> Arc<dyn CachePort> {
        match self {
            Self::Redb(store) => Arc::clone(store) as Arc<dyn CachePort>,
            Self::Redis(store) => Arc::clone(store) as Arc<dyn CachePort>,
            Self::Disabled(store) => Arc::clone(store) as Arc<dyn CachePort>,
            Self::Custom(store) => Arc::clone(store),
        }
    }

    /// Backend label
    pub const fn backend(&self) -> &'static str {
        match self {
            Self::Redb(_) => "redb",
            Self::Redis(_) => "redis",
            Self::Disabled(_) => "none",
            Self::Custom(_) => "custom",
        }
    }

    /// Operations absorbed by the fail-soft layer so far
    pub fn failures(&self) -> u64 {
        match self {
            Self::Redb(store) => store.failures(),
            Self::Redis(store) => store.failures(),
            Self::Disabled(_) | Self::Custom(_) => 0,
        }
    }

    /// Entries currently held by the backend
    pub async fn entry_count(&self) -> Result<u64, ApplicationError> {
        match self {
            Self::Redb(store) => Ok(store.inner().entry_count()),
            Self::Redis(store) => store.inner().entry_count().await,
            Self::Disabled(_) => Ok(0),
            Self::Custom(store) => Ok(store.stats().entries),
        }
    }

    /// Remove expired entries; backends with native expiry report 0
    pub async fn purge_expired(&self) -> Result<u64, ApplicationError> {
        match self {
            Self::Redb(store) => store.inner().cleanup_expired().await,
            Self::Redis(_) | Self::Disabled(_) | Self::Custom(_) => Ok(0),
        }
    }
}

/// Build the reranker chain from configuration
pub fn build_reranker(config: &RerankerAppConfig) -> Result<ResilientReranker, ApplicationError> {
    let loader = LexicalRerankLoader::new(
        config.model.clone(),
        config.accelerator.clone(),
        config.host.clone(),
    );

    let remote = config
        .remote
        .clone()
        .map(|remote| {
            RemoteRerankAdapter::new(remote)
                .map(|adapter| Arc::new(adapter) as Arc<dyn RemoteRerankPort>)
                .map_err(|e| {
                    ApplicationError::Configuration(format!("Invalid remote reranker: {e}"))
                })
        })
        .transpose()?;

    Ok(ResilientReranker::new(
        Arc::new(loader),
        remote,
        CircuitBreaker::new("remote-rerank", config.circuit_breaker.clone()),
        config.preferred_device,
        config.remote_timeout(),
    ))
}

/// Build the embedding collaborator from configuration
pub fn build_embedder(config: &AppConfig) -> Result<Arc<dyn EmbeddingPort>, ApplicationError> {
    Ok(Arc::new(OllamaEmbeddingAdapter::new(config.embedding.clone())?))
}

/// Point-in-time view of every component
#[derive(Debug, Clone)]
pub struct StackStats {
    /// Tier 2 backend label
    pub backend: &'static str,
    /// Answer cache, both tiers
    pub answers: CacheStats,
    /// Retrieval cache, both tiers
    pub retrieval: CacheStats,
    /// Tier 2 alone
    pub tier2: CacheStats,
    /// Tier 2 operations absorbed as misses
    pub store_failures: u64,
    /// Semantic index size
    pub semantic_entries: usize,
    /// Documents with tracked retrieval links in this process
    pub linked_documents: usize,
    /// Reranker state and usage
    pub reranker: RerankerStats,
    /// Applied invalidations
    pub invalidation: InvalidationStats,
}

/// Every cache component of one process
#[derive(Debug)]
pub struct CacheStack {
    tier2: Tier2Store,
    answer_tier: Arc<TieredCache>,
    retrieval_tier: Arc<TieredCache>,
    answers: AnswerCache,
    semantic: SemanticCache,
    retrieval: Arc<RetrievalCache>,
    conversations: Arc<ConversationContextService>,
    reranker: Arc<ResilientReranker>,
    invalidation: CacheInvalidationCoordinator,
}

impl CacheStack {
    /// Build the stack described by `config`
    ///
    /// Must be called inside a tokio runtime; the invalidation worker is
    /// spawned here.
    pub async fn build(config: &AppConfig) -> Result<Self, ApplicationError> {
        config.validate()?;
        let tier2 = Tier2Store::open(&config.store).await?;
        let reranker = Arc::new(build_reranker(&config.reranker)?);

        if config.reranker.warm_up {
            let state = reranker.warm_up().await;
            info!(%state, "Reranker warmed up");
        }

        Ok(Self::assemble(config, tier2, reranker))
    }

    /// Wire the services over an already opened Tier 2 and reranker
    pub fn assemble(config: &AppConfig, tier2: Tier2Store, reranker: Arc<ResilientReranker>) -> Self {
        let l2 = tier2.port();
        let l1 = || {
            if config.cache.tier1_enabled {
                BoundedLru::with_capacity(config.cache.tier1_capacity)
            } else {
                None
            }
        };

        let answer_tier = Arc::new(TieredCache::new(
            prefix::ANSWER,
            l1(),
            Arc::clone(&l2),
            config.cache.answer_ttl(),
        ));
        let retrieval_tier = Arc::new(TieredCache::new(
            prefix::RETRIEVAL,
            l1(),
            Arc::clone(&l2),
            config.cache.retrieval_ttl(),
        ));

        let answers = AnswerCache::new(
            Arc::clone(&answer_tier) as Arc<dyn CachePort>,
            config.cache.answer_ttl(),
        );

        let semantic = if config.semantic.enabled {
            let index = InMemorySemanticIndex::new(SemanticIndexConfig {
                dimension: config.embedding.dimensions,
                max_scan: config.semantic.max_scan,
                max_entries: config.semantic.max_entries,
            });
            SemanticCache::new(Arc::new(index), answers.clone(), config.semantic.threshold)
        } else {
            SemanticCache::disabled(answers.clone())
        };

        let retrieval = Arc::new(RetrievalCache::new(
            Arc::clone(&retrieval_tier) as Arc<dyn CachePort>,
            Arc::clone(&l2),
            config.cache.retrieval_ttl(),
        ));

        let conversations = Arc::new(ConversationContextService::new(
            l2,
            ConversationContextConfig {
                max_messages: config.cache.conversation_max_messages,
                ttl: config.cache.conversation_ttl(),
            },
        ));

        let invalidation = CacheInvalidationCoordinator::spawn(Arc::clone(&retrieval));

        info!(
            backend = tier2.backend(),
            tier1 = config.cache.tier1_enabled,
            semantic = config.semantic.enabled,
            "Cache stack ready"
        );

        Self {
            tier2,
            answer_tier,
            retrieval_tier,
            answers,
            semantic,
            retrieval,
            conversations,
            reranker,
            invalidation,
        }
    }

    /// Query service over this stack and the given collaborators
    pub fn query_service(
        &self,
        embedder: Arc<dyn EmbeddingPort>,
        search: Arc<dyn SimilaritySearchPort>,
        generator: Arc<dyn AnswerGeneratorPort>,
    ) -> QueryService {
        QueryService::new(
            self.answers.clone(),
            self.semantic.clone(),
            Arc::clone(&self.retrieval),
            Arc::clone(&self.reranker) as Arc<dyn application::ports::RerankerPort>,
            embedder,
            search,
            generator,
        )
    }

    /// Shared Tier 2 store
    pub const fn tier2(&self) -> &Tier2Store {
        &self.tier2
    }

    /// Exact-match answer cache
    pub const fn answers(&self) -> &AnswerCache {
        &self.answers
    }

    /// Semantic answer cache
    pub const fn semantic(&self) -> &SemanticCache {
        &self.semantic
    }

    /// Retrieval cache
    pub fn retrieval(&self) -> &Arc<RetrievalCache> {
        &self.retrieval
    }

    /// Conversation windows
    pub fn conversations(&self) -> &Arc<ConversationContextService> {
        &self.conversations
    }

    /// Reranker
    pub fn reranker(&self) -> &Arc<ResilientReranker> {
        &self.reranker
    }

    /// Invalidation coordinator
    pub const fn invalidation(&self) -> &CacheInvalidationCoordinator {
        &self.invalidation
    }

    /// Snapshot of every component
    pub async fn stats(&self) -> StackStats {
        let mut tier2 = self.tier2.port().stats();
        match self.tier2.entry_count().await {
            Ok(entries) => tier2.entries = entries,
            Err(e) => warn!(error = %e, "Could not count Tier 2 entries"),
        }

        StackStats {
            backend: self.tier2.backend(),
            answers: self.answer_tier.stats(),
            retrieval: self.retrieval_tier.stats(),
            tier2,
            store_failures: self.tier2.failures(),
            semantic_entries: self.semantic.len(),
            linked_documents: self.retrieval.linked_documents(),
            reranker: self.reranker.stats(),
            invalidation: self.invalidation.stats(),
        }
    }

    /// Drain pending invalidations and stop the worker
    pub async fn shutdown(self) {
        self.invalidation.flush().await;
        self.invalidation.shutdown().await;
        info!("Cache stack shut down");
    }
}
