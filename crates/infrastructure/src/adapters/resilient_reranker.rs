//! Resilient reranker
//!
//! Owns the process-wide rerank model and walks the fallback chain
//! accelerated → unaccelerated → remote service → trivial order. The chain
//! is sticky downward: once a local level has failed to load, or the
//! accelerator has run out of memory at runtime, the process never tries it
//! again. An out-of-memory on the unaccelerated model is treated as a
//! property of that batch: the call goes to the remote tier and the model
//! stays in service.
//!
//! The resolved strategy lives in an [`ArcSwap`], so the hot path is a
//! single atomic load. Loading happens once, under an async mutex with the
//! state re-checked after acquiring it, on the blocking thread pool.

use std::{
    collections::BTreeMap,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use application::ports::{
    DegradationReason, DeviceKind, ModelSingletonState, RemoteRerankPort, RerankError,
    RerankModel, RerankModelLoader, RerankStrategy, RerankerPort, RerankerStats, original_order,
    rank_by_scores,
};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use domain::{Document, ScoredDocument};
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerError};

/// Default deadline for one remote rerank call
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(2);

/// Snapshot swapped atomically on every transition
struct Resolved {
    state: ModelSingletonState,
    /// Best strategy the process may currently use
    strategy: RerankStrategy,
    /// Loaded model when `strategy` is a local level
    model: Option<Arc<dyn RerankModel>>,
}

impl Resolved {
    fn uninitialized(preferred: DeviceKind) -> Self {
        Self {
            state: ModelSingletonState::Uninitialized,
            strategy: RerankStrategy::for_device(preferred),
            model: None,
        }
    }

    /// No load is pending: either a model is in hand or the floor is not local
    fn is_settled(&self) -> bool {
        self.state.is_resolved() && (self.strategy.device().is_none() || self.model.is_some())
    }
}

/// Reranker with a sticky, never-failing fallback chain
pub struct ResilientReranker {
    loader: Arc<dyn RerankModelLoader>,
    remote: Option<Arc<dyn RemoteRerankPort>>,
    breaker: CircuitBreaker,
    preferred: DeviceKind,
    remote_timeout: Duration,
    resolved: ArcSwap<Resolved>,
    init_lock: tokio::sync::Mutex<()>,
    calls: AtomicU64,
    served: Mutex<BTreeMap<RerankStrategy, u64>>,
}

impl fmt::Debug for ResilientReranker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientReranker")
            .field("preferred", &self.preferred)
            .field("state", &self.state())
            .field("remote", &self.remote.is_some())
            .field("breaker", &self.breaker)
            .finish_non_exhaustive()
    }
}

impl ResilientReranker {
    /// Create a reranker; nothing is loaded until the first call or [`Self::warm_up`]
    pub fn new(
        loader: Arc<dyn RerankModelLoader>,
        remote: Option<Arc<dyn RemoteRerankPort>>,
        breaker: CircuitBreaker,
        preferred: DeviceKind,
        remote_timeout: Duration,
    ) -> Self {
        Self {
            loader,
            remote,
            breaker,
            preferred,
            remote_timeout,
            resolved: ArcSwap::from_pointee(Resolved::uninitialized(preferred)),
            init_lock: tokio::sync::Mutex::new(()),
            calls: AtomicU64::new(0),
            served: Mutex::new(BTreeMap::new()),
        }
    }

    /// Load the model ahead of the first request
    pub async fn warm_up(&self) -> ModelSingletonState {
        self.resolve().await.state.clone()
    }

    /// Health snapshot
    pub fn stats(&self) -> RerankerStats {
        RerankerStats {
            state: self.state(),
            calls: self.calls.load(Ordering::Relaxed),
            served_by: self.served.lock().clone(),
        }
    }

    async fn resolve(&self) -> Arc<Resolved> {
        let current = self.resolved.load_full();
        if current.is_settled() {
            return current;
        }

        let _guard = self.init_lock.lock().await;
        let current = self.resolved.load_full();
        if current.is_settled() {
            return current;
        }

        if matches!(current.state, ModelSingletonState::Uninitialized) {
            self.resolved.store(Arc::new(Resolved {
                state: ModelSingletonState::Initializing,
                strategy: current.strategy,
                model: None,
            }));
        }

        let mut reason = match &current.state {
            ModelSingletonState::PermanentlyDegraded { reason, .. } => Some(reason.clone()),
            _ => None,
        };
        let mut strategy = current.strategy;
        let mut model = None;

        while let Some(device) = strategy.device() {
            match self.load(device).await {
                Ok(loaded) => {
                    model = Some(loaded);
                    break;
                },
                Err(error) => {
                    let next = strategy.next();
                    warn!(%device, %error, next = %next, "Rerank model load failed, degrading");
                    record_fallback(strategy, next);
                    reason.get_or_insert(DegradationReason::LoadFailed {
                        device,
                        error: error.to_string(),
                    });
                    strategy = next;
                },
            }
        }

        let state = match reason {
            Some(reason) => ModelSingletonState::PermanentlyDegraded {
                reason,
                floor: strategy,
            },
            None => ModelSingletonState::Ready {
                device: self.preferred,
            },
        };
        info!(%state, "Reranker resolved");

        let resolved = Arc::new(Resolved {
            state,
            strategy,
            model,
        });
        self.resolved.store(Arc::clone(&resolved));
        resolved
    }

    async fn load(&self, device: DeviceKind) -> Result<Arc<dyn RerankModel>, RerankError> {
        let loader = Arc::clone(&self.loader);
        tokio::task::spawn_blocking(move || loader.load(device))
            .await
            .map_err(|e| RerankError::Failed(format!("model load task failed: {e}")))?
    }

    /// Move the floor below `failed` unless another call already did
    fn demote(&self, failed: RerankStrategy, device: DeviceKind, error: &RerankError) {
        let next = failed.next();
        let previous = self.resolved.rcu(|current| {
            if current.strategy != failed {
                return Arc::clone(current);
            }
            let reason = match &current.state {
                ModelSingletonState::PermanentlyDegraded { reason, .. } => reason.clone(),
                _ => DegradationReason::RuntimeExhausted {
                    device,
                    error: error.to_string(),
                },
            };
            Arc::new(Resolved {
                state: ModelSingletonState::PermanentlyDegraded {
                    reason,
                    floor: next,
                },
                strategy: next,
                model: None,
            })
        });

        if previous.strategy == failed {
            warn!(%device, %error, floor = %next, "Rerank device exhausted at runtime, degrading permanently");
        }
    }

    async fn score_local(
        model: Arc<dyn RerankModel>,
        query: &str,
        candidates: &[Document],
    ) -> Result<Vec<f32>, RerankError> {
        let query = query.to_owned();
        let documents = candidates.to_vec();
        let scores = tokio::task::spawn_blocking(move || model.score_batch(&query, &documents))
            .await
            .map_err(|e| RerankError::Failed(format!("scoring task failed: {e}")))??;
        check_len(scores, candidates.len())
    }

    async fn score_remote(&self, query: &str, candidates: &[Document]) -> Result<Vec<f32>, RerankError> {
        let remote = self
            .remote
            .as_ref()
            .ok_or_else(|| RerankError::Unavailable("no remote rerank service configured".into()))?;
        let timeout = self.remote_timeout;

        let scores = self
            .breaker
            .call(|| async {
                tokio::time::timeout(timeout, remote.score(query, candidates))
                    .await
                    .map_err(|_| RerankError::Timeout(timeout))?
            })
            .await
            .map_err(|e| match e {
                CircuitBreakerError::CircuitOpen { service } => {
                    RerankError::Unavailable(format!("circuit open for {service}"))
                },
                CircuitBreakerError::ServiceError(e) => e,
            })?;
        check_len(scores, candidates.len())
    }

    fn served(&self, strategy: RerankStrategy, ranked: Vec<ScoredDocument>) -> Vec<ScoredDocument> {
        *self.served.lock().entry(strategy).or_default() += 1;
        debug!(%strategy, candidates = ranked.len(), "Rerank served");
        ranked
    }
}

fn check_len(scores: Vec<f32>, expected: usize) -> Result<Vec<f32>, RerankError> {
    if scores.len() == expected {
        Ok(scores)
    } else {
        Err(RerankError::Failed(format!(
            "expected {expected} scores, got {}",
            scores.len()
        )))
    }
}

fn record_fallback(from: RerankStrategy, to: RerankStrategy) {
    metrics::counter!(
        "querycache_rerank_fallbacks_total",
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
}

#[async_trait]
impl RerankerPort for ResilientReranker {
    #[instrument(skip(self, query, candidates), fields(candidates = candidates.len()))]
    async fn score(&self, query: &str, candidates: Vec<Document>) -> Vec<ScoredDocument> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if candidates.is_empty() {
            return Vec::new();
        }

        let resolved = self.resolve().await;

        if let Some(model) = &resolved.model {
            let strategy = resolved.strategy;
            let device = model.device();
            match Self::score_local(Arc::clone(model), query, &candidates).await {
                Ok(scores) => return self.served(strategy, rank_by_scores(candidates, &scores)),
                Err(error) => {
                    if error.is_resource_exhaustion() && device == DeviceKind::Accelerated {
                        self.demote(strategy, device, &error);
                    } else {
                        warn!(%device, %error, "Local rerank failed, using remote for this call");
                    }
                    record_fallback(strategy, RerankStrategy::RemoteService);
                },
            }
        }

        // A local level that did not answer hands over to the remote tier
        let tier = resolved.strategy.max(RerankStrategy::RemoteService);
        if tier == RerankStrategy::RemoteService {
            match self.score_remote(query, &candidates).await {
                Ok(scores) => return self.served(tier, rank_by_scores(candidates, &scores)),
                Err(error) => {
                    warn!(%error, "Remote rerank failed, keeping original order");
                    record_fallback(tier, RerankStrategy::Trivial);
                },
            }
        }

        self.served(RerankStrategy::Trivial, original_order(candidates))
    }

    fn state(&self) -> ModelSingletonState {
        self.resolved.load().state.clone()
    }
}
