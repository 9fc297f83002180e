//! Reranker ports
//!
//! The request path only sees [`RerankerPort`], whose `score` cannot fail.
//! Behind it, local models are produced by a [`RerankModelLoader`] for a
//! given [`DeviceKind`] and a [`RemoteRerankPort`] serves as the network
//! fallback.

use std::{cmp::Ordering, collections::BTreeMap, fmt, str::FromStr, sync::Arc, time::Duration};

use async_trait::async_trait;
use domain::{Document, ScoredDocument};
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Compute device a local model is loaded on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// GPU or other accelerator with its own memory budget
    Accelerated,
    /// Host CPU
    Unaccelerated,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Accelerated => "accelerated",
            Self::Unaccelerated => "unaccelerated",
        })
    }
}

impl FromStr for DeviceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accelerated" | "gpu" | "cuda" => Ok(Self::Accelerated),
            "unaccelerated" | "cpu" => Ok(Self::Unaccelerated),
            other => Err(format!("unknown device kind: {other}")),
        }
    }
}

/// Failure of a single rerank strategy
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RerankError {
    /// The device ran out of memory (load or runtime)
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The strategy cannot be reached or is switched off
    #[error("Reranker unavailable: {0}")]
    Unavailable(String),

    /// The strategy did not answer in time
    #[error("Reranker timed out after {0:?}")]
    Timeout(Duration),

    /// Any other failure
    #[error("Reranking failed: {0}")]
    Failed(String),
}

impl RerankError {
    /// Whether this failure should permanently demote the strategy
    pub const fn is_resource_exhaustion(&self) -> bool {
        matches!(self, Self::ResourceExhausted(_))
    }
}

/// A loaded cross-encoder; weights are immutable after load
#[cfg_attr(test, automock)]
pub trait RerankModel: Send + Sync {
    /// Device the weights live on
    fn device(&self) -> DeviceKind;

    /// Score every document against `query`, one score per document in input order
    fn score_batch(&self, query: &str, documents: &[Document]) -> Result<Vec<f32>, RerankError>;
}

/// Constructs local rerank models
///
/// `load` may block for a long time (weights are read and moved to the
/// device); callers run it off the async executor.
#[cfg_attr(test, automock)]
pub trait RerankModelLoader: Send + Sync {
    /// Load the model onto `device`
    fn load(&self, device: DeviceKind) -> Result<Arc<dyn RerankModel>, RerankError>;
}

/// Remote reranking service
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RemoteRerankPort: Send + Sync {
    /// Score every document against `query`, one score per document in input order
    async fn score(&self, query: &str, documents: &[Document]) -> Result<Vec<f32>, RerankError>;
}

/// Strategies in fallback order, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RerankStrategy {
    /// Local model on the accelerator
    Accelerated,
    /// Local model on the host CPU
    Unaccelerated,
    /// Remote reranking service
    RemoteService,
    /// Original order with synthetic decreasing scores
    Trivial,
}

impl RerankStrategy {
    /// Local strategy for a device
    pub const fn for_device(device: DeviceKind) -> Self {
        match device {
            DeviceKind::Accelerated => Self::Accelerated,
            DeviceKind::Unaccelerated => Self::Unaccelerated,
        }
    }

    /// Device backing a local strategy
    pub const fn device(self) -> Option<DeviceKind> {
        match self {
            Self::Accelerated => Some(DeviceKind::Accelerated),
            Self::Unaccelerated => Some(DeviceKind::Unaccelerated),
            Self::RemoteService | Self::Trivial => None,
        }
    }

    /// Next strategy down the chain
    pub const fn next(self) -> Self {
        match self {
            Self::Accelerated => Self::Unaccelerated,
            Self::Unaccelerated => Self::RemoteService,
            Self::RemoteService | Self::Trivial => Self::Trivial,
        }
    }

    /// Label used in logs and metrics
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accelerated => "accelerated",
            Self::Unaccelerated => "unaccelerated",
            Self::RemoteService => "remote_service",
            Self::Trivial => "trivial",
        }
    }
}

impl fmt::Display for RerankStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the model singleton left its preferred strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DegradationReason {
    /// The model could not be loaded on a device
    LoadFailed {
        /// Device the load was attempted on
        device: DeviceKind,
        /// Error reported by the loader
        error: String,
    },
    /// A scoring call ran out of device memory
    RuntimeExhausted {
        /// Device that ran out of memory
        device: DeviceKind,
        /// Error reported by the model
        error: String,
    },
}

impl fmt::Display for DegradationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoadFailed { device, error } => write!(f, "{device} load failed: {error}"),
            Self::RuntimeExhausted { device, error } => {
                write!(f, "{device} exhausted at runtime: {error}")
            },
        }
    }
}

/// Lifecycle of the process-wide reranker model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ModelSingletonState {
    /// Nothing attempted yet
    Uninitialized,
    /// A load is in progress
    Initializing,
    /// The preferred model is loaded and serving
    Ready {
        /// Device the model is loaded on
        device: DeviceKind,
    },
    /// The preferred strategy failed; `floor` is the best strategy still allowed
    PermanentlyDegraded {
        /// First failure that caused the degradation
        reason: DegradationReason,
        /// Highest strategy the process may still use
        floor: RerankStrategy,
    },
}

impl ModelSingletonState {
    /// Whether the fast path can serve without taking the init lock
    pub const fn is_resolved(&self) -> bool {
        matches!(self, Self::Ready { .. } | Self::PermanentlyDegraded { .. })
    }

    /// Whether the singleton has left its preferred strategy
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::PermanentlyDegraded { .. })
    }
}

impl fmt::Display for ModelSingletonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => f.write_str("uninitialized"),
            Self::Initializing => f.write_str("initializing"),
            Self::Ready { device } => write!(f, "ready ({device})"),
            Self::PermanentlyDegraded { reason, floor } => {
                write!(f, "degraded to {floor} ({reason})")
            },
        }
    }
}

/// Reranker health snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RerankerStats {
    /// Current singleton state
    pub state: ModelSingletonState,
    /// Total `score` calls
    pub calls: u64,
    /// Calls served per strategy
    pub served_by: BTreeMap<RerankStrategy, u64>,
}

/// Infallible reranking as seen by the request path
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RerankerPort: Send + Sync {
    /// Score candidates against `query`, best first
    ///
    /// Never fails; in the worst case candidates come back in their
    /// original order with decreasing synthetic scores.
    async fn score(&self, query: &str, candidates: Vec<Document>) -> Vec<ScoredDocument>;

    /// Current singleton state
    fn state(&self) -> ModelSingletonState;
}

/// Pair candidates with scores and sort best first
///
/// The sort is stable, so equal scores keep their original relative order.
pub fn rank_by_scores(candidates: Vec<Document>, scores: &[f32]) -> Vec<ScoredDocument> {
    let mut ranked: Vec<ScoredDocument> = candidates
        .into_iter()
        .zip(scores.iter().copied())
        .map(|(document, score)| ScoredDocument { document, score })
        .collect();
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    ranked
}

/// Original order with scores `(n - i) / n`
#[allow(clippy::cast_precision_loss)]
pub fn original_order(candidates: Vec<Document>) -> Vec<ScoredDocument> {
    let n = candidates.len() as f32;
    candidates
        .into_iter()
        .enumerate()
        .map(|(i, document)| ScoredDocument {
            document,
            score: (n - i as f32) / n,
        })
        .collect()
}
