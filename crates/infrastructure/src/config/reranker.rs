//! Reranker fallback chain configuration.

use std::time::Duration;

use ai_core::{DeviceProfile, LexicalModelConfig, RemoteRerankConfig};
use application::ports::DeviceKind;
use serde::{Deserialize, Serialize};

use crate::adapters::CircuitBreakerConfig;

/// Reranker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerAppConfig {
    /// Device tried first (default: accelerated)
    #[serde(default = "default_preferred_device")]
    pub preferred_device: DeviceKind,

    /// Local model parameters
    #[serde(default)]
    pub model: LexicalModelConfig,

    /// Accelerator memory budget; `None` on hosts without one
    #[serde(default = "default_accelerator")]
    pub accelerator: Option<DeviceProfile>,

    /// Host memory budget for the unaccelerated model
    #[serde(default = "default_host")]
    pub host: DeviceProfile,

    /// Remote rerank service; `None` skips straight to original order
    #[serde(default)]
    pub remote: Option<RemoteRerankConfig>,

    /// Deadline per remote call in milliseconds (default: 2000)
    #[serde(default = "default_remote_timeout_ms")]
    pub remote_timeout_ms: u64,

    /// Circuit breaker guarding the remote service
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    /// Load the model at startup instead of on the first request
    #[serde(default)]
    pub warm_up: bool,
}

const fn default_preferred_device() -> DeviceKind {
    DeviceKind::Accelerated
}

#[allow(clippy::unnecessary_wraps)]
fn default_accelerator() -> Option<DeviceProfile> {
    Some(DeviceProfile::new("accelerator", 2 * 1024 * 1024 * 1024))
}

fn default_host() -> DeviceProfile {
    DeviceProfile::new("cpu", 4 * 1024 * 1024 * 1024)
}

const fn default_remote_timeout_ms() -> u64 {
    2_000
}

impl Default for RerankerAppConfig {
    fn default() -> Self {
        Self {
            preferred_device: default_preferred_device(),
            model: LexicalModelConfig::default(),
            accelerator: default_accelerator(),
            host: default_host(),
            remote: None,
            remote_timeout_ms: default_remote_timeout_ms(),
            circuit_breaker: CircuitBreakerConfig::default(),
            warm_up: false,
        }
    }
}

impl RerankerAppConfig {
    /// Get the remote deadline as a Duration
    #[must_use]
    pub const fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }
}
