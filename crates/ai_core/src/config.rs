//! Configuration for the rerank engines

use serde::{Deserialize, Serialize};

/// Remote rerank service (TEI / Cohere-compatible `/rerank`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteRerankConfig {
    /// Base URL of the rerank service
    #[serde(default = "default_remote_url")]
    pub base_url: String,

    /// Model name sent with each request, if the service needs one
    #[serde(default)]
    pub model: Option<String>,

    /// Bearer token
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout in milliseconds
    #[serde(default = "default_remote_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_remote_url() -> String {
    "http://localhost:8081".to_string()
}

const fn default_remote_timeout_ms() -> u64 {
    2_000
}

impl Default for RemoteRerankConfig {
    fn default() -> Self {
        Self {
            base_url: default_remote_url(),
            model: None,
            api_key: None,
            timeout_ms: default_remote_timeout_ms(),
        }
    }
}

/// Memory available to the local model on one device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Device label used in logs (e.g. `cuda:0`, `cpu`)
    pub name: String,
    /// Bytes the model and its activations may occupy
    pub memory_bytes: u64,
}

impl DeviceProfile {
    /// Create a device profile
    pub fn new(name: impl Into<String>, memory_bytes: u64) -> Self {
        Self {
            name: name.into(),
            memory_bytes,
        }
    }
}

/// Parameters of the in-process lexical cross-encoder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexicalModelConfig {
    /// Resident size of the loaded model in bytes
    #[serde(default = "default_footprint_bytes")]
    pub footprint_bytes: u64,

    /// Activation memory per scored token in bytes
    #[serde(default = "default_activation_bytes_per_token")]
    pub activation_bytes_per_token: u64,

    /// Term-frequency saturation
    #[serde(default = "default_k1")]
    pub k1: f32,

    /// Length normalization strength
    #[serde(default = "default_b")]
    pub b: f32,
}

const fn default_footprint_bytes() -> u64 {
    512 * 1024 * 1024
}

const fn default_activation_bytes_per_token() -> u64 {
    64 * 1024
}

const fn default_k1() -> f32 {
    1.2
}

const fn default_b() -> f32 {
    0.75
}

impl Default for LexicalModelConfig {
    fn default() -> Self {
        Self {
            footprint_bytes: default_footprint_bytes(),
            activation_bytes_per_token: default_activation_bytes_per_token(),
            k1: default_k1(),
            b: default_b(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_defaults() {
        let config = RemoteRerankConfig::default();
        assert_eq!(config.timeout_ms, 2_000);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn lexical_config_deserializes_with_defaults() {
        let config: LexicalModelConfig = serde_json::from_str(r#"{"k1": 2.0}"#).unwrap();
        assert!((config.k1 - 2.0).abs() < f32::EPSILON);
        assert!((config.b - 0.75).abs() < f32::EPSILON);
        assert_eq!(config.footprint_bytes, 512 * 1024 * 1024);
    }
}
