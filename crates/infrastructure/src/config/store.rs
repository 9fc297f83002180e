//! Tier 2 store configuration.

use std::{fmt, path::PathBuf, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

/// Tier 2 backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Embedded redb file, single host
    #[default]
    Redb,
    /// Shared Redis server, multi process
    Redis,
    /// Tier 2 disabled
    None,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Redb => write!(f, "redb"),
            Self::Redis => write!(f, "redis"),
            Self::None => write!(f, "none"),
        }
    }
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "redb" => Ok(Self::Redb),
            "redis" => Ok(Self::Redis),
            "none" | "disabled" => Ok(Self::None),
            _ => Err(format!(
                "Invalid store backend: {s}. Use 'redb', 'redis' or 'none'"
            )),
        }
    }
}

/// Tier 2 store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend used for Tier 2
    #[serde(default)]
    pub backend: StoreBackend,

    /// Database file for the redb backend
    #[serde(default = "default_path")]
    pub path: PathBuf,

    /// Connection URL for the redis backend (e.g. `redis://cache:6379/0`)
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Deadline per Tier 2 operation in milliseconds (default: 250)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Deadline for establishing the Tier 2 connection in milliseconds
    /// (default: 2000)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_path() -> PathBuf {
    PathBuf::from("data/querycache.redb")
}

const fn default_timeout_ms() -> u64 {
    250
}

const fn default_connect_timeout_ms() -> u64 {
    2000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_path(),
            redis_url: None,
            timeout_ms: default_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl StoreConfig {
    /// Get the operation deadline as a Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get the connect deadline as a Duration
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
