//! Redis store (Tier 2, shared across processes)
//!
//! TTL is enforced by Redis itself (`SET .. PX`); reads that need the
//! remaining lifetime pair `GET` with `PTTL` in one pipeline. Pattern
//! invalidation and key listing walk the keyspace with `SCAN MATCH`, never
//! `KEYS`, so a large cache does not stall the server.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use application::{
    error::ApplicationError,
    ports::{CachePort, CacheStats},
};
use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use tracing::{debug, info, instrument};

/// Keys requested per `SCAN` page and deleted per `DEL`
const SCAN_PAGE: usize = 500;

/// Redis-backed shared store
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    endpoint: String,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("endpoint", &self.endpoint)
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

fn redis_error(op: &str, e: &redis::RedisError) -> ApplicationError {
    ApplicationError::ExternalService(format!("Redis {op} failed: {e}"))
}

/// `host:port` part of a Redis URL, without credentials
fn redact(url: &str) -> String {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    rest.rsplit_once('@').map_or(rest, |(_, host)| host).to_string()
}

/// Translate a store pattern (`prefix*` or exact key) into a Redis glob
fn glob_pattern(pattern: &str) -> String {
    let (stem, wildcard) = match pattern.strip_suffix('*') {
        Some(stem) => (stem, true),
        None => (pattern, false),
    };
    let mut glob = String::with_capacity(stem.len() + 1);
    for c in stem.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            glob.push('\\');
        }
        glob.push(c);
    }
    if wildcard {
        glob.push('*');
    }
    glob
}

impl RedisStore {
    /// Connect to `url` (e.g. `redis://127.0.0.1:6379/0`), giving up after
    /// `timeout`
    ///
    /// An unreachable or blackholed server is reported as
    /// [`ApplicationError::ExternalService`] once the deadline passes. After
    /// the first connection the manager reconnects on its own; callers wrap
    /// this store in a fail-soft layer so an outage reads as misses.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, ApplicationError> {
        let client = redis::Client::open(url)
            .map_err(|e| ApplicationError::Configuration(format!("Invalid Redis URL: {e}")))?;
        let conn = tokio::time::timeout(timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| {
                ApplicationError::ExternalService(format!(
                    "Redis connect to {} timed out after {}ms",
                    redact(url),
                    timeout.as_millis()
                ))
            })?
            .map_err(|e| redis_error("connect", &e))?;

        let endpoint = redact(url);
        info!(endpoint = %endpoint, "Connected to Redis cache store");
        Ok(Self {
            conn,
            endpoint,
            hits: Arc::default(),
            misses: Arc::default(),
        })
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, ApplicationError> {
        let glob = glob_pattern(pattern);
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut found = Vec::new();

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&glob)
                .arg("COUNT")
                .arg(SCAN_PAGE)
                .query_async(&mut conn)
                .await
                .map_err(|e| redis_error("SCAN", &e))?;
            found.extend(keys);

            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once
        found.sort_unstable();
        found.dedup();
        Ok(found)
    }

    /// Number of keys in the selected database
    pub async fn entry_count(&self) -> Result<u64, ApplicationError> {
        let mut conn = self.conn.clone();
        redis::cmd("DBSIZE")
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("DBSIZE", &e))
    }
}

#[async_trait]
impl CachePort for RedisStore {
    #[instrument(skip(self), level = "debug")]
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, ApplicationError> {
        Ok(self.get_bytes_with_ttl(key).await?.map(|(value, _)| value))
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_bytes_with_ttl(
        &self,
        key: &str,
    ) -> Result<Option<(Vec<u8>, Duration)>, ApplicationError> {
        let mut conn = self.conn.clone();
        let (value, pttl): (Option<Vec<u8>>, i64) = redis::pipe()
            .get(key)
            .pttl(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("GET/PTTL", &e))?;

        // PTTL is -2 when the key expired between the two commands and -1
        // for a key without expiry, which this store never writes
        match (value, u64::try_from(pttl)) {
            (Some(value), Ok(left_ms)) if left_ms > 0 => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key, left_ms, "Cache hit (Redis)");
                Ok(Some((value, Duration::from_millis(left_ms))))
            },
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key, "Cache miss (Redis)");
                Ok(None)
            },
        }
    }

    #[instrument(skip(self, value), level = "debug", fields(value_len = value.len()))]
    async fn set_bytes(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), ApplicationError> {
        let mut conn = self.conn.clone();
        if ttl.is_zero() {
            let _: u64 = conn.del(key).await.map_err(|e| redis_error("DEL", &e))?;
            return Ok(());
        }

        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("SET", &e))?;

        debug!(key, ttl_ms, "Cache set (Redis)");
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn invalidate(&self, key: &str) -> Result<(), ApplicationError> {
        let mut conn = self.conn.clone();
        let _: u64 = conn.del(key).await.map_err(|e| redis_error("DEL", &e))?;
        debug!(key, "Cache invalidated (Redis)");
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn invalidate_pattern(&self, pattern: &str) -> Result<u64, ApplicationError> {
        let mut conn = self.conn.clone();
        let mut removed: u64 = 0;

        for page in self.scan(pattern).await?.chunks(SCAN_PAGE) {
            let deleted: u64 = conn.del(page).await.map_err(|e| redis_error("DEL", &e))?;
            removed += deleted;
        }

        debug!(pattern, removed, "Pattern invalidation complete (Redis)");
        Ok(removed)
    }

    #[instrument(skip(self), level = "debug")]
    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, ApplicationError> {
        if pattern.ends_with('*') {
            return self.scan(pattern).await;
        }
        Ok(if self.exists(pattern).await? {
            vec![pattern.to_string()]
        } else {
            Vec::new()
        })
    }

    #[instrument(skip(self), level = "debug")]
    async fn exists(&self, key: &str) -> Result<bool, ApplicationError> {
        let mut conn = self.conn.clone();
        conn.exists(key).await.map_err(|e| redis_error("EXISTS", &e))
    }

    fn stats(&self) -> CacheStats {
        // Entry counts need a round trip; see `entry_count`
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: 0,
            memory_bytes: 0,
        }
    }
}
