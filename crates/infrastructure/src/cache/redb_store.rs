//! Redb embedded store (Tier 2, single host)
//!
//! Durable key-value store for deployments where every process runs on the
//! same machine. Values are wrapped in a bincode envelope carrying their
//! absolute expiry in Unix milliseconds; expired entries are deleted when
//! read and by [`RedbStore::cleanup_expired`].

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use application::{
    error::ApplicationError,
    ports::{CachePort, CacheStats},
};
use async_trait::async_trait;
use bincode::{Decode, Encode};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use tracing::{debug, info, instrument, warn};

/// Table holding every cache kind; kinds are separated by key prefix
const CACHE_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("querycache");

/// Stored value with its absolute expiry
#[derive(Debug, Encode, Decode)]
struct Envelope {
    /// Caller payload, opaque to the store
    data: Vec<u8>,
    /// Expiry as Unix epoch milliseconds
    expires_at_ms: u64,
}

impl Envelope {
    fn decode(bytes: &[u8]) -> Option<Self> {
        bincode::decode_from_slice(bytes, bincode::config::standard())
            .ok()
            .map(|(envelope, _)| envelope)
    }

    const fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }

    const fn remaining_at(&self, now_ms: u64) -> Duration {
        Duration::from_millis(self.expires_at_ms.saturating_sub(now_ms))
    }
}

/// What a read found under a key
enum Lookup {
    Missing,
    Live(Vec<u8>, Duration),
    Expired,
    Corrupt,
}

/// Redb-backed persistent store
///
/// # Auto-Recovery
///
/// A database file that cannot be opened (corrupted, or written by an
/// incompatible version) is deleted and recreated empty. Losing a cache is
/// always preferable to refusing to start.
pub struct RedbStore {
    db: Arc<Database>,
    path: Option<PathBuf>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("db", &"<Database>")
            .field("path", &self.path)
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish()
    }
}

impl RedbStore {
    /// Open (or create) the store at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ApplicationError> {
        let path_buf = path.as_ref().to_path_buf();
        if let Some(parent) = path_buf.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                ApplicationError::Internal(format!(
                    "Failed to create cache directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let db = match Database::create(&path_buf) {
            Ok(db) => db,
            Err(e) => {
                warn!(
                    path = %path_buf.display(),
                    error = %e,
                    "Cache database corrupted or incompatible, recreating"
                );
                if path_buf.exists() {
                    fs::remove_file(&path_buf).map_err(|e| {
                        ApplicationError::Internal(format!(
                            "Failed to remove corrupted database: {e}"
                        ))
                    })?;
                }
                Database::create(&path_buf).map_err(|e| {
                    ApplicationError::Internal(format!("Failed to create Redb database: {e}"))
                })?
            },
        };

        info!(path = %path_buf.display(), "Opened Redb cache store");
        Self::with_database(db, Some(path_buf))
    }

    /// Create a store that lives only in memory
    pub fn in_memory() -> Result<Self, ApplicationError> {
        let db = Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())
            .map_err(|e| {
                ApplicationError::Internal(format!("Failed to create in-memory Redb: {e}"))
            })?;
        Self::with_database(db, None)
    }

    fn with_database(db: Database, path: Option<PathBuf>) -> Result<Self, ApplicationError> {
        // Opening the table in a write transaction creates it
        let write_txn = db.begin_write().map_err(|e| {
            ApplicationError::Internal(format!("Failed to begin write transaction: {e}"))
        })?;
        {
            let _ = write_txn.open_table(CACHE_TABLE).map_err(|e| {
                ApplicationError::Internal(format!("Failed to open cache table: {e}"))
            })?;
        }
        write_txn.commit().map_err(|e| {
            ApplicationError::Internal(format!("Failed to commit transaction: {e}"))
        })?;

        Ok(Self {
            db: Arc::new(db),
            path,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Location of the database file, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    /// Run a blocking redb operation off the async executor
    async fn blocking<T, F>(&self, op: &'static str, f: F) -> Result<T, ApplicationError>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T, redb::Error> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| ApplicationError::Internal(format!("Task join error: {e}")))?
            .map_err(|e| ApplicationError::Internal(format!("Redb {op} error: {e}")))
    }

    async fn remove_key(&self, key: &str) -> Result<bool, ApplicationError> {
        let key_bytes = key.as_bytes().to_vec();
        self.blocking("remove", move |db| {
            let write_txn = db.begin_write()?;
            let removed = {
                let mut table = write_txn.open_table(CACHE_TABLE)?;
                let previous = table.remove(key_bytes.as_slice())?;
                previous.is_some()
            };
            write_txn.commit()?;
            Ok(removed)
        })
        .await
    }

    async fn lookup(&self, key: &str) -> Result<Lookup, ApplicationError> {
        let key_bytes = key.as_bytes().to_vec();
        let raw = self
            .blocking("get", move |db| {
                let read_txn = db.begin_read()?;
                let table = read_txn.open_table(CACHE_TABLE)?;
                Ok(table.get(key_bytes.as_slice())?.map(|v| v.value().to_vec()))
            })
            .await?;

        let now = Self::now_ms();
        Ok(match raw {
            None => Lookup::Missing,
            Some(bytes) => match Envelope::decode(&bytes) {
                None => Lookup::Corrupt,
                Some(envelope) if envelope.is_expired_at(now) => Lookup::Expired,
                Some(envelope) => {
                    let left = envelope.remaining_at(now);
                    Lookup::Live(envelope.data, left)
                },
            },
        })
    }

    /// Delete every expired or undecodable entry
    pub async fn cleanup_expired(&self) -> Result<u64, ApplicationError> {
        let now = Self::now_ms();
        let removed = self
            .blocking("cleanup", move |db| {
                let write_txn = db.begin_write()?;
                let removed = {
                    let mut table = write_txn.open_table(CACHE_TABLE)?;
                    let doomed: Vec<Vec<u8>> = table
                        .iter()?
                        .filter_map(Result::ok)
                        .filter(|(_, value)| {
                            Envelope::decode(value.value()).is_none_or(|e| e.is_expired_at(now))
                        })
                        .map(|(key, _)| key.value().to_vec())
                        .collect();
                    for key in &doomed {
                        table.remove(key.as_slice())?;
                    }
                    doomed.len() as u64
                };
                write_txn.commit()?;
                Ok(removed)
            })
            .await?;

        if removed > 0 {
            debug!(removed, "Cleaned up expired cache entries");
        }
        Ok(removed)
    }

    /// Number of stored entries, expired ones included until cleaned up
    pub fn entry_count(&self) -> u64 {
        self.db
            .begin_read()
            .ok()
            .and_then(|txn| txn.open_table(CACHE_TABLE).ok())
            .and_then(|table| table.len().ok())
            .unwrap_or(0)
    }
}

#[async_trait]
impl CachePort for RedbStore {
    #[instrument(skip(self), level = "debug")]
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, ApplicationError> {
        Ok(self.get_bytes_with_ttl(key).await?.map(|(data, _)| data))
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_bytes_with_ttl(
        &self,
        key: &str,
    ) -> Result<Option<(Vec<u8>, Duration)>, ApplicationError> {
        match self.lookup(key).await? {
            Lookup::Live(data, left) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key, left = ?left, "Cache hit (Redb)");
                Ok(Some((data, left)))
            },
            Lookup::Missing => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key, "Cache miss (Redb)");
                Ok(None)
            },
            Lookup::Expired => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key, "Cache entry expired (Redb)");
                self.remove_key(key).await?;
                Ok(None)
            },
            Lookup::Corrupt => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                warn!(key, "Undecodable envelope in Redb store, evicting");
                metrics::counter!("querycache_corrupt_entries_total").increment(1);
                self.remove_key(key).await?;
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
        if ttl.is_zero() {
            self.remove_key(key).await?;
            return Ok(());
        }

        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        let envelope = Envelope {
            data: value,
            expires_at_ms: Self::now_ms().saturating_add(ttl_ms),
        };
        let entry_bytes = bincode::encode_to_vec(&envelope, bincode::config::standard())
            .map_err(|e| ApplicationError::Serialization(format!("Envelope encode error: {e}")))?;

        let key_bytes = key.as_bytes().to_vec();
        self.blocking("insert", move |db| {
            let write_txn = db.begin_write()?;
            {
                let mut table = write_txn.open_table(CACHE_TABLE)?;
                table.insert(key_bytes.as_slice(), entry_bytes.as_slice())?;
            }
            write_txn.commit()?;
            Ok(())
        })
        .await?;

        debug!(key, ttl_ms, "Cache set (Redb)");
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn invalidate(&self, key: &str) -> Result<(), ApplicationError> {
        self.remove_key(key).await?;
        debug!(key, "Cache invalidated (Redb)");
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn invalidate_pattern(&self, pattern: &str) -> Result<u64, ApplicationError> {
        let Some(prefix) = pattern.strip_suffix('*') else {
            return Ok(u64::from(self.remove_key(pattern).await?));
        };

        let prefix_bytes = prefix.as_bytes().to_vec();
        let count = self
            .blocking("pattern invalidate", move |db| {
                let write_txn = db.begin_write()?;
                let removed = {
                    let mut table = write_txn.open_table(CACHE_TABLE)?;
                    let doomed: Vec<Vec<u8>> = table
                        .iter()?
                        .filter_map(Result::ok)
                        .map(|(key, _)| key.value().to_vec())
                        .filter(|key| key.starts_with(&prefix_bytes))
                        .collect();
                    for key in &doomed {
                        table.remove(key.as_slice())?;
                    }
                    doomed.len() as u64
                };
                write_txn.commit()?;
                Ok(removed)
            })
            .await?;

        debug!(pattern, count, "Pattern invalidation complete (Redb)");
        Ok(count)
    }

    #[instrument(skip(self), level = "debug")]
    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, ApplicationError> {
        let (prefix, exact) = match pattern.strip_suffix('*') {
            Some(prefix) => (prefix.as_bytes().to_vec(), false),
            None => (pattern.as_bytes().to_vec(), true),
        };
        let now = Self::now_ms();

        self.blocking("scan", move |db| {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(CACHE_TABLE)?;
            let mut keys = Vec::new();
            for item in table.range(prefix.as_slice()..)? {
                let (key, value) = item?;
                let key = key.value();
                if !key.starts_with(&prefix) || (exact && key != prefix.as_slice()) {
                    break;
                }
                let live = Envelope::decode(value.value()).is_some_and(|e| !e.is_expired_at(now));
                if let (true, Ok(key)) = (live, std::str::from_utf8(key)) {
                    keys.push(key.to_string());
                }
            }
            Ok(keys)
        })
        .await
    }

    #[instrument(skip(self), level = "debug")]
    async fn exists(&self, key: &str) -> Result<bool, ApplicationError> {
        Ok(matches!(self.lookup(key).await?, Lookup::Live(..)))
    }

    fn stats(&self) -> CacheStats {
        let memory_bytes = self
            .path
            .as_ref()
            .and_then(|p| fs::metadata(p).ok())
            .map_or(0, |m| m.len());

        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entry_count(),
            memory_bytes,
        }
    }
}
