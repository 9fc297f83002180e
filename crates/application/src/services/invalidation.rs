//! Cache invalidation coordinator
//!
//! Change notifications are queued and applied by a background task, so
//! the notifier never waits on cache I/O.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use domain::{DocumentChangeKind, DocumentId};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, instrument, warn};

use crate::services::RetrievalCache;

#[derive(Debug)]
enum InvalidationEvent {
    DocumentChanged {
        document_id: DocumentId,
        kind: DocumentChangeKind,
    },
    Reindex,
    Flush(oneshot::Sender<()>),
}

/// Counters of applied invalidations
#[derive(Debug, Default)]
struct Counters {
    documents: AtomicU64,
    evicted: AtomicU64,
    reindexes: AtomicU64,
}

/// Snapshot of coordinator activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvalidationStats {
    /// Document change notifications applied
    pub documents: u64,
    /// Retrieval entries evicted by document changes
    pub evicted: u64,
    /// Full retrieval clears applied
    pub reindexes: u64,
}

/// Evicts retrieval results when documents change
///
/// Answer and semantic caches are left alone: their correctness depends on
/// content meaning, not on the search index.
#[derive(Debug)]
pub struct CacheInvalidationCoordinator {
    tx: mpsc::UnboundedSender<InvalidationEvent>,
    counters: Arc<Counters>,
    worker: JoinHandle<()>,
}

impl CacheInvalidationCoordinator {
    /// Start the background worker on the current tokio runtime
    pub fn spawn(retrieval: Arc<RetrievalCache>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let counters = Arc::new(Counters::default());
        let worker = tokio::spawn(run(retrieval, rx, Arc::clone(&counters)));
        info!("Cache invalidation worker started");
        Self {
            tx,
            counters,
            worker,
        }
    }

    /// Queue eviction of every retrieval entry containing `document_id`
    pub fn on_document_changed(&self, document_id: DocumentId, kind: DocumentChangeKind) {
        self.send(InvalidationEvent::DocumentChanged { document_id, kind });
    }

    /// Queue a full retrieval cache clear
    pub fn on_reindex(&self) {
        self.send(InvalidationEvent::Reindex);
    }

    fn send(&self, event: InvalidationEvent) {
        if let Err(e) = self.tx.send(event) {
            warn!(event = ?e.0, "Invalidation worker stopped, dropping event");
        }
    }

    /// Wait until every event queued before this call has been applied
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        self.send(InvalidationEvent::Flush(done_tx));
        let _ = done_rx.await;
    }

    /// Applied invalidation counts
    pub fn stats(&self) -> InvalidationStats {
        InvalidationStats {
            documents: self.counters.documents.load(Ordering::Relaxed),
            evicted: self.counters.evicted.load(Ordering::Relaxed),
            reindexes: self.counters.reindexes.load(Ordering::Relaxed),
        }
    }

    /// Apply everything queued, then stop the worker
    pub async fn shutdown(self) {
        let Self { tx, worker, .. } = self;
        drop(tx);
        if let Err(e) = worker.await {
            warn!(error = %e, "Invalidation worker ended abnormally");
        }
        info!("Cache invalidation worker stopped");
    }
}

#[instrument(skip_all)]
async fn run(
    retrieval: Arc<RetrievalCache>,
    mut rx: mpsc::UnboundedReceiver<InvalidationEvent>,
    counters: Arc<Counters>,
) {
    while let Some(event) = rx.recv().await {
        match event {
            InvalidationEvent::DocumentChanged { document_id, kind } => {
                let evicted = retrieval.invalidate_document(&document_id).await;
                counters.documents.fetch_add(1, Ordering::Relaxed);
                counters.evicted.fetch_add(evicted as u64, Ordering::Relaxed);
                debug!(document_id = %document_id, %kind, evicted, "Document change applied");
            },
            InvalidationEvent::Reindex => {
                let removed = retrieval.clear().await;
                counters.reindexes.fetch_add(1, Ordering::Relaxed);
                info!(removed, "Reindex applied, retrieval cache cleared");
            },
            InvalidationEvent::Flush(done) => {
                let _ = done.send(());
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use domain::{DocumentChunkRef, Filters, RetrievalRecord};

    use super::*;
    use crate::testing::MemoryCache;

    fn retrieval() -> Arc<RetrievalCache> {
        let tier2 = Arc::new(MemoryCache::new());
        Arc::new(RetrievalCache::new(
            tier2.clone(),
            tier2,
            Duration::from_secs(60),
        ))
    }

    fn record(doc: &str) -> RetrievalRecord {
        RetrievalRecord {
            documents: vec![DocumentChunkRef {
                document_id: DocumentId::new(doc).unwrap(),
                chunk_id: "c".into(),
                content: "text".into(),
                similarity: 0.7,
            }],
            k: 3,
            filters: Filters::new(),
        }
    }

    #[tokio::test]
    async fn content_update_evicts_after_flush() {
        let cache = retrieval();
        cache.put("q", &record("doc-1")).await;
        let coordinator = CacheInvalidationCoordinator::spawn(cache.clone());

        coordinator.on_document_changed(
            DocumentId::new("doc-1").unwrap(),
            DocumentChangeKind::ContentUpdate,
        );
        coordinator.flush().await;

        assert!(cache.get("q", 3, &Filters::new()).await.is_none());
        assert_eq!(
            coordinator.stats(),
            InvalidationStats {
                documents: 1,
                evicted: 1,
                reindexes: 0
            }
        );
    }

    #[tokio::test]
    async fn reindex_clears_everything() {
        let cache = retrieval();
        cache.put("q1", &record("doc-1")).await;
        cache.put("q2", &record("doc-2")).await;
        let coordinator = CacheInvalidationCoordinator::spawn(cache.clone());

        coordinator.on_reindex();
        coordinator.flush().await;

        assert!(cache.get("q1", 3, &Filters::new()).await.is_none());
        assert!(cache.get("q2", 3, &Filters::new()).await.is_none());
        assert_eq!(coordinator.stats().reindexes, 1);
    }

    #[tokio::test]
    async fn shutdown_drains_queue() {
        let cache = retrieval();
        cache.put("q", &record("doc-1")).await;
        let coordinator = CacheInvalidationCoordinator::spawn(cache.clone());

        coordinator.on_document_changed(DocumentId::new("doc-1").unwrap(), DocumentChangeKind::Delete);
        coordinator.shutdown().await;

        assert!(cache.get("q", 3, &Filters::new()).await.is_none());
    }
}
