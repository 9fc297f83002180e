//! Operator commands
//!
//! Each command builds what it needs from the loaded configuration and
//! returns a JSON report; printing is left to `main`.

use anyhow::{Context, Result};
use application::ports::RerankerPort;
use domain::{Document, DocumentChangeKind, DocumentId};
use infrastructure::{AppConfig, CacheStack, StackStats, Tier2Store, build_reranker};
use serde_json::{Value, json};

/// Effective configuration, after validation
pub fn check_config(config: &AppConfig) -> Result<Value> {
    config.validate()?;
    Ok(json!({
        "tier1": {
            "enabled": config.cache.tier1_enabled,
            "capacity": config.cache.tier1_capacity,
        },
        "ttl_secs": {
            "answer": config.cache.answer_ttl_secs,
            "retrieval": config.cache.retrieval_ttl_secs,
            "conversation": config.cache.conversation_ttl_secs,
        },
        "semantic": {
            "enabled": config.semantic.enabled,
            "threshold": config.semantic.threshold,
            "dimension": config.embedding.dimensions,
        },
        "store": {
            "backend": config.store.backend.to_string(),
            "timeout_ms": config.store.timeout_ms,
            "connect_timeout_ms": config.store.connect_timeout_ms,
        },
        "reranker": {
            "preferred_device": config.reranker.preferred_device.to_string(),
            "accelerator": config.reranker.accelerator.as_ref().map(|d| d.name.clone()),
            "remote": config.reranker.remote.as_ref().map(|r| r.base_url.clone()),
        },
    }))
}

/// Render a stats snapshot
pub fn stats_report(stats: &StackStats) -> Result<Value> {
    Ok(json!({
        "backend": stats.backend,
        "tier2": {
            "entries": stats.tier2.entries,
            "failures": stats.store_failures,
        },
        "answers": {
            "hits": stats.answers.hits,
            "misses": stats.answers.misses,
            "hit_rate": stats.answers.hit_rate(),
        },
        "retrieval": {
            "hits": stats.retrieval.hits,
            "misses": stats.retrieval.misses,
            "hit_rate": stats.retrieval.hit_rate(),
        },
        "semantic_entries": stats.semantic_entries,
        "linked_documents": stats.linked_documents,
        "reranker": serde_json::to_value(&stats.reranker)?,
        "invalidation": {
            "documents": stats.invalidation.documents,
            "evicted": stats.invalidation.evicted,
            "reindexes": stats.invalidation.reindexes,
        },
    }))
}

/// Snapshot of a freshly built stack
///
/// Hit counters are per process, so only Tier 2 figures carry information
/// about other processes.
pub async fn stats(config: &AppConfig) -> Result<Value> {
    let stack = CacheStack::build(config).await?;
    let report = stats_report(&stack.stats().await)?;
    stack.shutdown().await;
    Ok(report)
}

/// Evict retrieval entries that reference `document`
pub async fn invalidate(
    config: &AppConfig,
    document: &str,
    kind: DocumentChangeKind,
) -> Result<Value> {
    let id = DocumentId::new(document).context("invalid document id")?;
    let stack = CacheStack::build(config).await?;
    stack.invalidation().on_document_changed(id, kind);
    stack.invalidation().flush().await;
    let applied = stack.invalidation().stats();
    stack.shutdown().await;

    Ok(json!({
        "document": document,
        "kind": kind.to_string(),
        "evicted": applied.evicted,
    }))
}

/// Drop every retrieval entry
pub async fn reindex(config: &AppConfig) -> Result<Value> {
    let stack = CacheStack::build(config).await?;
    stack.invalidation().on_reindex();
    stack.invalidation().flush().await;
    let applied = stack.invalidation().stats();
    stack.shutdown().await;

    Ok(json!({ "reindexes": applied.reindexes }))
}

/// Remove expired Tier 2 entries
pub async fn purge_expired(config: &AppConfig) -> Result<Value> {
    config.validate()?;
    let tier2 = Tier2Store::open(&config.store).await?;
    let purged = tier2.purge_expired().await?;
    Ok(json!({
        "backend": tier2.backend(),
        "purged": purged,
    }))
}

/// Score `docs` against `query` through the full fallback chain
pub async fn rerank(config: &AppConfig, query: &str, docs: &[String]) -> Result<Value> {
    let reranker = build_reranker(&config.reranker)?;
    let candidates = docs
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let id = DocumentId::new(format!("doc-{}", i + 1))?;
            Ok(Document::new(id, text.clone()))
        })
        .collect::<Result<Vec<_>, domain::DomainError>>()?;

    let ranked = reranker.score(query, candidates).await;
    let stats = reranker.stats();

    Ok(json!({
        "state": serde_json::to_value(&stats.state)?,
        "ranked": ranked
            .iter()
            .map(|scored| json!({
                "id": scored.document.id.as_str(),
                "score": scored.score,
                "text": scored.document.text,
            }))
            .collect::<Vec<_>>(),
    }))
}
