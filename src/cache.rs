//! Semantic cache of trend reports, keyed by brief embeddings.
//!
//! A lookup embeds the brief's canonical text and asks the vector index for
//! the nearest stored entry; the stored report is served only when cosine
//! similarity reaches the configured threshold and the payload still
//! validates. The cache never fails a run: embedding or index trouble turns
//! a lookup into a miss and a store into a log line.

use std::sync::Arc;

use anyhow::Result;

use trend_assistant_core::embedding::{embed_one, EmbeddingProvider};
use trend_assistant_core::index::{IndexRecord, ModelCount, VectorIndex};
use trend_assistant_core::models::{CacheEntry, CreativeBrief};
use trend_assistant_core::report::TrendReport;

use crate::error::CacheError;

/// Neighbors fetched per lookup, so entries from another embedding model
/// with the same dimension can be stepped over.
const LOOKUP_CANDIDATES: usize = 5;

#[derive(Debug, Clone)]
pub struct CacheHit {
    pub report: TrendReport,
    pub similarity: f32,
    pub entry_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: u64,
    pub models: Vec<ModelCount>,
}

pub struct SemanticCache {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    threshold: f32,
}

impl SemanticCache {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        threshold: f32,
    ) -> Self {
        Self {
            embedder,
            index,
            threshold,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Serve a stored report for a sufficiently similar brief. Never errors
    /// and never writes.
    pub async fn lookup(&self, brief: &CreativeBrief) -> Option<CacheHit> {
        match self.try_lookup(brief).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(error = %e, "cache lookup failed, treating as miss");
                None
            }
        }
    }

    async fn try_lookup(&self, brief: &CreativeBrief) -> Result<Option<CacheHit>, CacheError> {
        let vector = self.embed(brief).await?;
        let neighbors = self
            .index
            .query_nearest(&vector, LOOKUP_CANDIDATES)
            .await
            .map_err(|e| CacheError::Index(e.to_string()))?;

        let model = self.embedder.model_name();
        let Some(nearest) = neighbors.into_iter().find(|n| n.record.model == model) else {
            tracing::info!("cache miss: index has no comparable entries");
            return Ok(None);
        };

        if nearest.similarity < self.threshold {
            tracing::info!(
                similarity = nearest.similarity,
                threshold = self.threshold,
                "cache miss"
            );
            return Ok(None);
        }

        let id = nearest.record.id.clone();
        let entry = nearest.record.decode().map_err(|e| CacheError::Corrupt {
            id: id.clone(),
            reason: e.to_string(),
        })?;
        entry.report.validate().map_err(|e| CacheError::Corrupt {
            id: id.clone(),
            reason: e.to_string(),
        })?;
        if entry.report.low_confidence {
            return Err(CacheError::Corrupt {
                id,
                reason: "low-confidence report in cache".to_string(),
            });
        }

        tracing::info!(
            similarity = nearest.similarity,
            cached_brief = %entry.brief,
            "cache hit"
        );
        Ok(Some(CacheHit {
            report: entry.report,
            similarity: nearest.similarity,
            entry_id: entry.id,
        }))
    }

    /// Append a report for this brief. Returns whether an entry was written.
    ///
    /// Invalid and low-confidence reports are refused. Failures are logged
    /// and swallowed.
    pub async fn store(&self, brief: &CreativeBrief, report: &TrendReport) -> bool {
        match self.try_store(brief, report).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(error = %e, "cache store failed");
                false
            }
        }
    }

    async fn try_store(&self, brief: &CreativeBrief, report: &TrendReport) -> Result<bool, CacheError> {
        if report.low_confidence {
            tracing::info!("not caching low-confidence report");
            return Ok(false);
        }
        if let Err(e) = report.validate() {
            tracing::warn!(error = %e, "refusing to cache invalid report");
            return Ok(false);
        }

        let vector = self.embed(brief).await?;
        let entry = CacheEntry::new(
            vector,
            self.embedder.model_name(),
            brief.clone(),
            report.clone(),
        );
        let record = IndexRecord::from_entry(&entry).map_err(|e| CacheError::Index(e.to_string()))?;
        self.index
            .insert(&record)
            .await
            .map_err(|e| CacheError::Index(e.to_string()))?;

        tracing::info!(id = %entry.id, brief = %brief, "stored report in cache");
        Ok(true)
    }

    async fn embed(&self, brief: &CreativeBrief) -> Result<Vec<f32>, CacheError> {
        embed_one(self.embedder.as_ref(), &brief.canonical_text())
            .await
            .map_err(|e| CacheError::Embedding(e.to_string()))
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        let models = self.index.stats().await?;
        Ok(CacheStats {
            entries: models.iter().map(|m| m.entries).sum(),
            models,
        })
    }

    pub async fn clear(&self) -> Result<u64> {
        let removed = self.index.clear().await?;
        tracing::info!(removed, "cleared semantic cache");
        Ok(removed)
    }
}
