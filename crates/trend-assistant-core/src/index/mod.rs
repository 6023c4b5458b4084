//! Vector index abstraction for the semantic cache.
//!
//! The [`VectorIndex`] trait is the only durable shared state in the
//! pipeline. It is append-only: entries are never overwritten or
//! de-duplicated, and lookups only ever need the nearest match.
//!
//! Implementations must make each single `insert` and each single
//! `query_nearest` atomic with respect to one another, so a concurrent
//! query never observes a half-written record.

pub mod memory;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{CacheEntry, CreativeBrief};
use crate::report::TrendReport;

/// A cache entry in its stored (serialized) form.
///
/// The brief and report travel as JSON so a backend never needs to know
/// their shape; decoding back into a [`CacheEntry`] happens in
/// [`IndexRecord::decode`], where schema drift surfaces as an error
/// instead of a panic.
#[derive(Debug, Clone)]
pub struct IndexRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub model: String,
    pub brief_hash: String,
    pub brief_json: String,
    pub report_json: String,
    pub created_at: DateTime<Utc>,
}

impl IndexRecord {
    pub fn from_entry(entry: &CacheEntry) -> Result<Self> {
        Ok(Self {
            id: entry.id.clone(),
            vector: entry.embedding.clone(),
            model: entry.model.clone(),
            brief_hash: entry.brief_hash.clone(),
            brief_json: serde_json::to_string(&entry.brief)?,
            report_json: serde_json::to_string(&entry.report)?,
            created_at: entry.created_at,
        })
    }

    /// Rebuild the typed entry. Does not validate the report schema.
    pub fn decode(&self) -> Result<CacheEntry> {
        let brief: CreativeBrief = serde_json::from_str(&self.brief_json)
            .with_context(|| format!("cache entry {} has an unreadable brief", self.id))?;
        let report: TrendReport = serde_json::from_str(&self.report_json)
            .with_context(|| format!("cache entry {} has an unreadable report", self.id))?;
        Ok(CacheEntry {
            id: self.id.clone(),
            embedding: self.vector.clone(),
            model: self.model.clone(),
            brief,
            brief_hash: self.brief_hash.clone(),
            report,
            created_at: self.created_at,
        })
    }
}

/// A query result: a stored record and its cosine similarity to the query.
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub similarity: f32,
    pub record: IndexRecord,
}

impl Neighbor {
    /// Cosine distance (`1 - similarity`).
    pub fn distance(&self) -> f32 {
        1.0 - self.similarity
    }
}

/// Per-model entry counts reported by [`VectorIndex::stats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCount {
    pub model: String,
    pub entries: u64,
}

/// Abstract storage backend for cache entries.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert`](VectorIndex::insert) | Append one record |
/// | [`query_nearest`](VectorIndex::query_nearest) | Top-`k` records by cosine similarity |
/// | [`stats`](VectorIndex::stats) | Entry counts grouped by embedding model |
/// | [`clear`](VectorIndex::clear) | Delete every record |
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Append a record. Never replaces an existing one.
    async fn insert(&self, record: &IndexRecord) -> Result<()>;

    /// Return up to `k` records ordered by descending similarity.
    ///
    /// Records whose vector length differs from `query` are skipped.
    async fn query_nearest(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>>;

    async fn stats(&self) -> Result<Vec<ModelCount>>;

    /// Delete every record, returning how many were removed.
    async fn clear(&self) -> Result<u64>;
}
