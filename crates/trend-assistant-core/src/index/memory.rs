//! In-memory [`VectorIndex`] implementation for testing.
//!
//! Uses a `Vec` behind `std::sync::RwLock`. Query is brute-force cosine
//! similarity over all stored vectors, the same scan the SQLite backend
//! performs.

use std::collections::BTreeMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_similarity;

use super::{IndexRecord, ModelCount, Neighbor, VectorIndex};

/// In-memory vector index.
pub struct InMemoryVectorIndex {
    records: RwLock<Vec<IndexRecord>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryVectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow::anyhow!("in-memory index lock poisoned")
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn insert(&self, record: &IndexRecord) -> Result<()> {
        let mut records = self.records.write().map_err(poisoned)?;
        records.push(record.clone());
        Ok(())
    }

    async fn query_nearest(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        let records = self.records.read().map_err(poisoned)?;
        let mut neighbors: Vec<Neighbor> = records
            .iter()
            .filter(|r| r.vector.len() == query.len())
            .map(|r| Neighbor {
                similarity: cosine_similarity(query, &r.vector),
                record: r.clone(),
            })
            .collect();
        neighbors.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        neighbors.truncate(k);
        Ok(neighbors)
    }

    async fn stats(&self) -> Result<Vec<ModelCount>> {
        let records = self.records.read().map_err(poisoned)?;
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for r in records.iter() {
            *counts.entry(r.model.clone()).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(model, entries)| ModelCount { model, entries })
            .collect())
    }

    async fn clear(&self) -> Result<u64> {
        let mut records = self.records.write().map_err(poisoned)?;
        let removed = records.len() as u64;
        records.clear();
        Ok(removed)
    }
}
