//! SQLite-backed [`VectorIndex`].
//!
//! Vectors are stored as little-endian `f32` BLOBs in `cache_entries`.
//! Nearest-neighbor lookup fetches every vector of matching dimension and
//! computes cosine similarity in Rust; the cache holds one row per
//! distinct brief ever researched, so a full scan stays cheap.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use trend_assistant_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use trend_assistant_core::index::{IndexRecord, ModelCount, Neighbor, VectorIndex};

use crate::config::Config;
use crate::{db, migrate};

pub struct SqliteVectorIndex {
    pool: SqlitePool,
}

impl SqliteVectorIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the configured database and make sure the schema exists.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::ensure_schema(&pool).await?;
        Ok(Self::new(pool))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn insert(&self, record: &IndexRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cache_entries (id, model, dims, embedding, brief_hash,
                                       brief_json, report_json, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.model)
        .bind(record.vector.len() as i64)
        .bind(vec_to_blob(&record.vector))
        .bind(&record.brief_hash)
        .bind(&record.brief_json)
        .bind(&record.report_json)
        .bind(record.created_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn query_nearest(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        let rows = sqlx::query(
            r#"
            SELECT id, model, embedding, brief_hash, brief_json, report_json, created_at
            FROM cache_entries
            WHERE dims = ?
            "#,
        )
        .bind(query.len() as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut neighbors: Vec<Neighbor> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vector = blob_to_vec(&blob);
                Neighbor {
                    similarity: cosine_similarity(query, &vector),
                    record: IndexRecord {
                        id: row.get("id"),
                        vector,
                        model: row.get("model"),
                        brief_hash: row.get("brief_hash"),
                        brief_json: row.get("brief_json"),
                        report_json: row.get("report_json"),
                        created_at: from_millis(row.get("created_at")),
                    },
                }
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
        let rows = sqlx::query(
            "SELECT model, COUNT(*) AS entries FROM cache_entries GROUP BY model ORDER BY model",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| ModelCount {
                model: row.get("model"),
                entries: row.get::<i64, _>("entries") as u64,
            })
            .collect())
    }

    async fn clear(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cache_entries")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
