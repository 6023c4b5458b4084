//! The `trend cache` commands: inspect and clear the semantic cache.
//!
//! Neither command embeds anything, so the cache is opened with the
//! disabled provider.

use std::sync::Arc;

use anyhow::Result;

use crate::cache::SemanticCache;
use crate::config::Config;
use crate::embedding::DisabledProvider;
use crate::sqlite_index::SqliteVectorIndex;

async fn open_cache(config: &Config) -> Result<(SemanticCache, Arc<SqliteVectorIndex>)> {
    let index = Arc::new(SqliteVectorIndex::open(config).await?);
    let cache = SemanticCache::new(
        Arc::new(DisabledProvider),
        index.clone(),
        config.cache.similarity_threshold,
    );
    Ok((cache, index))
}

pub async fn run_cache_stats(config: &Config) -> Result<()> {
    let (cache, index) = open_cache(config).await?;
    let stats = cache.stats().await?;
    index.close().await;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Trend Assistant — Semantic Cache");
    println!("================================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Threshold:   {}", cache.threshold());
    println!("  Entries:     {}", stats.entries);

    if !stats.models.is_empty() {
        println!();
        println!("  {:<40} {:>8}", "MODEL", "ENTRIES");
        for m in &stats.models {
            println!("  {:<40} {:>8}", m.model, m.entries);
        }
    }
    Ok(())
}

pub async fn run_cache_clear(config: &Config) -> Result<()> {
    let (cache, index) = open_cache(config).await?;
    let removed = cache.clear().await?;
    index.close().await;
    println!("Removed {} cache entr{}", removed, if removed == 1 { "y" } else { "ies" });
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use trend_assistant_core::index::{IndexRecord, VectorIndex};
    use trend_assistant_core::models::{CacheEntry, CreativeBrief, Season};
    use trend_assistant_core::report::TrendReport;

    use super::*;

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[tokio::test]
    async fn clear_goes_through_the_cache() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut config = Config::minimal();
        config.db.path = tmp.path().join("trend.sqlite");
        config.cache.similarity_threshold = 0.9;

        let (cache, index) = open_cache(&config).await.unwrap();
        assert_eq!(cache.threshold(), 0.9);
        let brief = CreativeBrief::new(Season::Fall, 2025, "minimalist tailoring").unwrap();
        let entry = CacheEntry::new(vec![1.0, 0.0], "keyword-test", brief, TrendReport::default());
        index
            .insert(&IndexRecord::from_entry(&entry).unwrap())
            .await
            .unwrap();

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.models[0].model, "keyword-test");
        assert_eq!(cache.clear().await.unwrap(), 1);
        assert_eq!(cache.stats().await.unwrap().entries, 0);
        index.close().await;
    }
}
