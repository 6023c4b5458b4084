//! Web research: brief → search queries → URLs → article text.
//!
//! Search and page fetching sit behind the [`SearchProvider`] and
//! [`PageFetcher`] traits. The defaults are the Google Custom Search JSON
//! API ([`GoogleSearch`]) and a plain `reqwest` GET ([`HttpFetcher`]).
//!
//! Every per-query and per-URL failure is logged and skipped: research
//! returning zero documents is a valid outcome, and deciding what to do
//! about it is the synthesizer's job.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use thiserror::Error;

use trend_assistant_core::models::{CreativeBrief, SourceDocument};

use crate::config::ResearchConfig;
use crate::error::{parse_retry_after, ProviderError};
use crate::extract::{extract_article_text, ExtractLimits};

const GOOGLE_CSE_URL: &str = "https://www.googleapis.com/customsearch/v1";

/// Expand a brief into search queries.
///
/// Deterministic: the same brief always yields the same queries in the
/// same order. Each query carries `-site:` exclusions for
/// `excluded_sites`; at most `max_queries` are returned.
pub fn generate_queries(
    brief: &CreativeBrief,
    excluded_sites: &[String],
    max_queries: usize,
) -> Vec<String> {
    let season = brief.season().label();
    let year = brief.year();
    let theme = brief.theme_hint();
    let audience = brief
        .target_audience()
        .map(|a| format!(" for {}", a))
        .unwrap_or_default();
    let in_region = brief
        .region()
        .map(|r| format!(" in {}", r))
        .unwrap_or_default();
    let runway_region = brief
        .region()
        .map(|r| format!(" {}", r))
        .unwrap_or_default();

    let exclusions: String = excluded_sites
        .iter()
        .map(|site| format!(" -site:{}", site.trim()))
        .collect();

    [
        format!("WGSN {season} {year} fashion trends {theme}{audience}"),
        format!("Vogue Runway{runway_region} {season} {year} trend report analysis"),
        format!("Business of Fashion {season} {year} materials {theme}"),
        format!("Dazed Digital {theme} aesthetic{audience}{in_region}"),
        format!("latest street style {theme}{in_region}"),
    ]
    .into_iter()
    .take(max_queries)
    .map(|q| format!("{}{}", q, exclusions))
    .collect()
}

// ============ Search ============

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Up to `num` result URLs for `query`, best first.
    async fn search(&self, query: &str, num: usize) -> Result<Vec<String>, ProviderError>;
}

/// Google Custom Search JSON API. Needs `GOOGLE_API_KEY` and `SEARCH_ENGINE_ID`.
pub struct GoogleSearch {
    http: reqwest::Client,
    api_key: String,
    engine_id: String,
}

impl GoogleSearch {
    pub fn from_env(timeout: Duration) -> Result<Self> {
        let api_key = std::env::var("GOOGLE_API_KEY")
            .map_err(|_| anyhow!("GOOGLE_API_KEY environment variable not set"))?;
        let engine_id = std::env::var("SEARCH_ENGINE_ID")
            .map_err(|_| anyhow!("SEARCH_ENGINE_ID environment variable not set"))?;
        Ok(Self {
            http: reqwest::Client::builder().timeout(timeout).build()?,
            api_key,
            engine_id,
        })
    }
}

#[async_trait]
impl SearchProvider for GoogleSearch {
    async fn search(&self, query: &str, num: usize) -> Result<Vec<String>, ProviderError> {
        let num = num.clamp(1, 10).to_string();
        let response = self
            .http
            .get(GOOGLE_CSE_URL)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers().get("retry-after"));
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, body, retry_after));
        }

        let json: serde_json::Value = response.json().await?;
        Ok(parse_search_links(&json))
    }
}

fn parse_search_links(json: &serde_json::Value) -> Vec<String> {
    json.get("items")
        .and_then(|items| items.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("link").and_then(|l| l.as_str()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Search provider that finds nothing. Used when `research.search_provider = "disabled"`.
pub struct DisabledSearch;

#[async_trait]
impl SearchProvider for DisabledSearch {
    async fn search(&self, _query: &str, _num: usize) -> Result<Vec<String>, ProviderError> {
        Ok(Vec::new())
    }
}

pub fn create_search_provider(config: &ResearchConfig) -> Result<Arc<dyn SearchProvider>> {
    match config.search_provider.as_str() {
        "google" => Ok(Arc::new(GoogleSearch::from_env(Duration::from_secs(
            config.fetch_timeout_secs,
        ))?)),
        "disabled" => Ok(Arc::new(DisabledSearch)),
        other => Err(anyhow!("Unknown search provider: {}", other)),
    }
}

// ============ Fetch ============

/// Raw HTML of a fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Html(pub String);

impl Html {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("unsupported url: {0}")]
    InvalidUrl(String),
    #[error("http status {0}")]
    Status(u16),
    #[error("timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("not an html page ({0})")]
    NotHtml(String),
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Html, FetchError>;
}

/// Only `http://` and `https://` URLs are fetched.
pub fn is_fetchable(url: &str) -> bool {
    let lower = url.trim().to_ascii_lowercase();
    (lower.starts_with("https://") || lower.starts_with("http://")) && lower.len() > "https://".len()
}

/// `reqwest` GET with a browser-like user agent.
pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &ResearchConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Html, FetchError> {
        if !is_fetchable(url) {
            return Err(FetchError::InvalidUrl(url.to_string()));
        }
        let response = self.http.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_string();
        if !content_type.contains("html") && !content_type.starts_with("text/") {
            return Err(FetchError::NotHtml(content_type));
        }

        response
            .text()
            .await
            .map(Html)
            .map_err(|e| FetchError::Network(e.to_string()))
    }
}

// ============ Client ============

pub struct ResearchClient {
    search: Arc<dyn SearchProvider>,
    fetcher: Arc<dyn PageFetcher>,
    config: ResearchConfig,
}

impl ResearchClient {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        fetcher: Arc<dyn PageFetcher>,
        config: ResearchConfig,
    ) -> Self {
        Self {
            search,
            fetcher,
            config,
        }
    }

    /// Build the client with the configured search provider and the HTTP fetcher.
    pub fn from_config(config: &ResearchConfig) -> Result<Self> {
        Ok(Self::new(
            create_search_provider(config)?,
            Arc::new(HttpFetcher::new(config)?),
            config.clone(),
        ))
    }

    /// Search, de-duplicate, fetch and extract. Never fails; may be empty.
    pub async fn gather_documents(&self, brief: &CreativeBrief) -> Vec<SourceDocument> {
        let queries = generate_queries(brief, &self.config.excluded_sites, self.config.max_queries);
        let urls = self.collect_urls(&queries).await;
        if urls.is_empty() {
            tracing::warn!("no URLs found for any search query");
            return Vec::new();
        }
        tracing::info!(urls = urls.len(), "fetching research pages");

        let limits = ExtractLimits {
            min_chars: self.config.min_content_chars,
            max_chars: self.config.max_document_chars,
        };
        let documents: Vec<SourceDocument> = stream::iter(urls.iter())
            .map(|url| self.fetch_document(url, limits))
            .buffered(self.config.max_concurrent_fetches.max(1))
            .filter_map(|doc| async move { doc })
            .collect()
            .await;

        tracing::info!(
            documents = documents.len(),
            urls = urls.len(),
            "research complete"
        );
        documents
    }

    async fn collect_urls(&self, queries: &[String]) -> Vec<String> {
        let results = futures::future::join_all(
            queries
                .iter()
                .map(|q| self.search.search(q, self.config.results_per_query)),
        )
        .await;

        let mut seen = HashSet::new();
        let mut urls = Vec::new();
        for (query, result) in queries.iter().zip(results) {
            match result {
                Ok(links) => {
                    tracing::debug!(query = %query, found = links.len(), "search results");
                    for link in links {
                        if seen.insert(link.clone()) {
                            urls.push(link);
                        }
                    }
                }
                Err(e) => tracing::warn!(query = %query, error = %e, "search failed"),
            }
        }
        urls
    }

    async fn fetch_document(&self, url: &str, limits: ExtractLimits) -> Option<SourceDocument> {
        if !is_fetchable(url) {
            tracing::warn!(url, "skipping unsupported url");
            return None;
        }
        let html = match self.fetcher.fetch(url).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(url, error = %e, "fetch failed");
                return None;
            }
        };
        match extract_article_text(html.as_str(), limits) {
            Ok(text) => {
                tracing::debug!(url, chars = text.chars().count(), "extracted article text");
                Some(SourceDocument {
                    url: url.to_string(),
                    raw_text: text,
                    fetched_at: Utc::now(),
                })
            }
            Err(e) => {
                tracing::info!(url, reason = %e, "skipping page");
                None
            }
        }
    }
}
