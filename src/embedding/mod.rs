//! Embedding provider implementations.
//!
//! Concrete backends for the [`EmbeddingProvider`] trait from the core crate:
//! - **[`DisabledProvider`]**: always errors; the semantic cache then
//!   degrades to a guaranteed miss.
//! - **[`GeminiEmbedder`]**: Gemini `embedContent` / `batchEmbedContents`.
//! - **[`OpenAIProvider`]**: OpenAI `POST /v1/embeddings`.
//! - **[`OllamaProvider`]**: a local Ollama instance's `/api/embed`.
//!
//! # Retry Strategy
//!
//! All network providers share [`post_with_retry`], driven by the
//! `[retry]` [`RetryPolicy`]:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::Value;

pub use trend_assistant_core::embedding::{embed_one, EmbeddingProvider};

use crate::config::EmbeddingConfig;
use crate::retry::RetryPolicy;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const GEMINI_DEFAULT_MODEL: &str = "gemini-embedding-001";
const GEMINI_DEFAULT_DIMS: usize = 3072;

enum Failure {
    Transient(anyhow::Error),
    Fatal(anyhow::Error),
}

async fn with_retry<T, F, Fut>(policy: RetryPolicy, service: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, Failure>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(Failure::Fatal(e)) => return Err(e),
            Err(Failure::Transient(e)) => {
                if !policy.should_retry(attempt) {
                    return Err(e);
                }
                let delay = policy.backoff(attempt);
                tracing::debug!(service, attempt, ?delay, error = %e, "retrying embedding request");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// POST a JSON body, retrying on 429, 5xx and network errors.
async fn post_with_retry(
    client: &reqwest::Client,
    url: &str,
    headers: &[(&str, String)],
    body: &Value,
    retry: RetryPolicy,
    service: &str,
) -> Result<Value> {
    with_retry(retry, service, || async move {
        let mut request = client.post(url).json(body);
        for (name, value) in headers {
            request = request.header(*name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Failure::Transient(anyhow!("{} connection error: {}", service, e)))?;
        let status = response.status();
        if status.is_success() {
            return response
                .json::<Value>()
                .await
                .map_err(|e| Failure::Fatal(e.into()));
        }

        let body_text = response.text().await.unwrap_or_default();
        let err = anyhow!("{} API error {}: {}", service, status, body_text);
        if status.as_u16() == 429 || status.is_server_error() {
            Err(Failure::Transient(err))
        } else {
            Err(Failure::Fatal(err))
        }
    })
    .await
}

fn parse_float_array(value: &Value, what: &str) -> Result<Vec<f32>> {
    let values = value
        .as_array()
        .ok_or_else(|| anyhow!("Invalid embedding response: {} is not an array", what))?;
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_f64().map(|f| f as f32).ok_or_else(|| {
                anyhow!("Invalid embedding response: {}[{}] is not a number", what, i)
            })
        })
        .collect()
}

fn http_client(config: &EmbeddingConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?)
}

// ============ Disabled Provider ============

/// Used when `embedding.provider = "disabled"`.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed_texts(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("Embedding provider is disabled")
    }
}

// ============ Gemini Provider ============

/// Gemini embedding models. Requires `GEMINI_API_KEY`.
pub struct GeminiEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dims: usize,
    base_url: String,
    retry: RetryPolicy,
    /// Sent as `outputDimensionality` only when configured explicitly.
    requested_dims: Option<usize>,
}

impl GeminiEmbedder {
    pub fn new(config: &EmbeddingConfig, retry: RetryPolicy) -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow!("GEMINI_API_KEY environment variable not set"))?;
        Ok(Self {
            client: http_client(config)?,
            api_key,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| GEMINI_DEFAULT_MODEL.to_string()),
            dims: config.dims.unwrap_or(GEMINI_DEFAULT_DIMS),
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
            retry,
            requested_dims: config.dims,
        })
    }

    fn request_for(&self, text: &str) -> Value {
        let mut request = serde_json::json!({
            "model": format!("models/{}", self.model),
            "content": { "parts": [{ "text": text }] },
        });
        if let Some(dims) = self.requested_dims {
            request["outputDimensionality"] = Value::from(dims);
        }
        request
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let headers = [("x-goog-api-key", self.api_key.clone())];
        if let [single] = texts {
            let url = format!("{}/models/{}:embedContent", self.base_url, self.model);
            let json = post_with_retry(
                &self.client,
                &url,
                &headers,
                &self.request_for(single),
                self.retry,
                "Gemini",
            )
            .await?;
            return Ok(vec![parse_gemini_single(&json)?]);
        }

        let url = format!("{}/models/{}:batchEmbedContents", self.base_url, self.model);
        let body = serde_json::json!({
            "requests": texts.iter().map(|t| self.request_for(t)).collect::<Vec<_>>(),
        });
        let json = post_with_retry(
            &self.client,
            &url,
            &headers,
            &body,
            self.retry,
            "Gemini",
        )
        .await?;
        parse_gemini_batch(&json)
    }
}

fn parse_gemini_single(json: &Value) -> Result<Vec<f32>> {
    let values = json
        .get("embedding")
        .and_then(|e| e.get("values"))
        .ok_or_else(|| anyhow!("Invalid Gemini response: missing embedding.values"))?;
    parse_float_array(values, "embedding.values")
}

fn parse_gemini_batch(json: &Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Gemini response: missing embeddings array"))?;
    embeddings
        .iter()
        .map(|e| {
            let values = e
                .get("values")
                .ok_or_else(|| anyhow!("Invalid Gemini response: missing values"))?;
            parse_float_array(values, "values")
        })
        .collect()
}

// ============ OpenAI Provider ============

/// OpenAI embeddings. Requires `OPENAI_API_KEY`.
pub struct OpenAIProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dims: usize,
    retry: RetryPolicy,
}

impl OpenAIProvider {
    /// # Errors
    ///
    /// Returns an error if `model` or `dims` is not set in config,
    /// or if `OPENAI_API_KEY` is not in the environment.
    pub fn new(config: &EmbeddingConfig, retry: RetryPolicy) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow!("embedding.dims required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;

        Ok(Self {
            client: http_client(config)?,
            api_key,
            model,
            dims,
            retry,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let json = post_with_retry(
            &self.client,
            "https://api.openai.com/v1/embeddings",
            &[("Authorization", format!("Bearer {}", self.api_key))],
            &body,
            self.retry,
            "OpenAI",
        )
        .await?;
        parse_openai_response(&json)
    }
}

/// Extracts the `data[].embedding` arrays, ordered by `index`.
fn parse_openai_response(json: &Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        let embedding = item
            .get("embedding")
            .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))?;
        indexed.push((index, parse_float_array(embedding, "embedding")?));
    }
    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama Provider ============

/// Embeddings from a local Ollama instance (default `http://localhost:11434`).
pub struct OllamaProvider {
    client: reqwest::Client,
    model: String,
    dims: usize,
    url: String,
    retry: RetryPolicy,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig, retry: RetryPolicy) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for Ollama provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow!("embedding.dims required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        Ok(Self {
            client: http_client(config)?,
            model,
            dims,
            url,
            retry,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let json = post_with_retry(
            &self.client,
            &format!("{}/api/embed", self.url),
            &[],
            &body,
            self.retry,
            "Ollama",
        )
        .await?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings array"))?;
    embeddings
        .iter()
        .map(|e| parse_float_array(e, "embedding"))
        .collect()
}

/// Create the configured [`EmbeddingProvider`].
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledProvider`] |
/// | `"gemini"` | [`GeminiEmbedder`] |
/// | `"openai"` | [`OpenAIProvider`] |
/// | `"ollama"` | [`OllamaProvider`] |
pub fn create_provider(
    config: &EmbeddingConfig,
    retry: RetryPolicy,
) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "gemini" => Ok(Arc::new(GeminiEmbedder::new(config, retry)?)),
        "openai" => Ok(Arc::new(OpenAIProvider::new(config, retry)?)),
        "ollama" => Ok(Arc::new(OllamaProvider::new(config, retry)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}
