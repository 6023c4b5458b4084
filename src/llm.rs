//! Text-generation service client.
//!
//! [`TextGenerator`] is the seam every LLM call goes through; the default
//! implementation is [`GeminiClient`] (Gemini `generateContent` REST API).
//! [`ThrottledGenerator`] wraps any generator with the shared rate limiter,
//! an in-flight semaphore and the retry policy, and is what the
//! summarizer, synthesizer and brief deconstruction actually call.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::config::LlmConfig;
use crate::error::{parse_retry_after, ProviderError};
use crate::rate_limit::RateLimiter;
use crate::retry::RetryPolicy;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// One text-generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub temperature: Option<f32>,
    /// Ask the service for a JSON body (`responseMimeType`).
    pub json_mode: bool,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            temperature: None,
            json_mode: false,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn model_name(&self) -> &str;
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError>;
}

// ============ Gemini ============

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    /// Build a client from config. Reads `GEMINI_API_KEY`.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = match std::env::var("GEMINI_API_KEY") {
            Ok(key) if !key.trim().is_empty() => key,
            _ => bail!("GEMINI_API_KEY environment variable not set"),
        };
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_key,
            model: config.model.clone(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<PartOut<'a>>,
}

#[derive(Serialize)]
struct PartOut<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<PartIn>,
}

#[derive(Deserialize)]
struct PartIn {
    #[serde(default)]
    text: Option<String>,
}

fn extract_text(response: GenerateContentResponse) -> Result<String, ProviderError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(ProviderError::Empty);
    }
    Ok(text)
}

#[async_trait]
impl TextGenerator for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![PartOut {
                    text: &request.prompt,
                }],
            }],
            system_instruction: request.system.as_deref().map(|s| Content {
                parts: vec![PartOut { text: s }],
            }),
            generation_config: GenerationConfig {
                temperature: request.temperature,
                response_mime_type: request.json_mode.then_some("application/json"),
            },
        };

        let response = self.http.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers().get("retry-after"));
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, text, retry_after));
        }

        let text = response.text().await?;
        let parsed: GenerateContentResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::Malformed(format!("Gemini response: {}", e)))?;
        extract_text(parsed)
    }
}

/// Create the configured text generator.
pub fn create_generator(config: &LlmConfig) -> Result<Arc<dyn TextGenerator>> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiClient::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

// ============ Throttling ============

/// Result of a throttled call, with the number of provider calls spent.
#[derive(Debug)]
pub struct Attempted<T> {
    pub result: Result<T, ProviderError>,
    pub attempts: u32,
}

/// A [`TextGenerator`] behind the shared limiter, semaphore and retry policy.
///
/// Every attempt, retries included, first takes an in-flight permit and
/// then a slot in the rate window, so the window counts requests at the
/// moment they are sent.
#[derive(Clone)]
pub struct ThrottledGenerator {
    inner: Arc<dyn TextGenerator>,
    limiter: Arc<RateLimiter>,
    in_flight: Arc<Semaphore>,
    retry: RetryPolicy,
}

impl ThrottledGenerator {
    pub fn new(
        inner: Arc<dyn TextGenerator>,
        limiter: Arc<RateLimiter>,
        max_in_flight: usize,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            inner,
            limiter,
            in_flight: Arc::new(Semaphore::new(max_in_flight.max(1))),
            retry,
        }
    }

    pub fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// One request with no retry. Still rate limited.
    pub async fn generate_once(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        let _permit = self
            .in_flight
            .acquire()
            .await
            .map_err(|_| ProviderError::Connection("in-flight semaphore closed".to_string()))?;
        self.limiter.acquire().await;
        let result = self.inner.generate(request).await;
        if let Err(ProviderError::RateLimited { retry_after }) = &result {
            self.limiter.signal_exhausted(*retry_after).await;
        }
        result
    }

    /// Send with retries on transient failures.
    pub async fn generate(&self, request: &GenerationRequest) -> Attempted<String> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.generate_once(request).await {
                Ok(text) => {
                    return Attempted {
                        result: Ok(text),
                        attempts,
                    }
                }
                Err(err) if err.is_retryable() && self.retry.should_retry(attempts) => {
                    let delay = self.retry.backoff(attempts);
                    tracing::debug!(
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying generation request"
                    );
                    self.limiter.clock().sleep(delay).await;
                }
                Err(err) => {
                    return Attempted {
                        result: Err(err),
                        attempts,
                    }
                }
            }
        }
    }
}
