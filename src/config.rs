//! TOML configuration.
//!
//! Every section has serde defaults, so an empty file is a valid config.
//! [`load_config`] parses the file and then runs a validation pass that
//! rejects values the pipeline cannot honor. Secrets never live in the
//! file; providers read them from the environment.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub research: ResearchConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/trend.sqlite")
}

/// Text-generation service settings.
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Override for the REST base URL (proxies, local emulators).
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_summary_temperature")]
    pub summary_temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            base_url: None,
            timeout_secs: default_llm_timeout_secs(),
            summary_temperature: default_summary_temperature(),
        }
    }
}

fn default_llm_provider() -> String {
    "gemini".to_string()
}
fn default_llm_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    120
}
fn default_summary_temperature() -> f32 {
    0.3
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for self-hosted providers (Ollama).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_embedding_provider() -> String {
    "disabled".to_string()
}
fn default_embedding_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Minimum cosine similarity for a stored report to count as a hit.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_similarity_threshold() -> f32 {
    0.85
}

/// Request budget for the text-generation service: at most
/// `requests_per_window` calls in any rolling `window_secs`.
#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    #[serde(default = "default_requests_per_window")]
    pub requests_per_window: usize,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Ceiling on in-flight requests, independent of the window.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: default_requests_per_window(),
            window_secs: default_window_secs(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

fn default_requests_per_window() -> usize {
    5
}
fn default_window_secs() -> u64 {
    61
}
fn default_max_in_flight() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    /// Total attempts per request, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1_000
}
fn default_max_delay_ms() -> u64 {
    32_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResearchConfig {
    #[serde(default = "default_search_provider")]
    pub search_provider: String,
    #[serde(default = "default_results_per_query")]
    pub results_per_query: usize,
    #[serde(default = "default_max_queries")]
    pub max_queries: usize,
    #[serde(default = "default_excluded_sites")]
    pub excluded_sites: Vec<String>,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,
    #[serde(default = "default_max_document_chars")]
    pub max_document_chars: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            search_provider: default_search_provider(),
            results_per_query: default_results_per_query(),
            max_queries: default_max_queries(),
            excluded_sites: default_excluded_sites(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            min_content_chars: default_min_content_chars(),
            max_document_chars: default_max_document_chars(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_search_provider() -> String {
    "google".to_string()
}
fn default_results_per_query() -> usize {
    2
}
fn default_max_queries() -> usize {
    5
}
fn default_excluded_sites() -> Vec<String> {
    vec!["pinterest.com".to_string(), "amazon.com".to_string()]
}
fn default_fetch_timeout_secs() -> u64 {
    20
}
fn default_max_concurrent_fetches() -> usize {
    4
}
fn default_min_content_chars() -> usize {
    200
}
fn default_max_document_chars() -> usize {
    150_000
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36"
        .to_string()
}

/// What synthesis does when no summary succeeded.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OnEmpty {
    /// Abort the run.
    #[default]
    Fail,
    /// Synthesize from the brief alone and flag the report.
    LowConfidence,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SynthesisConfig {
    #[serde(default = "default_synthesis_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_synthesis_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub on_empty: OnEmpty,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_synthesis_attempts(),
            temperature: default_synthesis_temperature(),
            on_empty: OnEmpty::Fail,
        }
    }
}

fn default_synthesis_attempts() -> u32 {
    3
}
fn default_synthesis_temperature() -> f32 {
    0.2
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PipelineConfig {
    /// Cancel the whole run after this many seconds.
    #[serde(default)]
    pub run_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
    #[serde(default = "default_report_file")]
    pub report_file: String,
    #[serde(default = "default_prompts_file")]
    pub prompts_file: String,
    #[serde(default = "default_invalid_response_file")]
    pub invalid_response_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_dir: default_results_dir(),
            report_file: default_report_file(),
            prompts_file: default_prompts_file(),
            invalid_response_file: default_invalid_response_file(),
        }
    }
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("./results")
}
fn default_report_file() -> String {
    "itemized_fashion_trends.json".to_string()
}
fn default_prompts_file() -> String {
    "generated_prompts.json".to_string()
}
fn default_invalid_response_file() -> String {
    "invalid_llm_response.json".to_string()
}

impl Config {
    /// In-code defaults with no file on disk.
    ///
    /// Used by commands that can run without a config (`trend prompts`)
    /// and by tests.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Reject configurations the pipeline cannot run with.
pub fn validate(config: &Config) -> Result<()> {
    // Validate cache
    let threshold = config.cache.similarity_threshold;
    if !(threshold > 0.0 && threshold <= 1.0) {
        bail!("cache.similarity_threshold must be in (0.0, 1.0], got {}", threshold);
    }

    // Validate rate limit
    if config.rate_limit.requests_per_window == 0 {
        bail!("rate_limit.requests_per_window must be >= 1");
    }
    if config.rate_limit.window_secs == 0 {
        bail!("rate_limit.window_secs must be >= 1");
    }
    if config.rate_limit.max_in_flight == 0 {
        bail!("rate_limit.max_in_flight must be >= 1");
    }

    // Validate retry
    if config.retry.max_attempts == 0 {
        bail!("retry.max_attempts must be >= 1");
    }
    if config.retry.base_delay_ms > config.retry.max_delay_ms {
        bail!("retry.base_delay_ms must not exceed retry.max_delay_ms");
    }

    // Validate research
    if config.research.max_queries == 0 {
        bail!("research.max_queries must be >= 1");
    }
    if config.research.results_per_query == 0 || config.research.results_per_query > 10 {
        bail!("research.results_per_query must be in 1..=10");
    }
    if config.research.max_concurrent_fetches == 0 {
        bail!("research.max_concurrent_fetches must be >= 1");
    }
    if config.research.max_document_chars < config.research.min_content_chars {
        bail!("research.max_document_chars must be >= research.min_content_chars");
    }

    // Validate synthesis
    if config.synthesis.max_attempts == 0 {
        bail!("synthesis.max_attempts must be >= 1");
    }
    if !(0.0..=2.0).contains(&config.synthesis.temperature) {
        bail!("synthesis.temperature must be in [0.0, 2.0]");
    }

    // Validate embedding
    if config.embedding.is_enabled() {
        if config.embedding.dims == Some(0) {
            bail!("embedding.dims must be > 0 when set");
        }
        if config.embedding.provider != "gemini" && config.embedding.model.is_none() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "gemini" | "openai" | "ollama" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, gemini, openai, or ollama.",
            other
        ),
    }

    match config.llm.provider.as_str() {
        "gemini" => {}
        other => bail!("Unknown llm provider: '{}'. Must be gemini.", other),
    }

    match config.research.search_provider.as_str() {
        "google" | "disabled" => {}
        other => bail!(
            "Unknown research.search_provider: '{}'. Must be google or disabled.",
            other
        ),
    }

    Ok(())
}
