//! Error taxonomy for the research and synthesis pipeline.
//!
//! [`ProviderError`] classifies a single failed call to an external
//! service and decides whether it is worth retrying. [`PipelineError`] is
//! what a run can end with. [`CacheError`] never leaves the semantic
//! cache: it is logged and turned into a miss.

use std::time::Duration;

use reqwest::header::HeaderValue;
use reqwest::StatusCode;
use thiserror::Error;
use trend_assistant_core::models::BriefError;
use trend_assistant_core::report::SchemaError;

/// Failure of one request to a text-generation, embedding, or search service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("rate limited by provider")]
    RateLimited { retry_after: Option<Duration> },
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("empty response")]
    Empty,
}

impl ProviderError {
    /// Timeouts, connection drops, rate limits, 5xx and unusable bodies
    /// are transient. A 4xx rejection is not.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ProviderError::Rejected { .. })
    }

    /// Classify a non-success HTTP response.
    pub fn from_status(status: StatusCode, body: String, retry_after: Option<Duration>) -> Self {
        if status == StatusCode::TOO_MANY_REQUESTS {
            return ProviderError::RateLimited { retry_after };
        }
        if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::GATEWAY_TIMEOUT {
            return ProviderError::Timeout;
        }
        let message = truncate(&body, 300);
        if status.is_server_error() {
            ProviderError::Server {
                status: status.as_u16(),
                message,
            }
        } else {
            ProviderError::Rejected {
                status: status.as_u16(),
                message,
            }
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_decode() {
            ProviderError::Malformed(err.to_string())
        } else {
            ProviderError::Connection(err.to_string())
        }
    }
}

/// Parse a `Retry-After` header given in seconds.
pub fn parse_retry_after(header: Option<&HeaderValue>) -> Option<Duration> {
    let value = header?.to_str().ok()?;
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... ({} bytes total)", &s[..end], s.len())
}

/// Terminal outcomes of a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Every synthesis attempt produced output that failed the report schema.
    #[error("synthesis produced no valid report after {attempts} attempts: {error}")]
    Validation {
        attempts: u32,
        error: SchemaError,
        /// Raw text of the last response, kept for inspection.
        raw_response: String,
    },
    /// Nothing usable was left to synthesize from.
    #[error("research exhausted: {0}")]
    Exhausted(String),
    #[error("provider failure: {0}")]
    Provider(#[from] ProviderError),
    #[error("run cancelled")]
    Cancelled,
    #[error("invalid brief: {0}")]
    InvalidBrief(#[from] BriefError),
    #[error("configuration error: {0}")]
    Config(String),
}

/// Failures inside the semantic cache. Always downgraded to a miss or a log line.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("embedding failed: {0}")]
    Embedding(String),
    #[error("vector index unavailable: {0}")]
    Index(String),
    #[error("cache entry {id} is corrupt: {reason}")]
    Corrupt { id: String, reason: String },
}
