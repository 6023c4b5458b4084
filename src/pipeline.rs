//! End-to-end orchestration of one trend run.
//!
//! ```text
//! brief ─► cache lookup ──hit──────────────────────────────► report
//!               │miss
//!               ▼
//!          research ─► batch summarize ─► synthesize ─► cache store ─► report
//! ```
//!
//! Prompts are generated from whichever report comes out. Every stage runs
//! under the caller's [`CancellationToken`]; a cancelled run returns
//! [`PipelineError::Cancelled`] and never writes to the cache.

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use trend_assistant_core::index::VectorIndex;
use trend_assistant_core::models::CreativeBrief;
use trend_assistant_core::prompts::PromptSet;
use trend_assistant_core::report::TrendReport;

use crate::cache::SemanticCache;
use crate::config::Config;
use crate::embedding::create_provider;
use crate::error::PipelineError;
use crate::llm::{create_generator, ThrottledGenerator};
use crate::rate_limit::RateLimiter;
use crate::research::ResearchClient;
use crate::retry::RetryPolicy;
use crate::sqlite_index::SqliteVectorIndex;
use crate::summarize::BatchSummarizer;
use crate::synthesize::Synthesizer;

/// Where a run's report came from.
#[derive(Debug, Clone, PartialEq)]
pub enum RunSource {
    Cached {
        similarity: f32,
    },
    Fresh {
        documents: usize,
        summaries_succeeded: usize,
        summaries_failed: usize,
        validation_retries: u32,
        /// Whether the report was written back to the cache.
        stored: bool,
    },
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: TrendReport,
    pub prompts: PromptSet,
    pub source: RunSource,
}

impl RunOutcome {
    pub fn is_cached(&self) -> bool {
        matches!(self.source, RunSource::Cached { .. })
    }
}

pub struct Pipeline {
    cache: Option<SemanticCache>,
    research: ResearchClient,
    summarizer: BatchSummarizer,
    synthesizer: Synthesizer,
}

impl Pipeline {
    pub fn new(research: ResearchClient, summarizer: BatchSummarizer, synthesizer: Synthesizer) -> Self {
        Self {
            cache: None,
            research,
            summarizer,
            synthesizer,
        }
    }

    pub fn with_cache(mut self, cache: SemanticCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cache(&self) -> Option<&SemanticCache> {
        self.cache.as_ref()
    }

    /// Wire every component from configuration.
    ///
    /// The cache is attached only when `use_cache` is set, `cache.enabled`
    /// is on and an embedding provider is configured.
    pub async fn from_config(config: &Config, generator: ThrottledGenerator, use_cache: bool) -> Result<Self> {
        let research = ResearchClient::from_config(&config.research)?;
        let summarizer = BatchSummarizer::new(
            generator.clone(),
            config.rate_limit.requests_per_window,
            config.llm.summary_temperature,
        );
        let synthesizer = Synthesizer::new(generator, &config.synthesis);
        let pipeline = Self::new(research, summarizer, synthesizer);

        if !use_cache {
            tracing::info!("semantic cache bypassed for this run");
            return Ok(pipeline);
        }
        if !config.cache.enabled || !config.embedding.is_enabled() {
            tracing::info!("semantic cache disabled by configuration");
            return Ok(pipeline);
        }

        let embedder =
            create_provider(&config.embedding, RetryPolicy::from_config(&config.retry))?;
        let index: Arc<dyn VectorIndex> = Arc::new(SqliteVectorIndex::open(config).await?);
        Ok(pipeline.with_cache(SemanticCache::new(
            embedder,
            index,
            config.cache.similarity_threshold,
        )))
    }

    pub async fn run(
        &self,
        brief: &CreativeBrief,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, PipelineError> {
        tracing::info!(brief = %brief, "starting trend run");

        if let Some(cache) = &self.cache {
            if let Some(hit) = until_cancelled(cancel, cache.lookup(brief)).await? {
                let prompts = PromptSet::from_report(&hit.report);
                return Ok(RunOutcome {
                    report: hit.report,
                    prompts,
                    source: RunSource::Cached {
                        similarity: hit.similarity,
                    },
                });
            }
        }

        let documents = until_cancelled(cancel, self.research.gather_documents(brief)).await?;
        tracing::info!(documents = documents.len(), "research complete");

        let summaries = self.summarizer.summarize_all(&documents, cancel).await?;
        let summaries_succeeded = summaries.iter().filter(|s| s.succeeded).count();
        let summaries_failed = summaries.len() - summaries_succeeded;

        let outcome = until_cancelled(cancel, self.synthesizer.synthesize(brief, &summaries)).await??;

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        let stored = match &self.cache {
            Some(cache) => cache.store(brief, &outcome.report).await,
            None => false,
        };

        let prompts = PromptSet::from_report(&outcome.report);
        tracing::info!(prompts = prompts.len(), stored, "trend run complete");
        Ok(RunOutcome {
            report: outcome.report,
            prompts,
            source: RunSource::Fresh {
                documents: documents.len(),
                summaries_succeeded,
                summaries_failed,
                validation_retries: outcome.validation_retries,
                stored,
            },
        })
    }
}

/// Shared generator for a run: one rate window, one in-flight semaphore.
pub fn build_generator(config: &Config) -> Result<ThrottledGenerator> {
    let inner = create_generator(&config.llm)?;
    let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
    Ok(ThrottledGenerator::new(
        inner,
        limiter,
        config.rate_limit.max_in_flight,
        RetryPolicy::from_config(&config.retry),
    ))
}

pub(crate) async fn until_cancelled<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, PipelineError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PipelineError::Cancelled),
        out = fut => Ok(out),
    }
}
