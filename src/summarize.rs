//! Rate-limited batch summarization of research documents.
//!
//! Documents are cut into batches of `R` (the rate window's capacity).
//! Requests inside a batch run concurrently and the batch completes when
//! all of them have settled; batches run in order. The shared
//! [`RateLimiter`](crate::rate_limit::RateLimiter) behind the
//! [`ThrottledGenerator`] decides when each request may actually go out,
//! so retries and rate-limit signals are accounted for as well.
//!
//! A failing document never fails the batch: it comes back as a
//! [`DocumentSummary`] with `succeeded = false`.

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use trend_assistant_core::models::{DocumentSummary, SourceDocument};

use crate::error::PipelineError;
use crate::llm::{Attempted, GenerationRequest, ThrottledGenerator};

/// Reply the model gives for a document with nothing fashion-related in it.
pub const NO_RELEVANT_INFORMATION: &str = "No relevant information.";

pub fn summarization_prompt(document_text: &str) -> String {
    format!(
        "Your role is a meticulous research assistant for a high-end fashion magazine.\n\
         Analyze the following document and extract ONLY the most critical, factual \
         information related to fashion trends.\n\n\
         RULES:\n\
         1. Focus exclusively on: specific trends, designer/brand names, collection names, \
         garment types, colors, fabrics, materials, textures, prints, patterns, and silhouettes.\n\
         2. Ignore marketing language, opinions, boilerplate text (like 'cookie policy' or \
         'subscribe'), and irrelevant filler.\n\
         3. Present the extracted information as a concise, bulleted list.\n\
         4. If the document contains no relevant fashion information, respond with only \
         the text \"{sentinel}\"\n\n\
         DOCUMENT TEXT:\n---\n{document_text}\n---\n",
        sentinel = NO_RELEVANT_INFORMATION,
    )
}

fn is_no_relevant_information(text: &str) -> bool {
    text.trim()
        .trim_end_matches('.')
        .eq_ignore_ascii_case(NO_RELEVANT_INFORMATION.trim_end_matches('.'))
}

pub struct BatchSummarizer {
    generator: ThrottledGenerator,
    batch_size: usize,
    temperature: f32,
}

impl BatchSummarizer {
    pub fn new(generator: ThrottledGenerator, batch_size: usize, temperature: f32) -> Self {
        Self {
            generator,
            batch_size: batch_size.max(1),
            temperature,
        }
    }

    /// One summary per input document, in input order.
    ///
    /// Only cancellation produces an error; whatever was already
    /// summarized is dropped in that case.
    pub async fn summarize_all(
        &self,
        documents: &[SourceDocument],
        cancel: &CancellationToken,
    ) -> Result<Vec<DocumentSummary>, PipelineError> {
        let work = async {
            let mut summaries = Vec::with_capacity(documents.len());
            let batches = documents.len().div_ceil(self.batch_size);
            for (i, batch) in documents.chunks(self.batch_size).enumerate() {
                tracing::info!(
                    batch = i + 1,
                    of = batches,
                    size = batch.len(),
                    "summarizing batch"
                );
                let results = join_all(batch.iter().map(|doc| self.summarize_one(doc))).await;
                summaries.extend(results);
            }
            summaries
        };

        let summaries = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!("summarization cancelled");
                return Err(PipelineError::Cancelled);
            }
            summaries = work => summaries,
        };

        let failed = summaries.iter().filter(|s| !s.succeeded).count();
        tracing::info!(
            succeeded = summaries.len() - failed,
            failed,
            "summarization complete"
        );
        Ok(summaries)
    }

    async fn summarize_one(&self, doc: &SourceDocument) -> DocumentSummary {
        if doc.raw_text.trim().is_empty() {
            return DocumentSummary::failure(&doc.url, "empty input text", 0);
        }

        let request =
            GenerationRequest::new(summarization_prompt(&doc.raw_text)).with_temperature(self.temperature);
        let Attempted { result, attempts } = self.generator.generate(&request).await;

        match result {
            Ok(text) if is_no_relevant_information(&text) => {
                tracing::debug!(url = %doc.url, "no relevant information");
                DocumentSummary::failure(&doc.url, "no relevant information", attempts)
            }
            Ok(text) => DocumentSummary::success(&doc.url, text.trim(), attempts),
            Err(e) => {
                tracing::warn!(url = %doc.url, attempts, error = %e, "summary failed");
                DocumentSummary::failure(&doc.url, e.to_string(), attempts)
            }
        }
    }
}
