//! End-to-end tests for the trend pipeline with scripted collaborators.
//!
//! Every network boundary (search, page fetch, text generation, embedding)
//! is replaced by an in-process fake, so these tests exercise the real
//! cache, summarizer, synthesizer and orchestration logic under a paused
//! tokio clock.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use trend_assistant::brief::deconstruct;
use trend_assistant::cache::SemanticCache;
use trend_assistant::config::{OnEmpty, ResearchConfig, SynthesisConfig};
use trend_assistant::error::{PipelineError, ProviderError};
use trend_assistant::llm::{GenerationRequest, TextGenerator, ThrottledGenerator};
use trend_assistant::pipeline::{Pipeline, RunSource};
use trend_assistant::rate_limit::RateLimiter;
use trend_assistant::research::{FetchError, Html, PageFetcher, ResearchClient, SearchProvider};
use trend_assistant::retry::RetryPolicy;
use trend_assistant::summarize::{BatchSummarizer, NO_RELEVANT_INFORMATION};
use trend_assistant::synthesize::Synthesizer;
use trend_assistant_core::embedding::EmbeddingProvider;
use trend_assistant_core::index::memory::InMemoryVectorIndex;
use trend_assistant_core::models::{CreativeBrief, Season, SourceDocument};
use trend_assistant_core::report::parse_report;

// ─── Fake embedder ──────────────────────────────────────────────────

/// Maps known words onto concept slots; synonyms share a slot.
struct KeywordEmbedder;

const CONCEPTS: &[&[&str]] = &[
    &["fall", "autumn"],
    &["spring"],
    &["summer"],
    &["winter"],
    &["tailoring", "suiting"],
    &["minimalist", "minimal"],
    &["streetwear"],
    &["knitwear"],
    &["2025"],
    &["2026"],
];

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-test"
    }

    fn dims(&self) -> usize {
        CONCEPTS.len()
    }

    async fn embed_texts(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0f32; CONCEPTS.len()];
                for word in text.split(|c: char| !c.is_alphanumeric()) {
                    let word = word.to_lowercase();
                    if let Some(slot) = CONCEPTS.iter().position(|c| c.contains(&word.as_str())) {
                        v[slot] += 1.0;
                    }
                }
                v
            })
            .collect())
    }
}

// ─── Scripted generator ─────────────────────────────────────────────

struct ScriptedGenerator {
    latency: Duration,
    rate_limited_calls: AtomicU32,
    synthesis_replies: Mutex<VecDeque<String>>,
    brief_reply: String,
    summary_calls: AtomicU32,
    synthesis_calls: AtomicU32,
    sent_at: Mutex<Vec<Instant>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedGenerator {
    fn new() -> Self {
        Self {
            latency: Duration::ZERO,
            rate_limited_calls: AtomicU32::new(0),
            synthesis_replies: Mutex::new(VecDeque::new()),
            brief_reply: String::new(),
            summary_calls: AtomicU32::new(0),
            synthesis_calls: AtomicU32::new(0),
            sent_at: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// The first `n` summary requests are answered with a rate-limit error.
    fn with_rate_limited(self, n: u32) -> Self {
        self.rate_limited_calls.store(n, Ordering::SeqCst);
        self
    }

    /// Synthesis replies served in order; a valid report once exhausted.
    fn with_synthesis_replies(self, replies: &[&str]) -> Self {
        *self.synthesis_replies.lock().unwrap() = replies.iter().map(|r| r.to_string()).collect();
        self
    }

    fn with_brief_reply(mut self, reply: &str) -> Self {
        self.brief_reply = reply.to_string();
        self
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        self.sent_at.lock().unwrap().push(Instant::now());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let reply = self.respond(&request.prompt);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        reply
    }
}

impl ScriptedGenerator {
    fn respond(&self, prompt: &str) -> Result<String, ProviderError> {

        if prompt.contains("meticulous research assistant") {
            self.summary_calls.fetch_add(1, Ordering::SeqCst);
            let limited = self
                .rate_limited_calls
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if limited {
                return Err(ProviderError::RateLimited {
                    retry_after: Some(Duration::from_secs(5)),
                });
            }
            if prompt.contains("IRRELEVANT") {
                return Ok(NO_RELEVANT_INFORMATION.to_string());
            }
            if prompt.contains("REJECT") {
                return Err(ProviderError::Rejected {
                    status: 400,
                    message: "blocked by safety filter".to_string(),
                });
            }
            return Ok("- Soft-shoulder blazers\n- Charcoal wool gabardine".to_string());
        }

        if prompt.contains("structured creative brief") {
            return Ok(self.brief_reply.clone());
        }

        self.synthesis_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.synthesis_replies.lock().unwrap().pop_front();
        Ok(scripted.unwrap_or_else(valid_report_json))
    }
}

fn valid_report_json() -> String {
    serde_json::json!({
        "season": "Fall",
        "year": 2025,
        "theme": "Precision Calm",
        "cultural_drivers": ["Return to office dressing", "Investment buying"],
        "influential_models": ["Phoebe Philo"],
        "accessories": {
            "bags": ["Structured leather totes"],
            "footwear": ["Square-toe loafers"],
            "jewelry": [],
            "other": ["Slim belts"]
        },
        "key_garments": [{
            "name": "Soft-shoulder blazer",
            "description": "The anchor of the capsule.",
            "fabrics": [{
                "material": "Wool gabardine",
                "texture": "Fine twill",
                "sustainable": true,
                "sustainability_comment": "Certified responsible wool."
            }],
            "colors": [{"name": "Charcoal", "pantone_code": "18-0601 TCX", "hex_value": "#36454F"}],
            "silhouette": "Relaxed, elongated",
            "details_trims": ["Horn buttons"],
            "suggested_pairings": ["Wide-leg trousers"],
            "inspired_by_designers": ["The Row"]
        }],
        "color_palette": ["Charcoal", "Camel"]
    })
    .to_string()
}

// ─── Fake research collaborators ────────────────────────────────────

/// Returns the same URLs for every query and counts calls.
struct CountingSearch {
    urls: Vec<String>,
    calls: AtomicUsize,
}

impl CountingSearch {
    fn new(urls: &[&str]) -> Self {
        Self {
            urls: urls.iter().map(|u| u.to_string()).collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SearchProvider for CountingSearch {
    async fn search(&self, _query: &str, _num: usize) -> Result<Vec<String>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.urls.clone())
    }
}

/// Serves a long article per known URL; everything else is a 404.
struct ArticleFetcher {
    pages: HashMap<String, String>,
}

impl ArticleFetcher {
    fn new(pages: &[(&str, &str)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(url, marker)| (url.to_string(), marker.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl PageFetcher for ArticleFetcher {
    async fn fetch(&self, url: &str) -> Result<Html, FetchError> {
        let marker = self.pages.get(url).ok_or(FetchError::Status(404))?;
        let body = format!(
            "{} Designers showed sculpted wool coats, fluid trousers and quiet tailoring in muted tones. ",
            marker
        )
        .repeat(5);
        Ok(Html(format!(
            "<html><body><nav>Home Shop</nav><article><p>{}</p></article></body></html>",
            body
        )))
    }
}

// ─── Harness ────────────────────────────────────────────────────────

struct Harness {
    generator: Arc<ScriptedGenerator>,
    search: Arc<CountingSearch>,
    index: Arc<InMemoryVectorIndex>,
    pipeline: Pipeline,
}

fn throttled(generator: Arc<ScriptedGenerator>, capacity: usize, window: Duration) -> ThrottledGenerator {
    throttled_with_ceiling(generator, capacity, window, capacity)
}

fn throttled_with_ceiling(
    generator: Arc<ScriptedGenerator>,
    capacity: usize,
    window: Duration,
    max_in_flight: usize,
) -> ThrottledGenerator {
    ThrottledGenerator::new(
        generator,
        Arc::new(RateLimiter::new(capacity, window)),
        max_in_flight,
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(4),
        },
    )
}

fn harness(generator: ScriptedGenerator, fetcher: ArticleFetcher, on_empty: OnEmpty) -> Harness {
    harness_with_urls(
        generator,
        &[
            "https://news.example/a",
            "https://news.example/b",
            "https://news.example/c",
        ],
        fetcher,
        on_empty,
    )
}

fn harness_with_urls(
    generator: ScriptedGenerator,
    urls: &[&str],
    fetcher: ArticleFetcher,
    on_empty: OnEmpty,
) -> Harness {
    let generator = Arc::new(generator);
    let search = Arc::new(CountingSearch::new(urls));
    let index = Arc::new(InMemoryVectorIndex::new());

    let throttled = throttled(generator.clone(), 5, Duration::from_secs(61));
    let research = ResearchClient::new(search.clone(), Arc::new(fetcher), ResearchConfig::default());
    let summarizer = BatchSummarizer::new(throttled.clone(), 5, 0.3);
    let synthesizer = Synthesizer::new(
        throttled,
        &SynthesisConfig {
            on_empty,
            ..SynthesisConfig::default()
        },
    );
    let cache = SemanticCache::new(Arc::new(KeywordEmbedder), index.clone(), 0.85);
    let pipeline = Pipeline::new(research, summarizer, synthesizer).with_cache(cache);

    Harness {
        generator,
        search,
        index,
        pipeline,
    }
}

fn all_pages() -> ArticleFetcher {
    ArticleFetcher::new(&[
        ("https://news.example/a", "Runway"),
        ("https://news.example/b", "Street"),
        ("https://news.example/c", "Materials"),
    ])
}

fn fall_brief() -> CreativeBrief {
    CreativeBrief::new(Season::Fall, 2025, "minimalist tailoring").unwrap()
}

fn documents(markers: &[&str]) -> Vec<SourceDocument> {
    markers
        .iter()
        .enumerate()
        .map(|(i, marker)| SourceDocument {
            url: format!("https://doc.example/{}", i),
            raw_text: format!("{} Oversized coats and tailored trousers dominate.", marker),
            fetched_at: Utc::now(),
        })
        .collect()
}

// ─── Cache behavior ─────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn paraphrased_brief_is_served_from_cache_without_research() {
    let h = harness(ScriptedGenerator::new(), all_pages(), OnEmpty::Fail);
    let cancel = CancellationToken::new();

    let first = h.pipeline.run(&fall_brief(), &cancel).await.unwrap();
    match &first.source {
        RunSource::Fresh {
            documents, stored, ..
        } => {
            assert_eq!(*documents, 3);
            assert!(stored);
        }
        other => panic!("expected a fresh run, got {:?}", other),
    }
    assert_eq!(h.index.len(), 1);
    let searches_after_first = h.search.calls.load(Ordering::SeqCst);
    let generations_after_first = h.generator.sent_at.lock().unwrap().len();
    assert!(searches_after_first > 0);

    let paraphrase = CreativeBrief::new(Season::Fall, 2025, "Minimal suiting").unwrap();
    let second = h.pipeline.run(&paraphrase, &cancel).await.unwrap();
    match second.source {
        RunSource::Cached { similarity } => assert!(similarity >= 0.85, "similarity {}", similarity),
        other => panic!("expected a cache hit, got {:?}", other),
    }
    assert_eq!(second.report, first.report);
    assert_eq!(second.prompts, first.prompts);
    assert_eq!(h.search.calls.load(Ordering::SeqCst), searches_after_first);
    assert_eq!(h.generator.sent_at.lock().unwrap().len(), generations_after_first);
    assert_eq!(h.index.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn fall_run_with_one_failed_summary_then_autumn_hit_from_cache() {
    let latency = Duration::from_secs(2);
    let urls = [
        "https://news.example/runway",
        "https://news.example/street",
        "https://news.example/materials",
        "https://news.example/retail",
        "https://news.example/blocked",
    ];
    let fetcher = ArticleFetcher::new(&[
        (urls[0], "Runway"),
        (urls[1], "Street"),
        (urls[2], "Materials"),
        (urls[3], "Retail"),
        (urls[4], "REJECT"),
    ]);
    let h = harness_with_urls(
        ScriptedGenerator::new().with_latency(latency),
        &urls,
        fetcher,
        OnEmpty::Fail,
    );
    let cancel = CancellationToken::new();

    let started = Instant::now();
    let first = h.pipeline.run(&fall_brief(), &cancel).await.unwrap();
    let first_elapsed = started.elapsed();

    match &first.source {
        RunSource::Fresh {
            documents,
            summaries_succeeded,
            summaries_failed,
            stored,
            ..
        } => {
            assert_eq!(*documents, 5);
            assert_eq!(*summaries_succeeded, 4);
            assert_eq!(*summaries_failed, 1);
            assert!(stored);
        }
        other => panic!("expected a fresh run, got {:?}", other),
    }
    assert!(!first.report.cultural_drivers.is_empty());
    assert!(!first.report.key_garments.is_empty());
    assert!(first_elapsed >= latency * 2, "first run took {:?}", first_elapsed);
    let searches_after_first = h.search.calls.load(Ordering::SeqCst);
    let generations_after_first = h.generator.sent_at.lock().unwrap().len();

    let autumn = CreativeBrief::new("Autumn".parse().unwrap(), 2025, "minimalist suiting").unwrap();
    let started = Instant::now();
    let second = h.pipeline.run(&autumn, &cancel).await.unwrap();
    let second_elapsed = started.elapsed();

    assert!(second.is_cached(), "got {:?}", second.source);
    assert_eq!(second.report, first.report);
    assert_eq!(h.search.calls.load(Ordering::SeqCst), searches_after_first);
    assert_eq!(h.generator.sent_at.lock().unwrap().len(), generations_after_first);
    assert!(second_elapsed < latency, "cache hit took {:?}", second_elapsed);
    assert!(
        second_elapsed * 10 < first_elapsed,
        "cache hit {:?} vs fresh run {:?}",
        second_elapsed,
        first_elapsed
    );
}

#[tokio::test(start_paused = true)]
async fn autumn_parses_to_the_same_season_as_fall() {
    let h = harness(ScriptedGenerator::new(), all_pages(), OnEmpty::Fail);
    let cancel = CancellationToken::new();
    h.pipeline.run(&fall_brief(), &cancel).await.unwrap();

    let autumn: Season = "Autumn".parse().unwrap();
    let brief = CreativeBrief::new(autumn, 2025, "minimalist tailoring").unwrap();
    let outcome = h.pipeline.run(&brief, &cancel).await.unwrap();
    assert!(outcome.is_cached());
}

#[tokio::test(start_paused = true)]
async fn unrelated_brief_misses_the_cache() {
    let h = harness(ScriptedGenerator::new(), all_pages(), OnEmpty::Fail);
    let cancel = CancellationToken::new();
    h.pipeline.run(&fall_brief(), &cancel).await.unwrap();
    let searches = h.search.calls.load(Ordering::SeqCst);

    let control = CreativeBrief::new(Season::Spring, 2026, "neon streetwear").unwrap();
    let outcome = h.pipeline.run(&control, &cancel).await.unwrap();
    assert!(!outcome.is_cached());
    assert!(h.search.calls.load(Ordering::SeqCst) > searches);
    assert_eq!(h.index.len(), 2);
}

#[tokio::test]
async fn store_then_lookup_is_idempotent() {
    let index = Arc::new(InMemoryVectorIndex::new());
    let cache = SemanticCache::new(Arc::new(KeywordEmbedder), index.clone(), 0.85);
    let report = parse_report(&valid_report_json()).unwrap();
    let brief = fall_brief();

    assert!(cache.store(&brief, &report).await);
    let first = cache.lookup(&brief).await.expect("hit");
    let second = cache.lookup(&brief).await.expect("hit");

    assert_eq!(first.report, report);
    assert_eq!(second.report, report);
    assert_eq!(first.entry_id, second.entry_id);
    assert!((first.similarity - 1.0).abs() < 1e-5);
    assert_eq!(index.len(), 1);

    let stats = cache.stats().await.unwrap();
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.models[0].model, "keyword-test");
}

#[tokio::test]
async fn invalid_and_low_confidence_reports_are_never_stored() {
    let index = Arc::new(InMemoryVectorIndex::new());
    let cache = SemanticCache::new(Arc::new(KeywordEmbedder), index.clone(), 0.85);

    let mut low = parse_report(&valid_report_json()).unwrap();
    low.low_confidence = true;
    assert!(!cache.store(&fall_brief(), &low).await);

    let mut invalid = parse_report(&valid_report_json()).unwrap();
    invalid.key_garments.clear();
    assert!(!cache.store(&fall_brief(), &invalid).await);

    assert!(index.is_empty());
    assert!(cache.lookup(&fall_brief()).await.is_none());
}

// ─── Summarizer properties ──────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn summarizer_never_exceeds_the_rate_window() {
    const CAPACITY: usize = 3;
    let window = Duration::from_secs(60);
    let generator = Arc::new(
        ScriptedGenerator::new()
            .with_latency(Duration::from_secs(2))
            .with_rate_limited(2),
    );
    let summarizer = BatchSummarizer::new(throttled(generator.clone(), CAPACITY, window), CAPACITY, 0.3);
    let docs = documents(&["a"; 10]);

    let summaries = summarizer
        .summarize_all(&docs, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summaries.len(), 10);
    assert!(summaries.iter().all(|s| s.succeeded));
    for (summary, doc) in summaries.iter().zip(&docs) {
        assert_eq!(summary.source_url, doc.url);
    }

    let mut sent = generator.sent_at.lock().unwrap().clone();
    sent.sort();
    assert_eq!(sent.len(), 12, "10 documents plus 2 rate-limited retries");
    for i in 0..sent.len() - CAPACITY {
        assert!(
            sent[i + CAPACITY] - sent[i] >= window,
            "requests {} and {} were {:?} apart",
            i,
            i + CAPACITY,
            sent[i + CAPACITY] - sent[i]
        );
    }
}

#[tokio::test(start_paused = true)]
async fn in_flight_requests_stay_under_the_ceiling() {
    const MAX_IN_FLIGHT: usize = 2;
    let latency = Duration::from_secs(2);
    let generator = Arc::new(ScriptedGenerator::new().with_latency(latency));
    let summarizer = BatchSummarizer::new(
        throttled_with_ceiling(generator.clone(), 10, Duration::from_secs(60), MAX_IN_FLIGHT),
        10,
        0.3,
    );
    let docs = documents(&["a"; 10]);

    let started = Instant::now();
    let summaries = summarizer
        .summarize_all(&docs, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summaries.len(), 10);
    assert!(summaries.iter().all(|s| s.succeeded));
    assert_eq!(generator.peak_in_flight.load(Ordering::SeqCst), MAX_IN_FLIGHT);
    assert!(started.elapsed() >= latency * 5, "took {:?}", started.elapsed());

    let mut sent = generator.sent_at.lock().unwrap().clone();
    sent.sort();
    for i in 0..sent.len() - MAX_IN_FLIGHT {
        assert!(sent[i + MAX_IN_FLIGHT] - sent[i] >= latency);
    }
}

#[tokio::test(start_paused = true)]
async fn permanent_failures_are_counted_not_raised() {
    let generator = Arc::new(ScriptedGenerator::new());
    let summarizer = BatchSummarizer::new(
        throttled(generator.clone(), 5, Duration::from_secs(61)),
        5,
        0.3,
    );
    let docs = documents(&["ok", "REJECT", "ok", "IRRELEVANT", "ok", "REJECT", "ok"]);

    let summaries = summarizer
        .summarize_all(&docs, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summaries.len(), docs.len());
    let failed: Vec<usize> = summaries
        .iter()
        .enumerate()
        .filter(|(_, s)| !s.succeeded)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(failed, vec![1, 3, 5]);
    assert_eq!(summaries[1].attempts, 1, "rejections are not retried");
    assert_eq!(
        summaries[3].error_reason.as_deref(),
        Some("no relevant information")
    );
}

#[tokio::test]
async fn empty_documents_fail_without_a_request() {
    let generator = Arc::new(ScriptedGenerator::new());
    let summarizer = BatchSummarizer::new(
        throttled(generator.clone(), 5, Duration::from_secs(61)),
        5,
        0.3,
    );
    let mut docs = documents(&["ok"]);
    docs[0].raw_text = "   ".to_string();

    let summaries = summarizer
        .summarize_all(&docs, &CancellationToken::new())
        .await
        .unwrap();
    assert!(!summaries[0].succeeded);
    assert_eq!(summaries[0].attempts, 0);
    assert_eq!(generator.summary_calls.load(Ordering::SeqCst), 0);
}

// ─── Synthesis ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn malformed_then_valid_synthesis_retries_once() {
    let generator = ScriptedGenerator::new().with_synthesis_replies(&["Here is your report: {"]);
    let h = harness(generator, all_pages(), OnEmpty::Fail);

    let outcome = h
        .pipeline
        .run(&fall_brief(), &CancellationToken::new())
        .await
        .unwrap();

    match outcome.source {
        RunSource::Fresh {
            validation_retries, ..
        } => assert_eq!(validation_retries, 1),
        other => panic!("expected a fresh run, got {:?}", other),
    }
    assert_eq!(h.generator.synthesis_calls.load(Ordering::SeqCst), 2);
    assert_eq!(outcome.report.theme, "Precision Calm");
    assert_eq!(outcome.prompts.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn terminal_validation_failure_keeps_the_last_response() {
    let invalid = r#"{"theme": "Precision Calm", "cultural_drivers": []}"#;
    let generator = ScriptedGenerator::new().with_synthesis_replies(&[invalid, invalid, invalid]);
    let h = harness(generator, all_pages(), OnEmpty::Fail);

    let err = h
        .pipeline
        .run(&fall_brief(), &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        PipelineError::Validation {
            attempts,
            raw_response,
            ..
        } => {
            assert_eq!(attempts, 3);
            assert_eq!(raw_response, invalid);
        }
        other => panic!("expected a validation error, got {:?}", other),
    }
    assert!(h.index.is_empty());
}

#[tokio::test(start_paused = true)]
async fn no_usable_research_fails_by_default() {
    let h = harness(ScriptedGenerator::new(), ArticleFetcher::new(&[]), OnEmpty::Fail);

    let err = h
        .pipeline
        .run(&fall_brief(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Exhausted(_)), "got {:?}", err);
    assert_eq!(h.generator.synthesis_calls.load(Ordering::SeqCst), 0);
    assert!(h.index.is_empty());
}

#[tokio::test(start_paused = true)]
async fn no_usable_research_can_yield_an_uncached_low_confidence_report() {
    let h = harness(
        ScriptedGenerator::new(),
        ArticleFetcher::new(&[]),
        OnEmpty::LowConfidence,
    );

    let outcome = h
        .pipeline
        .run(&fall_brief(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.report.low_confidence);
    match outcome.source {
        RunSource::Fresh {
            documents, stored, ..
        } => {
            assert_eq!(documents, 0);
            assert!(!stored);
        }
        other => panic!("expected a fresh run, got {:?}", other),
    }
    assert!(h.index.is_empty());
}

// ─── Cancellation ───────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn cancellation_mid_batch_leaves_no_cache_entry() {
    let generator = ScriptedGenerator::new().with_latency(Duration::from_secs(30));
    let h = harness(generator, all_pages(), OnEmpty::Fail);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        trigger.cancel();
    });

    let err = h.pipeline.run(&fall_brief(), &cancel).await.unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled), "got {:?}", err);
    assert!(h.generator.summary_calls.load(Ordering::SeqCst) == 0);
    assert!(h.index.is_empty());
}

#[tokio::test]
async fn cancelled_token_stops_before_research() {
    let h = harness(ScriptedGenerator::new(), all_pages(), OnEmpty::Fail);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = h.pipeline.run(&fall_brief(), &cancel).await.unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled));
    assert_eq!(h.search.calls.load(Ordering::SeqCst), 0);
}

// ─── Brief deconstruction ───────────────────────────────────────────

#[tokio::test]
async fn passage_is_deconstructed_into_a_brief() {
    let generator = Arc::new(ScriptedGenerator::new().with_brief_reply(
        "```json\n{\"season\": \"autumn\", \"year\": 2025, \"theme_hint\": \"Minimal suiting\", \
         \"target_audience\": \"young professionals\", \"region\": null}\n```",
    ));
    let throttled = throttled(generator, 5, Duration::from_secs(61));

    let brief = deconstruct(
        &throttled,
        "Sharp but relaxed suiting for young professionals this coming autumn",
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(brief.season(), Season::Fall);
    assert_eq!(brief.year(), 2025);
    assert_eq!(brief.theme_hint(), "Minimal suiting");
    assert_eq!(brief.target_audience(), Some("young professionals"));
    assert_eq!(brief.region(), None);
}

#[tokio::test(start_paused = true)]
async fn deconstruction_stops_when_the_run_times_out() {
    let generator = Arc::new(
        ScriptedGenerator::new()
            .with_latency(Duration::from_secs(30))
            .with_brief_reply(r#"{"season": "fall", "year": 2025, "theme_hint": "tailoring"}"#),
    );
    let throttled = throttled(generator.clone(), 5, Duration::from_secs(61));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = deconstruct(&throttled, "Quiet tailoring for autumn", &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled), "got {:?}", err);
    assert!(started.elapsed() < Duration::from_secs(30));
    assert_eq!(generator.sent_at.lock().unwrap().len(), 1);

    let err = deconstruct(&throttled, "Quiet tailoring for autumn", &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled));
    assert_eq!(generator.sent_at.lock().unwrap().len(), 1);
}
