//! # Trend Assistant
//!
//! A fashion trend research assistant. Given a creative brief (season,
//! year, theme, optional audience and region) it researches the web,
//! summarizes what it finds under a provider rate limit, synthesizes a
//! structured trend report and derives image-generation prompts from it.
//! Reports are kept in a semantic cache so that a paraphrased brief
//! ("Autumn" for "Fall") is answered without repeating the research.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐   ┌──────────────┐   ┌──────────┐   ┌────────────┐
//! │  Brief  │──▶│ Semantic     │──▶│ Research │──▶│ Summarizer │
//! │ (CLI)   │   │ cache (SQLite│   │ search + │   │ rate-      │
//! └─────────┘   │ + embeddings)│   │ extract  │   │ limited    │
//!               └──────┬───────┘   └──────────┘   └─────┬──────┘
//!                      │ hit                            ▼
//!                      │                         ┌────────────┐
//!                      └────────────────────────▶│ Synthesizer│──▶ report + prompts
//!                                                └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! trend init
//! trend run --season fall --year 2025 --theme "minimalist tailoring"
//! trend run --passage "Relaxed resort wear for Gen Z in the Mediterranean, summer 2026"
//! trend cache stats
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`error`] | Provider, pipeline and cache error taxonomy |
//! | [`retry`] | Exponential backoff policy |
//! | [`rate_limit`] | Sliding-window rate limiter with injectable clock |
//! | [`llm`] | Text generation provider and throttled wrapper |
//! | [`embedding`] | Embedding providers |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_index`] | SQLite vector index |
//! | [`cache`] | Semantic cache |
//! | [`extract`] | Article text extraction from HTML |
//! | [`research`] | Query generation, search and page fetching |
//! | [`summarize`] | Batch summarizer |
//! | [`synthesize`] | Report synthesis with validation retries |
//! | [`brief`] | Natural-language brief deconstruction |
//! | [`pipeline`] | End-to-end orchestration |
//! | [`output`] | Result files |

pub mod brief;
pub mod cache;
pub mod cache_cmd;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod llm;
pub mod migrate;
pub mod output;
pub mod pipeline;
pub mod rate_limit;
pub mod research;
pub mod retry;
pub mod run_cmd;
pub mod sqlite_index;
pub mod summarize;
pub mod synthesize;

pub use trend_assistant_core::{index, models, prompts, report};
