//! # Trend Assistant Core
//!
//! Shared, I/O-free logic for Trend Assistant: the creative brief and
//! trend report models, report schema validation, the embedding trait and
//! vector utilities, the vector index abstraction, and the deterministic
//! image-prompt generator.
//!
//! This crate contains no tokio, sqlx, reqwest, or filesystem I/O. Network
//! and storage backends live in the `trend-assistant` app crate.

pub mod embedding;
pub mod index;
pub mod models;
pub mod prompts;
pub mod report;
