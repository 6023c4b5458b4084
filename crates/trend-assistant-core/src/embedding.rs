//! Brief embeddings: the provider trait and the vector math the semantic
//! cache runs on.
//!
//! Concrete providers (Gemini, OpenAI, Ollama) live in the
//! `trend-assistant` app crate; this module only knows vectors.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

/// A service that turns brief text into fixed-length vectors.
///
/// Shared with the semantic cache behind an `Arc`.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier stored next to every cache entry, e.g. `"gemini-embedding-001"`.
    fn model_name(&self) -> &str;
    /// Vector length, or `0` when the provider decides at runtime.
    fn dims(&self) -> usize;
    /// One vector per input, in input order.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed one text and check the vector length against `dims()`.
pub async fn embed_one(provider: &dyn EmbeddingProvider, text: &str) -> Result<Vec<f32>> {
    let vector = provider
        .embed_texts(&[text.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("{} returned no embedding", provider.model_name()))?;

    let expected = provider.dims();
    if expected != 0 && vector.len() != expected {
        bail!(
            "{} returned a {}-dimensional embedding, expected {}",
            provider.model_name(),
            vector.len(),
            expected
        );
    }
    Ok(vector)
}

/// Little-endian `f32` bytes, 4 per component, for the SQLite BLOB column.
///
/// ```rust
/// use trend_assistant_core::embedding::{blob_to_vec, vec_to_blob};
///
/// let v = vec![0.25f32, -1.0, 8.5];
/// assert_eq!(vec_to_blob(&v).len(), 12);
/// assert_eq!(blob_to_vec(&vec_to_blob(&v)), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Inverse of [`vec_to_blob`]. Trailing bytes that do not fill an `f32` are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`.
///
/// `0.0` when the lengths differ, a vector is empty or either norm is zero,
/// so incomparable vectors can never clear a cache threshold.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(dot, na, nb), (x, y)| {
            (dot + x * y, na + x * x, nb + y * y)
        });
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}
