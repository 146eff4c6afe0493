//! Embedding provider trait and vector helpers.
//!
//! Defines the [`EmbeddingProvider`] seam the application crate implements
//! (OpenAI-compatible HTTP, deterministic local provider for tests), plus
//! pure helpers for similarity computation and canonical vector encoding.

use async_trait::async_trait;

use crate::error::PipelineError;

/// Maps text to a fixed-length numeric vector.
///
/// Implementations do not retry internally; callers decide retry policy.
/// The batch variant defaults to independent sequential calls, which lets
/// per-text caching work unchanged; providers may override it to batch at
/// their API boundary.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-ada-002"`).
    fn model_name(&self) -> &str;
    /// Vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;

    /// Embed one text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError>;

    /// Embed a sequence of texts by independent calls.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// Encode a vector as little-endian `f32` bytes.
///
/// Canonical byte form used when a vector participates in a cache key.
pub fn vector_bytes(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Compute cosine similarity between two vectors.
///
/// Returns a value in `[-1.0, 1.0]`; `0.0` for empty or length-mismatched
/// inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_empty_and_mismatched() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_vector_bytes_deterministic() {
        let v = vec![1.0f32, -2.5, 3.125];
        assert_eq!(vector_bytes(&v), vector_bytes(&v));
        assert_eq!(vector_bytes(&v).len(), 12);
        assert_ne!(vector_bytes(&v), vector_bytes(&[1.0f32, -2.5, 3.126]));
    }
}
