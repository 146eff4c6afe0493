//! Embedding provider implementations and the embedding cache.
//!
//! The [`EmbeddingProvider`] trait lives in `resume-harness-core`; this
//! module supplies the concrete providers:
//!
//! | Config value | Provider |
//! |--------------|----------|
//! | `"openai"` | [`OpenAiEmbeddings`] — OpenAI-compatible `/v1/embeddings` |
//! | `"local"` | [`LocalEmbeddings`] — deterministic hash-based vectors |
//!
//! [`CachedEmbeddings`] wraps any provider with a TTL cache keyed by a
//! whitespace-normalized hash of the input text, so re-embedding the same
//! chunk on a job replay never re-contacts the provider. Provider errors
//! propagate to the caller and are never cached; the job queue owns retry
//! decisions, so the providers themselves do not retry.

use anyhow::{bail, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

use resume_harness_core::embedding::EmbeddingProvider;
use resume_harness_core::error::PipelineError;

use crate::cache::TtlCache;
use crate::config::{CacheConfig, EmbeddingConfig};

/// Embedding provider backed by an OpenAI-compatible HTTP endpoint.
///
/// Requires the `OPENAI_API_KEY` environment variable. Newlines are
/// collapsed to spaces before the call; the API treats them as token
/// boundaries that measurably degrade embedding quality.
pub struct OpenAiEmbeddings {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dims: usize,
}

impl OpenAiEmbeddings {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = match std::env::var("OPENAI_API_KEY") {
            Ok(key) if !key.is_empty() => key,
            _ => bail!("OPENAI_API_KEY environment variable not set"),
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            dims: config.dims,
        })
    }

    async fn request(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": inputs,
        });

        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::EmbeddingProvider(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(PipelineError::EmbeddingProvider(format!(
                "openai {status}: {body_text}"
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PipelineError::EmbeddingProvider(e.to_string()))?;
        let vectors = parse_embeddings_response(&json)?;
        if vectors.len() != inputs.len() {
            return Err(PipelineError::EmbeddingProvider(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        let input = text.replace('\n', " ");
        let mut vectors = self.request(&[input]).await?;
        vectors
            .pop()
            .ok_or_else(|| PipelineError::EmbeddingProvider("empty response".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let inputs: Vec<String> = texts.iter().map(|t| t.replace('\n', " ")).collect();
        self.request(&inputs).await
    }
}

/// Extract `data[].embedding` arrays in response order.
fn parse_embeddings_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, PipelineError> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| {
            PipelineError::EmbeddingProvider("invalid response: missing data array".to_string())
        })?;

    let mut vectors = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| {
                PipelineError::EmbeddingProvider("invalid response: missing embedding".to_string())
            })?;
        vectors.push(
            embedding
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect(),
        );
    }
    Ok(vectors)
}

/// Deterministic offline provider: hashed bag-of-words, L2-normalized.
///
/// Not a semantic embedding, but identical texts map to identical vectors
/// and word overlap produces cosine overlap, which is what the tests and
/// offline development need.
pub struct LocalEmbeddings {
    dims: usize,
}

impl LocalEmbeddings {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbeddings {
    fn model_name(&self) -> &str {
        "local-hash"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        let mut vector = vec![0.0f32; self.dims];
        for word in text.to_lowercase().split_whitespace() {
            let digest = Sha256::digest(word.as_bytes());
            let mut index_bytes = [0u8; 8];
            index_bytes.copy_from_slice(&digest[..8]);
            let index = (u64::from_le_bytes(index_bytes) % self.dims as u64) as usize;
            vector[index] += 1.0;
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}

/// TTL cache wrapper around any [`EmbeddingProvider`].
///
/// Lookups coalesce: concurrent misses for the same key run the provider
/// call once and share the result.
pub struct CachedEmbeddings {
    inner: Arc<dyn EmbeddingProvider>,
    cache: TtlCache<Vec<f32>>,
}

impl CachedEmbeddings {
    pub fn new(inner: Arc<dyn EmbeddingProvider>, cache_config: &CacheConfig) -> Self {
        let cache = TtlCache::new(
            cache_config.capacity,
            Duration::from_secs(cache_config.embedding_ttl_secs),
        );
        Self { inner, cache }
    }

    /// Cache key: SHA-256 of the whitespace-normalized text. Whitespace
    /// variants of the same content share an entry.
    fn cache_key(text: &str) -> String {
        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
        hex::encode(Sha256::digest(normalized.as_bytes()))
    }
}

#[async_trait]
impl EmbeddingProvider for CachedEmbeddings {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dims(&self) -> usize {
        self.inner.dims()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        let inner = Arc::clone(&self.inner);
        let owned = text.to_string();
        self.cache
            .get_or_compute(Self::cache_key(text), async move {
                inner.embed(&owned).await
            })
            .await
    }
}

/// Instantiate the configured provider, wrapped in the embedding cache.
pub fn create_provider(
    config: &EmbeddingConfig,
    cache_config: &CacheConfig,
) -> Result<Arc<dyn EmbeddingProvider>> {
    let inner: Arc<dyn EmbeddingProvider> = match config.provider.as_str() {
        "openai" => Arc::new(OpenAiEmbeddings::new(config)?),
        "local" => Arc::new(LocalEmbeddings::new(config.dims)),
        other => bail!("unknown embedding provider: {other}"),
    };
    Ok(Arc::new(CachedEmbeddings::new(inner, cache_config)))
}
