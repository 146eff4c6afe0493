//! Vector index abstraction.
//!
//! A [`VectorIndex`] holds embedding vectors with JSON payloads and answers
//! filtered nearest-neighbor queries. Implementations:
//!
//! | Implementation | Backing | Notes |
//! |----------------|---------|-------|
//! | [`memory::InMemoryIndex`] | `HashMap` behind `RwLock` | brute-force cosine scan, used in tests |
//! | `QdrantIndex` (application crate) | Qdrant collection | production backend |
//!
//! Vector ids are deterministic (`{document_id}-chunk-{index}`), so
//! re-upserting a reprocessed document overwrites its old points in place.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PipelineError;
use crate::filter::FilterExpr;

/// A vector plus the payload stored alongside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedVector {
    /// Stable point id, `{document_id}-chunk-{index}`.
    pub id: String,
    /// Owning document id.
    pub document_id: String,
    /// Embedding vector.
    pub vector: Vec<f32>,
    /// Filterable payload (chunk text, derived metadata, date).
    pub payload: Value,
}

/// One query hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryMatch {
    /// Point id of the hit.
    pub id: String,
    /// Owning document id.
    pub document_id: String,
    /// Similarity score, higher is closer.
    pub score: f32,
    /// Payload stored with the point.
    pub payload: Value,
}

/// Async interface over a vector store.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or overwrite vectors by id.
    async fn upsert(&self, vectors: Vec<IndexedVector>) -> Result<(), PipelineError>;

    /// Return the `top_k` nearest vectors to `vector`, restricted to points
    /// whose payload satisfies `filter` when one is given. Results are
    /// ordered by non-increasing score.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&FilterExpr>,
    ) -> Result<Vec<QueryMatch>, PipelineError>;

    /// Remove points by id. Unknown ids are ignored.
    async fn delete(&self, ids: &[String]) -> Result<(), PipelineError>;
}
