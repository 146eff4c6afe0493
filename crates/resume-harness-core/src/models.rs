//! Data models shared across the ingestion and query pipelines.
//!
//! The [`Document`] is the system of record: the ingestion pipeline owns it
//! while a job is running and mutates it only at durable checkpoints; the
//! application layer reads and deletes it afterward. Everything else here is
//! either a value carried along the pipeline ([`Chunk`], [`ResumeMetadata`])
//! or a query-path shape ([`SearchResult`], [`RagAnswer`]).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Processing stage of a document, persisted at every durable checkpoint.
///
/// Transitions are strictly sequential:
/// `Queued → Extracting → Redacting → Chunking → EmbeddingAndIndexing`
/// and then either `Indexed` or `Failed`. A retried job restarts from
/// `Extracting`; replay is safe because every step is deterministic or
/// idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStage {
    Queued,
    Extracting,
    Redacting,
    Chunking,
    EmbeddingAndIndexing,
    Indexed,
    Failed,
}

impl ProcessingStage {
    /// Stable string form used in the database and CLI output.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStage::Queued => "queued",
            ProcessingStage::Extracting => "extracting",
            ProcessingStage::Redacting => "redacting",
            ProcessingStage::Chunking => "chunking",
            ProcessingStage::EmbeddingAndIndexing => "embedding_and_indexing",
            ProcessingStage::Indexed => "indexed",
            ProcessingStage::Failed => "failed",
        }
    }

    /// Parse the stable string form; unknown values map to `Queued`.
    pub fn parse(s: &str) -> Self {
        match s {
            "extracting" => ProcessingStage::Extracting,
            "redacting" => ProcessingStage::Redacting,
            "chunking" => ProcessingStage::Chunking,
            "embedding_and_indexing" => ProcessingStage::EmbeddingAndIndexing,
            "indexed" => ProcessingStage::Indexed,
            "failed" => ProcessingStage::Failed,
            _ => ProcessingStage::Queued,
        }
    }

    /// Terminal stages: no job will move the document further.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessingStage::Indexed | ProcessingStage::Failed)
    }
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One education entry derived from resume text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EducationEntry {
    /// Degree keyword as it appeared (e.g. `"Bachelor"`, `"B.Tech"`).
    pub degree: String,
    /// Institution name, `"Unknown"` when not derivable.
    pub institution: String,
    /// Graduation year when one was found near the degree mention.
    pub year: Option<i32>,
}

/// Structured metadata extracted from a resume.
///
/// Contact fields come from the PII pass (captured before redaction);
/// skills, education, and experience come from the heuristic pass over the
/// raw text. All fields are best-effort and may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResumeMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Total years of professional experience, summed from explicit
    /// `N years` mentions in the experience section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_years: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub education: Vec<EducationEntry>,
}

/// A bounded substring of cleaned document text, the unit of embedding
/// and retrieval. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position within the document's chunk sequence, starting at 0.
    pub chunk_index: usize,
    /// Chunk text, including any leading overlap carried from the
    /// previous chunk.
    pub text: String,
    /// Byte length of the leading span of `text` that repeats trailing
    /// context from the previous chunk. 0 for the first chunk.
    pub overlap: usize,
    /// SHA-256 hex of `text`, used to detect stale embeddings on replay.
    pub hash: String,
}

/// A resume document and its full processing state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Document UUID.
    pub id: String,
    /// Owner identifier; all retrieval is filterable by owner.
    pub owner_id: String,
    /// Filename as uploaded, drives extraction format selection.
    pub original_file_name: String,
    /// Declared media type of the uploaded file.
    pub content_type: String,
    /// Uploaded size in bytes.
    pub file_size: i64,
    /// Durable storage key, set once the original bytes are uploaded.
    pub file_key: Option<String>,
    /// Raw extracted text (pre-redaction). Unset until extraction runs.
    pub raw_text: Option<String>,
    /// Redacted text variant; the chunker and index only ever see this.
    pub redacted_text: Option<String>,
    /// Ordered chunk sequence, populated at the chunking checkpoint.
    pub chunks: Vec<Chunk>,
    /// Extracted metadata (contact fields, skills, education, experience).
    pub metadata: ResumeMetadata,
    /// Vector-index identifiers, one per chunk, populated on success.
    pub vector_ids: Vec<String>,
    /// Current processing stage.
    pub stage: ProcessingStage,
    /// True once a job reached a terminal outcome for this document.
    ///
    /// Invariant: `processed` implies either `error` is set or every
    /// chunk has a corresponding entry in `vector_ids`.
    pub processed: bool,
    /// Failure message from the most recent failed attempt, if any.
    pub error: Option<String>,
    /// Unix timestamp of row creation.
    pub created_at: i64,
    /// Unix timestamp of the last durable write.
    pub updated_at: i64,
}

impl Document {
    /// Create a queued document with a fresh UUID and empty pipeline state.
    pub fn new(
        owner_id: &str,
        original_file_name: &str,
        content_type: &str,
        file_size: i64,
        now: i64,
    ) -> Self {
        Document {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            original_file_name: original_file_name.to_string(),
            content_type: content_type.to_string(),
            file_size,
            file_key: None,
            raw_text: None,
            redacted_text: None,
            chunks: Vec::new(),
            metadata: ResumeMetadata::default(),
            vector_ids: Vec::new(),
            stage: ProcessingStage::Queued,
            processed: false,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Structured search filters supplied by callers.
///
/// Translated to a [`FilterExpr`](crate::filter::FilterExpr) before being
/// handed to the vector index: skills are an all-of membership constraint,
/// experience bounds are inclusive, location and education values are
/// case-normalized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_max: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub education: Vec<String>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
            && self.experience_min.is_none()
            && self.experience_max.is_none()
            && self.location.is_none()
            && self.education.is_empty()
    }

    /// Canonical JSON form, used in cache keys. Field order is the struct
    /// declaration order, so the same filters always serialize identically.
    pub fn cache_key_part(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// One passage-level match within a [`SearchResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassageMatch {
    pub text: String,
    pub score: f32,
}

/// A ranked retrieval hit: one indexed chunk and its similarity score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Vector-index identifier of the matched chunk.
    pub id: String,
    /// Owning document UUID.
    pub document_id: String,
    /// Matched passage text.
    pub text: String,
    /// Similarity score in `[0, 1]`.
    pub score: f32,
    /// Payload metadata stored alongside the vector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Per-passage match breakdown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matches: Option<Vec<PassageMatch>>,
}

/// A passage flowing through the context optimizer.
///
/// Same shape as [`SearchResult`] minus retrieval bookkeeping; the
/// optimizer is the only component allowed to mutate (truncate) it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextResult {
    pub text: String,
    pub document_id: String,
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl From<SearchResult> for ContextResult {
    fn from(r: SearchResult) -> Self {
        ContextResult {
            text: r.text,
            document_id: r.document_id,
            score: r.score,
            metadata: r.metadata,
        }
    }
}

/// A citation backing a generated answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    /// Passage text, truncated to 200 characters with an ellipsis.
    pub text: String,
    /// Owning document UUID.
    pub document_id: String,
    /// Optimizer score of the cited passage.
    pub score: f32,
}

/// The final answer to a query: generated text, citations, and a
/// confidence estimate in `[0, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagAnswer {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub confidence: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_roundtrip() {
        for stage in [
            ProcessingStage::Queued,
            ProcessingStage::Extracting,
            ProcessingStage::Redacting,
            ProcessingStage::Chunking,
            ProcessingStage::EmbeddingAndIndexing,
            ProcessingStage::Indexed,
            ProcessingStage::Failed,
        ] {
            assert_eq!(ProcessingStage::parse(stage.as_str()), stage);
        }
    }

    #[test]
    fn test_stage_parse_unknown_defaults_to_queued() {
        assert_eq!(ProcessingStage::parse("garbage"), ProcessingStage::Queued);
    }

    #[test]
    fn test_filters_cache_key_stable() {
        let f = SearchFilters {
            skills: vec!["rust".into(), "sql".into()],
            experience_min: Some(2),
            ..Default::default()
        };
        assert_eq!(f.cache_key_part(), f.clone().cache_key_part());
        assert!(f.cache_key_part().contains("rust"));
    }

    #[test]
    fn test_filters_empty() {
        assert!(SearchFilters::default().is_empty());
        let f = SearchFilters {
            location: Some("berlin".into()),
            ..Default::default()
        };
        assert!(!f.is_empty());
    }

    #[test]
    fn test_new_document_starts_queued() {
        let doc = Document::new("owner-1", "cv.pdf", "application/pdf", 1024, 1_700_000_000);
        assert_eq!(doc.stage, ProcessingStage::Queued);
        assert!(!doc.processed);
        assert!(doc.error.is_none());
        assert!(doc.chunks.is_empty());
        assert!(doc.vector_ids.is_empty());
    }
}
