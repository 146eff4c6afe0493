//! Pipeline error taxonomy.
//!
//! Every fallible pipeline operation returns [`PipelineError`]. Variants
//! are classified terminal (another attempt cannot change the outcome) or
//! retryable (a transient dependency failed); the job queue applies the
//! same attempt ceiling and backoff to both, so the classification exists
//! for logging and for callers deciding whether a replay is worth it. On
//! the synchronous query path all errors propagate to the caller uncached.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// Unknown or explicitly rejected file format. Terminal.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A nominally supported format failed to parse. Terminal.
    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    /// Embedding provider failure or timeout. Retryable.
    #[error("embedding provider error: {0}")]
    EmbeddingProvider(String),

    /// Vector index unreachable or rejected the operation. Retryable.
    #[error("vector index unavailable: {0}")]
    IndexUnavailable(String),

    /// Completion provider failure or timeout. Retryable.
    #[error("completion provider error: {0}")]
    CompletionProvider(String),

    /// Durable storage or document store I/O failure. Retryable.
    #[error("storage error: {0}")]
    Storage(String),

    /// Malformed caller input, rejected before any side effect. Terminal.
    #[error("invalid input: {0}")]
    Validation(String),
}

impl PipelineError {
    /// True when retrying cannot change the outcome.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineError::UnsupportedFormat(_)
                | PipelineError::ExtractionFailed(_)
                | PipelineError::Validation(_)
        )
    }

    /// True when the failure was transient and a replay may succeed.
    pub fn is_retryable(&self) -> bool {
        !self.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_variants() {
        assert!(PipelineError::UnsupportedFormat("x".into()).is_terminal());
        assert!(PipelineError::ExtractionFailed("x".into()).is_terminal());
        assert!(PipelineError::Validation("x".into()).is_terminal());
    }

    #[test]
    fn test_retryable_variants() {
        assert!(PipelineError::EmbeddingProvider("x".into()).is_retryable());
        assert!(PipelineError::IndexUnavailable("x".into()).is_retryable());
        assert!(PipelineError::CompletionProvider("x".into()).is_retryable());
        assert!(PipelineError::Storage("x".into()).is_retryable());
    }

    #[test]
    fn test_display_carries_detail() {
        let err = PipelineError::ExtractionFailed("corrupt xref table".into());
        assert_eq!(err.to_string(), "extraction failed: corrupt xref table");
    }
}
