//! Retrieval-augmented answering.
//!
//! `ask` runs the full query path: retrieval through [`SearchService`],
//! context refinement through the optimizer, prompt construction, one
//! completion call, then confidence scoring and citations over the
//! optimized passages. Answers are cached for an hour keyed by (query,
//! filters); provider and retrieval errors propagate uncached.

use std::sync::Arc;
use std::time::Duration;

use resume_harness_core::completion::{CompletionProvider, CompletionRequest};
use resume_harness_core::error::PipelineError;
use resume_harness_core::models::{ContextResult, RagAnswer, SearchFilters};
use resume_harness_core::optimize::{ContextOptimizer, OptimizerConfig};
use resume_harness_core::rag::{
    build_citations, build_prompt, confidence_score, join_context, ANSWER_MAX_TOKENS,
    ANSWER_TEMPERATURE, FALLBACK_ANSWER, SYSTEM_PROMPT,
};

use crate::cache::TtlCache;
use crate::config::CacheConfig;
use crate::search::SearchService;

pub struct RagService {
    search: Arc<SearchService>,
    completions: Arc<dyn CompletionProvider>,
    optimizer: ContextOptimizer,
    cache: TtlCache<RagAnswer>,
}

impl RagService {
    pub fn new(
        search: Arc<SearchService>,
        completions: Arc<dyn CompletionProvider>,
        optimizer_config: OptimizerConfig,
        cache_config: &CacheConfig,
    ) -> Self {
        let cache = TtlCache::new(
            cache_config.capacity,
            Duration::from_secs(cache_config.answer_ttl_secs),
        );
        Self {
            search,
            completions,
            optimizer: ContextOptimizer::new(optimizer_config),
            cache,
        }
    }

    pub async fn ask(
        &self,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<RagAnswer, PipelineError> {
        if query.trim().is_empty() {
            return Err(PipelineError::Validation("query must not be empty".to_string()));
        }
        let key = format!("rag:{query}:{}", filters.cache_key_part());

        let search = Arc::clone(&self.search);
        let completions = Arc::clone(&self.completions);
        let optimizer = self.optimizer.clone();
        let query = query.to_string();
        let filters = filters.clone();
        self.cache
            .get_or_compute(key, async move {
                let results = search.search(&query, &filters, None).await?;
                let context: Vec<ContextResult> =
                    results.into_iter().map(ContextResult::from).collect();
                let optimized = optimizer.optimize(context);

                let request = CompletionRequest {
                    system: SYSTEM_PROMPT.to_string(),
                    prompt: build_prompt(&query, &join_context(&optimized)),
                    temperature: ANSWER_TEMPERATURE,
                    max_tokens: ANSWER_MAX_TOKENS,
                };
                let raw = completions.complete(&request).await?;
                let answer = if raw.is_empty() {
                    FALLBACK_ANSWER.to_string()
                } else {
                    raw
                };

                Ok(RagAnswer {
                    confidence: confidence_score(&answer, &optimized),
                    citations: build_citations(&optimized),
                    answer,
                })
            })
            .await
    }

    pub fn clear_cache(&self) {
        self.cache.invalidate_all();
    }
}

/// CLI entry point for `rsm ask` — grounded answer printed to stdout.
pub async fn run_ask(
    config: &crate::config::Config,
    query: &str,
    filters: &SearchFilters,
) -> anyhow::Result<()> {
    let stack = crate::app::QueryStack::connect(config).await?;
    let answer = stack.rag.ask(query, filters).await?;

    println!("{}", answer.answer);
    println!();
    if !answer.citations.is_empty() {
        println!("--- Citations ---");
        for (i, citation) in answer.citations.iter().enumerate() {
            println!(
                "[{}] {} ({:.2})",
                i + 1,
                citation.document_id,
                citation.score
            );
            println!("    \"{}\"", citation.text.replace('\n', " "));
        }
        println!();
    }
    println!("confidence: {:.2}", answer.confidence);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::LocalCompletions;
    use crate::config::{CacheConfig, SearchConfig};
    use crate::embedding::LocalEmbeddings;
    use async_trait::async_trait;
    use resume_harness_core::embedding::EmbeddingProvider;
    use resume_harness_core::index::memory::InMemoryIndex;
    use resume_harness_core::index::{IndexedVector, VectorIndex};
    use serde_json::json;

    const DIMS: usize = 128;

    async fn seeded_service(passages: &[(&str, usize, &str)]) -> RagService {
        let embeddings = Arc::new(LocalEmbeddings::new(DIMS));
        let index = Arc::new(InMemoryIndex::new());

        let mut vectors = Vec::new();
        for (doc, i, text) in passages {
            vectors.push(IndexedVector {
                id: format!("{doc}-chunk-{i}"),
                document_id: doc.to_string(),
                vector: embeddings.embed(text).await.unwrap(),
                payload: json!({
                    "document_id": doc,
                    "chunk_index": i,
                    "text": text,
                }),
            });
        }
        if !vectors.is_empty() {
            index.upsert(vectors).await.unwrap();
        }

        let search = Arc::new(SearchService::new(
            embeddings,
            index,
            &SearchConfig::default(),
            &CacheConfig::default(),
        ));
        // Hash-based test vectors score lower than real embeddings, so the
        // relevance floor comes down to keep genuine matches in play.
        let optimizer_config = OptimizerConfig {
            min_relevance: 0.35,
            ..Default::default()
        };
        RagService::new(
            search,
            Arc::new(LocalCompletions),
            optimizer_config,
            &CacheConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_answer_carries_citations_and_confidence() {
        let svc = seeded_service(&[
            (
                "doc-a",
                0,
                "Jane Doe is a senior engineer with eight years of Rust experience \
                 building storage engines and network services for data platforms.",
            ),
            (
                "doc-b",
                0,
                "Bob Smith is a frontend developer working with React and TypeScript \
                 on design systems for consumer web applications.",
            ),
        ])
        .await;

        let answer = svc
            .ask("Who has Rust experience building storage engines?", &SearchFilters::default())
            .await
            .unwrap();

        assert!(answer.answer.contains("Based on the provided context"));
        assert!(!answer.citations.is_empty());
        assert_eq!(answer.citations[0].document_id, "doc-a");
        assert!(answer.confidence > 0.0 && answer.confidence <= 1.0);
    }

    #[tokio::test]
    async fn test_empty_retrieval_yields_low_confidence_and_no_citations() {
        let svc = seeded_service(&[]).await;

        let answer = svc
            .ask("Who knows COBOL?", &SearchFilters::default())
            .await
            .unwrap();

        assert!(answer.citations.is_empty());
        assert!(answer.confidence < 0.5);
        assert!(answer.answer.contains("does not contain enough information"));
    }

    #[tokio::test]
    async fn test_blank_query_is_rejected() {
        let svc = seeded_service(&[]).await;
        let err = svc.ask("", &SearchFilters::default()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }
}
