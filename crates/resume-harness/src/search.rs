//! Semantic search over the indexed corpus.
//!
//! `search` embeds the query, translates the caller's structured filters
//! into the index's filter grammar, and maps raw index matches into
//! [`SearchResult`]s sorted by descending score. Results are cached for an
//! hour keyed by (query, filters, top-k); entries age out by TTL, and
//! `clear_cache` lets a long-lived embedder drop them early.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use resume_harness_core::embedding::EmbeddingProvider;
use resume_harness_core::error::PipelineError;
use resume_harness_core::filter::FilterExpr;
use resume_harness_core::index::{QueryMatch, VectorIndex};
use resume_harness_core::models::{PassageMatch, SearchFilters, SearchResult};

use crate::cache::TtlCache;
use crate::config::{CacheConfig, Config, SearchConfig};

pub struct SearchService {
    embeddings: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    default_top_k: usize,
    cache: TtlCache<Vec<SearchResult>>,
}

impl SearchService {
    pub fn new(
        embeddings: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        config: &SearchConfig,
        cache_config: &CacheConfig,
    ) -> Self {
        let cache = TtlCache::new(
            cache_config.capacity,
            Duration::from_secs(cache_config.search_ttl_secs),
        );
        Self {
            embeddings,
            index,
            default_top_k: config.top_k,
            cache,
        }
    }

    /// Ranked retrieval. `top_k` falls back to the configured default.
    pub async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        top_k: Option<usize>,
    ) -> Result<Vec<SearchResult>, PipelineError> {
        if query.trim().is_empty() {
            return Err(PipelineError::Validation("query must not be empty".to_string()));
        }
        let top_k = top_k.unwrap_or(self.default_top_k);
        let key = format!("search:{query}:{}:{top_k}", filters.cache_key_part());

        let embeddings = Arc::clone(&self.embeddings);
        let index = Arc::clone(&self.index);
        let query = query.to_string();
        let filters = filters.clone();
        self.cache
            .get_or_compute(key, async move {
                let vector = embeddings.embed(&query).await?;
                let expr = FilterExpr::from_filters(&filters);
                let matches = index.query(&vector, top_k, expr.as_ref()).await?;

                let mut results: Vec<SearchResult> =
                    matches.into_iter().map(query_match_to_result).collect();
                results.sort_by(|a, b| {
                    b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal)
                });
                Ok(results)
            })
            .await
    }

    pub fn clear_cache(&self) {
        self.cache.invalidate_all();
    }
}

/// CLI entry point for `rsm search` — ranked retrieval printed to stdout.
pub async fn run_search(
    config: &Config,
    query: &str,
    filters: &SearchFilters,
    top_k: Option<usize>,
) -> anyhow::Result<()> {
    let embeddings = crate::embedding::create_provider(&config.embedding, &config.cache)?;
    let index =
        crate::index::create_index(&config.index, config.embedding.dims, &config.cache).await?;
    let service = SearchService::new(embeddings, index, &config.search, &config.cache);

    let results = service.search(query, filters, top_k).await?;
    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!("{}. [{:.2}] {}", i + 1, result.score, result.document_id);
        println!("    chunk: {}", result.id);
        if let Some(meta) = &result.metadata {
            if let Some(skills) = meta.get("skills").and_then(|s| s.as_array()) {
                let list: Vec<&str> = skills.iter().filter_map(|s| s.as_str()).collect();
                if !list.is_empty() {
                    println!("    skills: {}", list.join(", "));
                }
            }
            if let Some(years) = meta.get("experience").and_then(|e| e.as_u64()) {
                println!("    experience: {} years", years);
            }
        }
        println!("    excerpt: \"{}\"", excerpt(&result.text));
        println!();
    }

    Ok(())
}

fn excerpt(text: &str) -> String {
    let flat = text.replace('\n', " ");
    let flat = flat.trim();
    if flat.chars().count() > 160 {
        let cut: String = flat.chars().take(160).collect();
        format!("{}...", cut)
    } else {
        flat.to_string()
    }
}

fn query_match_to_result(m: QueryMatch) -> SearchResult {
    let text = m
        .payload
        .get("text")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    SearchResult {
        id: m.id,
        document_id: m.document_id,
        text: text.clone(),
        score: m.score,
        matches: Some(vec![PassageMatch {
            text,
            score: m.score,
        }]),
        metadata: Some(m.payload),
    }
}
