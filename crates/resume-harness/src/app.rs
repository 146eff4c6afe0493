//! Shared assembly for CLI commands.
//!
//! Each command builds exactly the stack it needs from config: [`open_store`]
//! for anything touching SQLite, [`object_store`] for the stored resume blobs,
//! and [`QueryStack::connect`] for the retrieval path (embeddings, vector
//! index, search, answer generation). Commands that only read the database
//! never touch the index backend, so `rsm status` works while Qdrant is down.

use std::sync::Arc;

use anyhow::Result;

use resume_harness_core::completion::CompletionProvider;
use resume_harness_core::embedding::EmbeddingProvider;
use resume_harness_core::index::VectorIndex;

use crate::completion;
use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::index;
use crate::rag::RagService;
use crate::search::SearchService;
use crate::storage::{FsObjectStore, ObjectStore};
use crate::store::DocumentStore;

/// Open the configured SQLite database and wrap it in a [`DocumentStore`].
pub async fn open_store(config: &Config) -> Result<DocumentStore> {
    let pool = db::connect(&config.db.path).await?;
    Ok(DocumentStore::new(pool))
}

/// Filesystem-backed object storage under the configured root.
pub fn object_store(config: &Config) -> Arc<dyn ObjectStore> {
    Arc::new(FsObjectStore::new(
        config.storage.root.clone(),
        config.storage.secret.clone(),
    ))
}

/// The retrieval-side dependency graph, connected and ready to serve.
pub struct QueryStack {
    pub embeddings: Arc<dyn EmbeddingProvider>,
    pub index: Arc<dyn VectorIndex>,
    pub completions: Arc<dyn CompletionProvider>,
    pub search: Arc<SearchService>,
    pub rag: RagService,
}

impl QueryStack {
    /// Instantiate providers from config and wire the search and answer
    /// services on top of them. Connecting ensures the index collection
    /// exists, so this is the first place a bad Qdrant URL surfaces.
    pub async fn connect(config: &Config) -> Result<Self> {
        let embeddings = embedding::create_provider(&config.embedding, &config.cache)?;
        let index = index::create_index(&config.index, config.embedding.dims, &config.cache).await?;
        let completions = completion::create_provider(&config.completion)?;

        let search = Arc::new(SearchService::new(
            Arc::clone(&embeddings),
            Arc::clone(&index),
            &config.search,
            &config.cache,
        ));
        let rag = RagService::new(
            Arc::clone(&search),
            Arc::clone(&completions),
            config.optimizer.to_optimizer_config(),
            &config.cache,
        );

        Ok(Self {
            embeddings,
            index,
            completions,
            search,
            rag,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[tokio::test]
    async fn query_stack_connects_with_local_providers() {
        let cfg: Config = parse_config(
            r#"
            [embedding]
            provider = "local"
            dims = 64

            [completion]
            provider = "local"

            [index]
            backend = "memory"
            "#,
        )
        .unwrap();

        let stack = QueryStack::connect(&cfg).await.unwrap();
        let vector = stack.embeddings.embed("rust engineer").await.unwrap();
        assert_eq!(vector.len(), 64);
    }
}
