//! TOML configuration loading and validation.
//!
//! One file (default `./config/rsm.toml`) configures the database, object
//! storage, job queue, chunking, redaction, context optimizer, search,
//! caches, providers, and the vector index. Every field has a default so a
//! minimal file (or an empty one) works for local development. Provider API
//! keys come from the environment (`OPENAI_API_KEY`), never from the file.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use resume_harness_core::chunk::ChunkConfig;
use resume_harness_core::optimize::OptimizerConfig;
use resume_harness_core::redact::RedactionOptions;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub redaction: RedactionConfig,
    #[serde(default)]
    pub optimizer: OptimizerSection,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub index: IndexConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/rsm.db")
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root directory for stored resume objects.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    /// Secret for HMAC-signed URLs.
    #[serde(default = "default_storage_secret")]
    pub secret: String,
    /// Default signed-URL lifetime in seconds.
    #[serde(default = "default_url_ttl")]
    pub url_ttl_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            secret: default_storage_secret(),
            url_ttl_secs: default_url_ttl(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./data/objects")
}
fn default_storage_secret() -> String {
    "rsm-local-signing-secret".to_string()
}
fn default_url_ttl() -> u64 {
    3600
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueueConfig {
    /// Staging directory for files between enqueue and job completion.
    #[serde(default = "default_spool_dir")]
    pub spool_dir: PathBuf,
    /// Attempt ceiling per job before it is abandoned.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// First retry delay; doubles per subsequent attempt.
    #[serde(default = "default_backoff_base")]
    pub backoff_base_secs: u64,
    /// Worker idle poll interval.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Concurrent jobs per worker process.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            spool_dir: default_spool_dir(),
            max_attempts: default_max_attempts(),
            backoff_base_secs: default_backoff_base(),
            poll_interval_ms: default_poll_interval(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_spool_dir() -> PathBuf {
    PathBuf::from("./data/spool")
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_base() -> u64 {
    2
}
fn default_poll_interval() -> u64 {
    500
}
fn default_concurrency() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
    #[serde(default = "default_overlap_size")]
    pub overlap_size: usize,
    #[serde(default = "default_preserve_paragraphs")]
    pub preserve_paragraphs: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
            overlap_size: default_overlap_size(),
            preserve_paragraphs: default_preserve_paragraphs(),
        }
    }
}

fn default_max_chunk_size() -> usize {
    1000
}
fn default_overlap_size() -> usize {
    100
}
fn default_preserve_paragraphs() -> bool {
    true
}

impl ChunkingConfig {
    pub fn to_chunk_config(&self) -> ChunkConfig {
        ChunkConfig {
            max_chunk_size: self.max_chunk_size,
            overlap_size: self.overlap_size,
            preserve_paragraphs: self.preserve_paragraphs,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RedactionConfig {
    #[serde(default)]
    pub keep_email: bool,
    #[serde(default)]
    pub keep_phone: bool,
    #[serde(default)]
    pub replacement: Option<String>,
}

impl RedactionConfig {
    pub fn to_options(&self) -> RedactionOptions {
        let mut options = RedactionOptions {
            keep_email: self.keep_email,
            keep_phone: self.keep_phone,
            ..RedactionOptions::default()
        };
        if let Some(replacement) = &self.replacement {
            options.replacement = replacement.clone();
        }
        options
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OptimizerSection {
    #[serde(default = "default_optimizer_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_min_relevance")]
    pub min_relevance: f32,
    #[serde(default = "default_uniqueness_score")]
    pub uniqueness_score: f32,
}

impl Default for OptimizerSection {
    fn default() -> Self {
        Self {
            max_tokens: default_optimizer_max_tokens(),
            min_relevance: default_min_relevance(),
            uniqueness_score: default_uniqueness_score(),
        }
    }
}

fn default_optimizer_max_tokens() -> usize {
    3000
}
fn default_min_relevance() -> f32 {
    0.6
}
fn default_uniqueness_score() -> f32 {
    0.8
}

impl OptimizerSection {
    pub fn to_optimizer_config(&self) -> OptimizerConfig {
        OptimizerConfig {
            max_tokens: self.max_tokens,
            min_relevance: self.min_relevance,
            uniqueness_score: self.uniqueness_score,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_capacity")]
    pub capacity: u64,
    #[serde(default = "default_embedding_ttl")]
    pub embedding_ttl_secs: u64,
    #[serde(default = "default_hour_ttl")]
    pub search_ttl_secs: u64,
    #[serde(default = "default_hour_ttl")]
    pub answer_ttl_secs: u64,
    #[serde(default = "default_hour_ttl")]
    pub index_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            embedding_ttl_secs: default_embedding_ttl(),
            search_ttl_secs: default_hour_ttl(),
            answer_ttl_secs: default_hour_ttl(),
            index_ttl_secs: default_hour_ttl(),
        }
    }
}

fn default_cache_capacity() -> u64 {
    10_000
}
fn default_embedding_ttl() -> u64 {
    24 * 3600
}
fn default_hour_ttl() -> u64 {
    3600
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `openai` or `local`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    /// API base for OpenAI-compatible endpoints.
    #[serde(default = "default_openai_url")]
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dims: default_dims(),
            url: default_openai_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_openai_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    /// `openai` or `local`.
    #[serde(default = "default_completion_provider")]
    pub provider: String,
    #[serde(default = "default_completion_model")]
    pub model: String,
    #[serde(default = "default_openai_url")]
    pub url: String,
    #[serde(default = "default_completion_timeout")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: default_completion_provider(),
            model: default_completion_model(),
            url: default_openai_url(),
            timeout_secs: default_completion_timeout(),
        }
    }
}

fn default_completion_provider() -> String {
    "openai".to_string()
}
fn default_completion_model() -> String {
    "gpt-4".to_string()
}
fn default_completion_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// `qdrant` or `memory`.
    #[serde(default = "default_index_backend")]
    pub backend: String,
    #[serde(default = "default_qdrant_url")]
    pub url: String,
    /// Collection name; acts as the namespace for this corpus.
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: default_index_backend(),
            url: default_qdrant_url(),
            collection: default_collection(),
        }
    }
}

fn default_index_backend() -> String {
    "qdrant".to_string()
}
fn default_qdrant_url() -> String {
    "http://localhost:6334".to_string()
}
fn default_collection() -> String {
    "resumes".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config = parse_config(&content)?;
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.chunking.max_chunk_size == 0 {
        bail!("chunking.max_chunk_size must be > 0");
    }
    if config.chunking.overlap_size >= config.chunking.max_chunk_size {
        bail!("chunking.overlap_size must be smaller than chunking.max_chunk_size");
    }

    if !(0.0..=1.0).contains(&config.optimizer.min_relevance) {
        bail!("optimizer.min_relevance must be in [0.0, 1.0]");
    }
    if !(0.0..=1.0).contains(&config.optimizer.uniqueness_score) {
        bail!("optimizer.uniqueness_score must be in [0.0, 1.0]");
    }
    if config.optimizer.max_tokens == 0 {
        bail!("optimizer.max_tokens must be > 0");
    }

    if config.search.top_k == 0 {
        bail!("search.top_k must be >= 1");
    }

    if config.queue.max_attempts == 0 {
        bail!("queue.max_attempts must be >= 1");
    }

    if config.embedding.dims == 0 {
        bail!("embedding.dims must be > 0");
    }
    match config.embedding.provider.as_str() {
        "openai" | "local" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be openai or local.",
            other
        ),
    }
    match config.completion.provider.as_str() {
        "openai" | "local" => {}
        other => bail!(
            "Unknown completion provider: '{}'. Must be openai or local.",
            other
        ),
    }
    match config.index.backend.as_str() {
        "qdrant" | "memory" => {}
        other => bail!("Unknown index backend: '{}'. Must be qdrant or memory.", other),
    }

    Ok(config)
}
