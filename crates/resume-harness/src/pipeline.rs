//! Ingestion pipeline: the per-job state machine and the worker pool.
//!
//! Each claimed job drives one document through
//! `EXTRACTING → REDACTING → CHUNKING → EMBEDDING_AND_INDEXING` and ends
//! `INDEXED` or `FAILED`. Every step persists its output before the next
//! step starts, so replaying a failed job from the top is safe: extraction
//! and chunking are deterministic, re-embedding hits the cache, and vector
//! ids are derived from the document id, so re-upserts overwrite.
//!
//! Failures mark the document failed immediately; the queue decides
//! whether the job gets another attempt. The chunker and everything after
//! it only ever see redacted text.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::fs;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use resume_harness_core::chunk::{chunk_text, ChunkConfig};
use resume_harness_core::embedding::EmbeddingProvider;
use resume_harness_core::error::PipelineError;
use resume_harness_core::index::{IndexedVector, VectorIndex};
use resume_harness_core::metadata::MetadataExtractor;
use resume_harness_core::models::{Chunk, Document, ProcessingStage, ResumeMetadata};
use resume_harness_core::redact::{PiiRedactor, RedactionOptions};

use crate::config::{Config, QueueConfig};
use crate::extract;
use crate::storage::{object_key, ObjectStore};
use crate::store::{ClaimedJob, DocumentStore};

pub struct Pipeline {
    store: DocumentStore,
    storage: Arc<dyn ObjectStore>,
    embeddings: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    redactor: PiiRedactor,
    metadata: MetadataExtractor,
    chunk_config: ChunkConfig,
    redaction: RedactionOptions,
    spool_dir: PathBuf,
}

impl Pipeline {
    pub fn new(
        config: &Config,
        store: DocumentStore,
        storage: Arc<dyn ObjectStore>,
        embeddings: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            store,
            storage,
            embeddings,
            index,
            redactor: PiiRedactor::new(),
            metadata: MetadataExtractor::new(),
            chunk_config: config.chunking.to_chunk_config(),
            redaction: config.redaction.to_options(),
            spool_dir: config.queue.spool_dir.clone(),
        }
    }

    /// Run one claimed job to a terminal document state.
    #[instrument(skip_all, fields(job_id = %job.id, document_id = %job.document_id, attempt = job.attempts))]
    pub async fn process_job(&self, job: &ClaimedJob) -> Result<(), PipelineError> {
        let document = self
            .store
            .get_document(&job.document_id)
            .await
            .map_err(storage_err)?;
        let Some(document) = document else {
            // Deleted while queued; nothing left to process.
            warn!("document row missing, dropping job");
            return Ok(());
        };

        self.store
            .reset_for_processing(&document.id)
            .await
            .map_err(storage_err)?;

        if job.is_archive {
            return self.expand_archive(&document, job).await;
        }

        // EXTRACTING: parse text and put the original bytes in storage.
        let bytes = fs::read(&job.file_path).await.map_err(|e| {
            PipelineError::Storage(format!("read {}: {e}", job.file_path.display()))
        })?;
        let raw_text = extract::extract_text(&bytes, &document.original_file_name)?;

        let file_key = object_key(
            &document.owner_id,
            &document.original_file_name,
            Utc::now().timestamp(),
        );
        self.storage.put(&file_key, &bytes).await?;
        self.store
            .save_extracted(&document.id, &raw_text, &file_key)
            .await
            .map_err(storage_err)?;

        // REDACTING: PII capture, redaction, and derived metadata in one
        // step over the raw text.
        self.store
            .set_stage(&document.id, ProcessingStage::Redacting)
            .await
            .map_err(storage_err)?;
        let (redacted, pii) = self.redactor.extract_and_redact(&raw_text, &self.redaction);
        let derived = self.metadata.derive(&raw_text);
        let metadata = ResumeMetadata {
            name: None,
            email: pii.email,
            phone: pii.phone,
            location: None,
            experience_years: (derived.experience_years > 0).then_some(derived.experience_years),
            skills: derived.skills,
            education: derived.education,
        };
        self.store
            .save_redacted(&document.id, &redacted, &metadata)
            .await
            .map_err(storage_err)?;

        // CHUNKING: over redacted text only.
        self.store
            .set_stage(&document.id, ProcessingStage::Chunking)
            .await
            .map_err(storage_err)?;
        let chunks = chunk_text(&redacted, &self.chunk_config);
        if chunks.is_empty() {
            return Err(PipelineError::ExtractionFailed(
                "no chunks produced from document text".to_string(),
            ));
        }
        self.store
            .save_chunks(&document.id, &chunks)
            .await
            .map_err(storage_err)?;

        // EMBEDDING_AND_INDEXING.
        self.store
            .set_stage(&document.id, ProcessingStage::EmbeddingAndIndexing)
            .await
            .map_err(storage_err)?;
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embedded = self.embeddings.embed_batch(&texts).await?;

        let mut vectors = Vec::with_capacity(chunks.len());
        let mut vector_ids = Vec::with_capacity(chunks.len());
        for (chunk, vector) in chunks.iter().zip(embedded) {
            let id = format!("{}-chunk-{}", document.id, chunk.chunk_index);
            vectors.push(IndexedVector {
                id: id.clone(),
                document_id: document.id.clone(),
                vector,
                payload: chunk_payload(&document, &metadata, chunk),
            });
            vector_ids.push(id);
        }
        self.index.upsert(vectors).await?;
        self.store
            .mark_indexed(&document.id, &vector_ids)
            .await
            .map_err(storage_err)?;

        remove_spool_file(&job.file_path).await;
        info!(chunks = chunks.len(), "document indexed");
        Ok(())
    }

    /// Expand a ZIP of resumes into one document + job per accepted entry.
    /// The archive's own document terminates processed with no error and
    /// no chunks.
    async fn expand_archive(
        &self,
        document: &Document,
        job: &ClaimedJob,
    ) -> Result<(), PipelineError> {
        let bytes = fs::read(&job.file_path).await.map_err(|e| {
            PipelineError::Storage(format!("read {}: {e}", job.file_path.display()))
        })?;
        let listing = extract::list_archive_entries(&bytes)?;
        for name in &listing.skipped {
            warn!(entry = %name, "skipping archive entry with unsupported extension");
        }

        let now = Utc::now().timestamp();
        let mut expanded = 0usize;
        for entry in listing.entries {
            let spooled = self
                .spool_dir
                .join(format!("{}-{}", Uuid::new_v4(), entry.file_name));
            fs::write(&spooled, &entry.bytes).await.map_err(|e| {
                PipelineError::Storage(format!("spool {}: {e}", spooled.display()))
            })?;

            let child = Document::new(
                &document.owner_id,
                &entry.file_name,
                extract::content_type_for(&entry.file_name),
                entry.bytes.len() as i64,
                now,
            );
            self.store.insert_document(&child).await.map_err(storage_err)?;
            self.store
                .enqueue_job(&child.id, &spooled, false)
                .await
                .map_err(storage_err)?;
            expanded += 1;
        }

        self.store
            .mark_archive_expanded(&document.id)
            .await
            .map_err(storage_err)?;
        remove_spool_file(&job.file_path).await;
        info!(entries = expanded, skipped = listing.skipped.len(), "archive expanded");
        Ok(())
    }
}

/// Payload stored with each chunk vector. Filterable fields are
/// lowercased here because keyword matching in the index is exact.
fn chunk_payload(document: &Document, metadata: &ResumeMetadata, chunk: &Chunk) -> serde_json::Value {
    let education: Vec<String> = metadata
        .education
        .iter()
        .map(|e| e.degree.to_lowercase())
        .collect();
    let mut payload = json!({
        "document_id": document.id,
        "chunk_index": chunk.chunk_index,
        "text": chunk.text,
        "owner_id": document.owner_id,
        "skills": metadata.skills,
        "education": education,
    });
    if let Some(years) = metadata.experience_years {
        payload["experience"] = json!(years);
    }
    if let Some(location) = &metadata.location {
        payload["location"] = json!(location.to_lowercase());
    }
    if let Some(created) = DateTime::<Utc>::from_timestamp(document.created_at, 0) {
        payload["date"] = json!(created.to_rfc3339());
    }
    payload
}

fn storage_err(e: anyhow::Error) -> PipelineError {
    PipelineError::Storage(e.to_string())
}

/// Delete a spool file after a finished job; a missing file is fine.
async fn remove_spool_file(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove spool file");
        }
    }
}

/// Worker pool settings, from `[queue]` config plus CLI overrides.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub concurrency: usize,
    /// Exit once the queue holds no queued or running jobs.
    pub drain: bool,
    pub poll_interval: Duration,
    pub max_attempts: u32,
    pub backoff_base_secs: u64,
}

impl WorkerOptions {
    pub fn from_config(queue: &QueueConfig) -> Self {
        Self {
            concurrency: queue.concurrency,
            drain: false,
            poll_interval: Duration::from_millis(queue.poll_interval_ms),
            max_attempts: queue.max_attempts,
            backoff_base_secs: queue.backoff_base_secs,
        }
    }
}

/// Run `concurrency` worker loops until they exit (drain mode) or the
/// process is stopped.
pub async fn run_workers(
    pipeline: Arc<Pipeline>,
    store: DocumentStore,
    options: WorkerOptions,
) -> anyhow::Result<()> {
    let mut workers = JoinSet::new();
    for worker in 0..options.concurrency.max(1) {
        let pipeline = Arc::clone(&pipeline);
        let store = store.clone();
        let options = options.clone();
        workers.spawn(async move { worker_loop(worker, pipeline, store, options).await });
    }
    while let Some(joined) = workers.join_next().await {
        joined??;
    }
    Ok(())
}

/// CLI entry point for `rsm worker` — run the pool against the configured
/// queue, optionally draining it and exiting.
pub async fn run_worker(
    config: &Config,
    drain: bool,
    concurrency: Option<usize>,
) -> anyhow::Result<()> {
    let store = crate::app::open_store(config).await?;
    let storage = crate::app::object_store(config);
    let embeddings = crate::embedding::create_provider(&config.embedding, &config.cache)?;
    let index =
        crate::index::create_index(&config.index, config.embedding.dims, &config.cache).await?;

    let mut options = WorkerOptions::from_config(&config.queue);
    options.drain = drain;
    if let Some(n) = concurrency {
        options.concurrency = n;
    }

    info!(
        concurrency = options.concurrency,
        drain = options.drain,
        "starting workers"
    );
    let pipeline = Arc::new(Pipeline::new(
        config,
        store.clone(),
        storage,
        embeddings,
        index,
    ));
    run_workers(pipeline, store.clone(), options).await?;

    if drain {
        println!("Queue drained.");
        for (stage, n) in store.stage_counts().await? {
            println!("  {}: {}", stage, n);
        }
        let queue = store.queue_counts().await?;
        if queue.failed > 0 {
            println!("  abandoned jobs: {}", queue.failed);
        }
    }

    Ok(())
}

async fn worker_loop(
    worker: usize,
    pipeline: Arc<Pipeline>,
    store: DocumentStore,
    options: WorkerOptions,
) -> anyhow::Result<()> {
    debug!(worker, "worker loop started");
    loop {
        match store.claim_next_job().await? {
            Some(job) => match pipeline.process_job(&job).await {
                Ok(()) => store.complete_job(&job.id).await?,
                Err(err) => {
                    // The document reflects the failure even while the job
                    // waits out its backoff.
                    store.mark_failed(&job.document_id, &err.to_string()).await?;
                    let abandoned = store
                        .fail_job(&job, &err.to_string(), options.max_attempts, options.backoff_base_secs)
                        .await?;
                    if abandoned {
                        error!(
                            job_id = %job.id,
                            document_id = %job.document_id,
                            attempts = job.attempts,
                            %err,
                            "job abandoned"
                        );
                        // No further attempts will read the spooled copy.
                        remove_spool_file(&job.file_path).await;
                    } else {
                        warn!(
                            job_id = %job.id,
                            document_id = %job.document_id,
                            attempt = job.attempts,
                            terminal = err.is_terminal(),
                            %err,
                            "job attempt failed, rescheduling"
                        );
                    }
                }
            },
            None => {
                if options.drain && store.queue_drained().await? {
                    debug!(worker, "queue drained, worker exiting");
                    return Ok(());
                }
                tokio::time::sleep(options.poll_interval).await;
            }
        }
    }
}
