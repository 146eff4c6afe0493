//! # Resume Harness
//!
//! Ingestion-to-answer pipeline for resume corpora: uploaded files are
//! spooled and queued, then a worker pool extracts text, redacts PII, chunks,
//! embeds, and indexes each document into a vector store. On top of the index
//! sit filtered semantic search and retrieval-augmented answering about
//! candidates.
//!
//! ## Modules
//!
//! | Module | Role |
//! |--------|------|
//! | `config` | TOML configuration with per-section defaults |
//! | `db` / `migrate` / `store` | SQLite pool, schema, document + job queue persistence |
//! | `storage` | Filesystem object store with HMAC-signed URLs |
//! | `ingest` / `progress` | Spooling files into the queue, bulk-enqueue progress |
//! | `extract` | PDF / DOCX / text extraction and zip archive expansion |
//! | `embedding` / `completion` | OpenAI-compatible and local providers |
//! | `index` | Qdrant-backed vector index, filter translation, in-memory backend |
//! | `cache` | TTL cache used by embeddings, queries, search, and answers |
//! | `pipeline` | Per-job state machine and the worker pool |
//! | `search` / `rag` | Ranked retrieval and grounded answer generation |
//! | `status` | Status reporting and document removal |
//! | `app` | Per-command assembly of the above |
//!
//! Pure, I/O-free logic (chunking, redaction, metadata heuristics, filter
//! expressions, context optimization, answer scoring) lives in
//! [`resume_harness_core`].

pub mod app;
pub mod cache;
pub mod completion;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod index;
pub mod ingest;
pub mod migrate;
pub mod pipeline;
pub mod progress;
pub mod rag;
pub mod search;
pub mod status;
pub mod storage;
pub mod store;
