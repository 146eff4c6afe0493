//! # Resume Harness Core
//!
//! Shared, I/O-free logic for Resume Harness: data models, error taxonomy,
//! text chunking, PII redaction, resume metadata heuristics, filter
//! expressions, context optimization, answer scoring, and the provider /
//! index traits the application crate implements.
//!
//! This crate contains no tokio, sqlx, HTTP clients, or filesystem I/O.
//! Everything here is deterministic and unit-testable in isolation.

pub mod chunk;
pub mod completion;
pub mod embedding;
pub mod error;
pub mod filter;
pub mod index;
pub mod metadata;
pub mod models;
pub mod optimize;
pub mod rag;
pub mod redact;
pub mod tokens;

pub use error::PipelineError;
