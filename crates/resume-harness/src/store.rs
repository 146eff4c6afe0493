//! SQLite document store and durable job queue.
//!
//! One database holds both tables. Documents carry their chunks, metadata,
//! and vector ids as JSON columns; every pipeline step persists its output
//! here before the next step starts, so a replayed job always resumes from
//! a consistent snapshot.
//!
//! The queue hands out at most one active job per row: claiming is a single
//! `UPDATE ... RETURNING` statement, so two workers can never claim the same
//! job. Completed jobs are deleted; abandoned jobs stay with
//! `status = 'failed'` for inspection.

use anyhow::Result;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use resume_harness_core::models::{Chunk, Document, ProcessingStage, ResumeMetadata};

/// A job pulled from the queue by a worker. `attempts` counts this claim.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub id: String,
    pub document_id: String,
    pub file_path: PathBuf,
    pub is_archive: bool,
    pub attempts: u32,
}

/// Queue counters for status output.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueCounts {
    pub queued: i64,
    pub running: i64,
    pub failed: i64,
}

#[derive(Clone)]
pub struct DocumentStore {
    pool: SqlitePool,
}

impl DocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ---- documents ----

    pub async fn insert_document(&self, doc: &Document) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents
                (id, owner_id, original_file_name, content_type, file_size, file_key,
                 raw_text, redacted_text, chunks_json, metadata_json, vector_ids_json,
                 stage, processed, error, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.owner_id)
        .bind(&doc.original_file_name)
        .bind(&doc.content_type)
        .bind(doc.file_size)
        .bind(&doc.file_key)
        .bind(&doc.raw_text)
        .bind(&doc.redacted_text)
        .bind(serde_json::to_string(&doc.chunks)?)
        .bind(serde_json::to_string(&doc.metadata)?)
        .bind(serde_json::to_string(&doc.vector_ids)?)
        .bind(doc.stage.as_str())
        .bind(doc.processed)
        .bind(&doc.error)
        .bind(doc.created_at)
        .bind(doc.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_document).transpose()
    }

    pub async fn list_recent(&self, limit: i64) -> Result<Vec<Document>> {
        let rows = sqlx::query("SELECT * FROM documents ORDER BY updated_at DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_document).collect()
    }

    /// Remove a document row and any jobs that reference it.
    pub async fn delete_document(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM jobs WHERE document_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_stage(&self, id: &str, stage: ProcessingStage) -> Result<()> {
        sqlx::query("UPDATE documents SET stage = ?, updated_at = ? WHERE id = ?")
            .bind(stage.as_str())
            .bind(Utc::now().timestamp())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Reset terminal flags at the start of a (re)played job.
    pub async fn reset_for_processing(&self, id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE documents SET stage = ?, processed = 0, error = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(ProcessingStage::Extracting.as_str())
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn save_extracted(&self, id: &str, raw_text: &str, file_key: &str) -> Result<()> {
        sqlx::query(
            "UPDATE documents SET raw_text = ?, file_key = ?, updated_at = ? WHERE id = ?",
        )
        .bind(raw_text)
        .bind(file_key)
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn save_redacted(
        &self,
        id: &str,
        redacted_text: &str,
        metadata: &ResumeMetadata,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE documents SET redacted_text = ?, metadata_json = ?, updated_at = ? WHERE id = ?",
        )
        .bind(redacted_text)
        .bind(serde_json::to_string(metadata)?)
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn save_chunks(&self, id: &str, chunks: &[Chunk]) -> Result<()> {
        sqlx::query("UPDATE documents SET chunks_json = ?, updated_at = ? WHERE id = ?")
            .bind(serde_json::to_string(chunks)?)
            .bind(Utc::now().timestamp())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Terminal success: record vector ids, clear any error, flip processed.
    pub async fn mark_indexed(&self, id: &str, vector_ids: &[String]) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE documents
            SET vector_ids_json = ?, stage = ?, processed = 1, error = NULL, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(serde_json::to_string(vector_ids)?)
        .bind(ProcessingStage::Indexed.as_str())
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Terminal failure for this attempt: the document stays queryable with
    /// the failure reason. A later replay clears it via
    /// [`reset_for_processing`](Self::reset_for_processing).
    pub async fn mark_failed(&self, id: &str, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE documents SET stage = ?, processed = 1, error = ?, updated_at = ? WHERE id = ?",
        )
        .bind(ProcessingStage::Failed.as_str())
        .bind(error)
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Archive containers terminate processed with no error and no chunks.
    pub async fn mark_archive_expanded(&self, id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE documents SET stage = ?, processed = 1, error = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(ProcessingStage::Indexed.as_str())
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn stage_counts(&self) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query("SELECT stage, COUNT(*) AS n FROM documents GROUP BY stage")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| (r.get::<String, _>("stage"), r.get::<i64, _>("n")))
            .collect())
    }

    // ---- jobs ----

    pub async fn enqueue_job(
        &self,
        document_id: &str,
        file_path: &Path,
        is_archive: bool,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO jobs (id, document_id, file_path, is_archive, status, attempts,
                              available_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, 'queued', 0, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(document_id)
        .bind(file_path.to_string_lossy().into_owned())
        .bind(is_archive)
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    /// Atomically claim the next due job, if any.
    ///
    /// One statement flips the row to `running` and bumps its attempt count,
    /// so concurrent workers never observe the same job as claimable.
    pub async fn claim_next_job(&self) -> Result<Option<ClaimedJob>> {
        let now = Utc::now().timestamp();
        let row = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'running', attempts = attempts + 1, updated_at = ?1
            WHERE id = (
                SELECT id FROM jobs
                WHERE status = 'queued' AND available_at <= ?1
                ORDER BY available_at, created_at
                LIMIT 1
            )
            RETURNING id, document_id, file_path, is_archive, attempts
            "#,
        )
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| ClaimedJob {
            id: r.get("id"),
            document_id: r.get("document_id"),
            file_path: PathBuf::from(r.get::<String, _>("file_path")),
            is_archive: r.get("is_archive"),
            attempts: r.get::<i64, _>("attempts") as u32,
        }))
    }

    /// Drop a successfully finished job.
    pub async fn complete_job(&self, job_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record a failed attempt; reschedule with exponential backoff or, at
    /// the attempt ceiling, abandon the job. Returns true when abandoned.
    pub async fn fail_job(
        &self,
        job: &ClaimedJob,
        error: &str,
        max_attempts: u32,
        backoff_base_secs: u64,
    ) -> Result<bool> {
        let now = Utc::now().timestamp();
        if job.attempts >= max_attempts {
            sqlx::query(
                "UPDATE jobs SET status = 'failed', last_error = ?, updated_at = ? WHERE id = ?",
            )
            .bind(error)
            .bind(now)
            .bind(&job.id)
            .execute(&self.pool)
            .await?;
            return Ok(true);
        }

        // 2s, 4s, 8s... for the default base.
        let delay = backoff_base_secs.saturating_mul(1 << (job.attempts.saturating_sub(1)).min(16));
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'queued', available_at = ?, last_error = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(now + delay as i64)
        .bind(error)
        .bind(now)
        .bind(&job.id)
        .execute(&self.pool)
        .await?;
        Ok(false)
    }

    pub async fn queue_counts(&self) -> Result<QueueCounts> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM jobs GROUP BY status")
            .fetch_all(&self.pool)
            .await?;
        let mut counts = QueueCounts::default();
        for r in rows {
            let n: i64 = r.get("n");
            match r.get::<String, _>("status").as_str() {
                "queued" => counts.queued = n,
                "running" => counts.running = n,
                "failed" => counts.failed = n,
                _ => {}
            }
        }
        Ok(counts)
    }

    /// True when no job is queued (due now or later) or running.
    pub async fn queue_drained(&self) -> Result<bool> {
        let pending: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM jobs WHERE status IN ('queued', 'running')",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(pending == 0)
    }
}

fn row_to_document(row: SqliteRow) -> Result<Document> {
    let chunks: Vec<Chunk> = serde_json::from_str(&row.get::<String, _>("chunks_json"))?;
    let metadata: ResumeMetadata = serde_json::from_str(&row.get::<String, _>("metadata_json"))?;
    let vector_ids: Vec<String> = serde_json::from_str(&row.get::<String, _>("vector_ids_json"))?;

    Ok(Document {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        original_file_name: row.get("original_file_name"),
        content_type: row.get("content_type"),
        file_size: row.get("file_size"),
        file_key: row.get("file_key"),
        raw_text: row.get("raw_text"),
        redacted_text: row.get("redacted_text"),
        chunks,
        metadata,
        vector_ids,
        stage: ProcessingStage::parse(&row.get::<String, _>("stage")),
        processed: row.get("processed"),
        error: row.get("error"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
