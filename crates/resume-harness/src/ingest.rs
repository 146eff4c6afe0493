//! Enqueueing documents for background processing.
//!
//! Copies each input file into the spool directory under a unique name (the
//! worker owns the spooled copy and deletes it when the job finishes), records
//! a `Document` row in the queued stage, and pushes a job for the worker pool.
//! Directory enqueue walks the tree with include globs and reports per-file
//! progress on stderr.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use globset::{Glob, GlobSet, GlobSetBuilder};
use tokio::fs;
use uuid::Uuid;
use walkdir::WalkDir;

use resume_harness_core::models::Document;

use crate::app;
use crate::config::Config;
use crate::extract;
use crate::progress::{EnqueueEvent, EnqueueReporter, ProgressMode};
use crate::store::DocumentStore;

/// Globs applied when enqueueing a directory without explicit includes.
pub const DEFAULT_INCLUDE_GLOBS: &[&str] = &["*.pdf", "*.docx", "*.txt", "*.md"];

/// Ids produced by a single enqueue, for reporting and polling.
#[derive(Clone, Debug)]
pub struct Enqueued {
    pub document_id: String,
    pub job_id: String,
    pub file_name: String,
}

/// Spool one file and queue it for processing.
///
/// `archive` marks the file as a zip of resumes; the worker then expands it
/// into one child document per entry instead of extracting it directly.
/// Unsupported extensions are still accepted here, so the failure is recorded
/// on the document by the worker rather than lost at the command line.
pub async fn enqueue_file(
    store: &DocumentStore,
    spool_dir: &Path,
    path: &Path,
    owner_id: &str,
    archive: bool,
) -> Result<Enqueued> {
    if !path.is_file() {
        bail!("not a file: {}", path.display());
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| anyhow::anyhow!("path has no file name: {}", path.display()))?;

    let meta = fs::metadata(path)
        .await
        .with_context(|| format!("stat {}", path.display()))?;

    fs::create_dir_all(spool_dir)
        .await
        .with_context(|| format!("create spool dir {}", spool_dir.display()))?;
    let spooled = spool_path(spool_dir, &file_name);
    fs::copy(path, &spooled)
        .await
        .with_context(|| format!("spool {} -> {}", path.display(), spooled.display()))?;

    let content_type = if archive {
        "application/zip".to_string()
    } else {
        extract::content_type_for(&file_name).to_string()
    };

    let document = Document::new(
        owner_id,
        &file_name,
        &content_type,
        meta.len() as i64,
        Utc::now().timestamp(),
    );
    store.insert_document(&document).await?;
    let job_id = store.enqueue_job(&document.id, &spooled, archive).await?;

    Ok(Enqueued {
        document_id: document.id,
        job_id,
        file_name,
    })
}

/// Walk `dir` and enqueue every file matching the include globs.
///
/// Globs match the path relative to `dir`. An empty pattern list falls back to
/// [`DEFAULT_INCLUDE_GLOBS`]. Matches are sorted for deterministic ordering
/// before being spooled one by one.
pub async fn enqueue_dir(
    store: &DocumentStore,
    spool_dir: &Path,
    dir: &Path,
    owner_id: &str,
    include_globs: &[String],
    reporter: &dyn EnqueueReporter,
) -> Result<Vec<Enqueued>> {
    if !dir.is_dir() {
        bail!("not a directory: {}", dir.display());
    }

    reporter.report(EnqueueEvent::Scanning {
        dir: dir.display().to_string(),
    });

    let include_set = build_globset(include_globs)?;
    let mut matches: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(dir).unwrap_or(path);
        if !include_set.is_match(relative) {
            continue;
        }
        matches.push(path.to_path_buf());
    }
    matches.sort();

    let total = matches.len() as u64;
    let mut queued = Vec::with_capacity(matches.len());
    for (i, path) in matches.iter().enumerate() {
        let outcome = enqueue_file(store, spool_dir, path, owner_id, false).await?;
        reporter.report(EnqueueEvent::Enqueued {
            file_name: outcome.file_name.clone(),
            n: i as u64 + 1,
            total,
        });
        queued.push(outcome);
    }

    Ok(queued)
}

/// CLI entry point for `rsm enqueue` — spools a file or a directory of files
/// and prints the queued document ids.
pub async fn run_enqueue(
    config: &Config,
    path: &Path,
    owner: &str,
    archive: bool,
    include: &[String],
    progress: ProgressMode,
) -> Result<()> {
    let store = app::open_store(config).await?;
    let spool_dir = &config.queue.spool_dir;

    if path.is_dir() {
        if archive {
            bail!("--archive applies to a single zip file, not a directory");
        }
        let reporter = progress.reporter();
        let queued = enqueue_dir(&store, spool_dir, path, owner, include, reporter.as_ref()).await?;
        if queued.is_empty() {
            println!("No matching files.");
            return Ok(());
        }
        for item in &queued {
            println!("queued {}  {}", item.document_id, item.file_name);
        }
        println!();
        println!(
            "{} file(s) queued. Run `rsm worker --drain` to process them.",
            queued.len()
        );
    } else {
        let item = enqueue_file(&store, spool_dir, path, owner, archive).await?;
        println!("queued {}  {}", item.document_id, item.file_name);
    }

    Ok(())
}

fn spool_path(spool_dir: &Path, file_name: &str) -> PathBuf {
    spool_dir.join(format!("{}-{}", Uuid::new_v4(), file_name))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    if patterns.is_empty() {
        for pattern in DEFAULT_INCLUDE_GLOBS {
            builder.add(Glob::new(pattern)?);
        }
    } else {
        for pattern in patterns {
            builder.add(Glob::new(pattern)?);
        }
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use crate::progress::NoProgress;
    use resume_harness_core::models::ProcessingStage;
    use sqlx::sqlite::SqlitePoolOptions;
    use tempfile::TempDir;

    async fn memory_store() -> DocumentStore {
        // One connection: each sqlite::memory: connection is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        DocumentStore::new(pool)
    }

    #[tokio::test]
    async fn enqueue_file_spools_and_queues() {
        let store = memory_store().await;
        let tmp = TempDir::new().unwrap();
        let spool = tmp.path().join("spool");
        let input = tmp.path().join("jane-doe.txt");
        std::fs::write(&input, "Jane Doe\n5 years of Rust\n").unwrap();

        let outcome = enqueue_file(&store, &spool, &input, "acme", false)
            .await
            .unwrap();
        assert_eq!(outcome.file_name, "jane-doe.txt");

        let doc = store.get_document(&outcome.document_id).await.unwrap().unwrap();
        assert_eq!(doc.owner_id, "acme");
        assert_eq!(doc.original_file_name, "jane-doe.txt");
        assert_eq!(doc.content_type, "text/plain");
        assert_eq!(doc.stage, ProcessingStage::Queued);
        assert!(!doc.processed);

        // The job points at the spooled copy, not the original path.
        let job = store.claim_next_job().await.unwrap().unwrap();
        assert_eq!(job.document_id, outcome.document_id);
        assert_ne!(job.file_path, input);
        assert!(job.file_path.starts_with(&spool));
        assert!(!job.is_archive);
        assert_eq!(
            std::fs::read_to_string(&job.file_path).unwrap(),
            "Jane Doe\n5 years of Rust\n"
        );
    }

    #[tokio::test]
    async fn enqueue_file_archive_flag_sets_zip_type() {
        let store = memory_store().await;
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("batch.zip");
        std::fs::write(&input, b"PK\x03\x04").unwrap();

        let outcome = enqueue_file(&store, tmp.path(), &input, "acme", true)
            .await
            .unwrap();
        let doc = store.get_document(&outcome.document_id).await.unwrap().unwrap();
        assert_eq!(doc.content_type, "application/zip");
        let job = store.claim_next_job().await.unwrap().unwrap();
        assert!(job.is_archive);
    }

    #[tokio::test]
    async fn enqueue_file_rejects_missing_path() {
        let store = memory_store().await;
        let tmp = TempDir::new().unwrap();
        let err = enqueue_file(&store, tmp.path(), &tmp.path().join("nope.pdf"), "acme", false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not a file"));
    }

    #[tokio::test]
    async fn enqueue_dir_applies_default_globs() {
        let store = memory_store().await;
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("resumes");
        std::fs::create_dir_all(dir.join("2024")).unwrap();
        std::fs::write(dir.join("alice.txt"), "alice").unwrap();
        std::fs::write(dir.join("2024/bob.md"), "bob").unwrap();
        std::fs::write(dir.join("notes.png"), "png").unwrap();

        let queued = enqueue_dir(
            &store,
            &tmp.path().join("spool"),
            &dir,
            "acme",
            &[],
            &NoProgress,
        )
        .await
        .unwrap();

        let mut names: Vec<&str> = queued.iter().map(|q| q.file_name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["alice.txt", "bob.md"]);
        assert_eq!(store.queue_counts().await.unwrap().queued, 2);
    }

    #[tokio::test]
    async fn enqueue_dir_honors_custom_globs() {
        let store = memory_store().await;
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("resumes");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("alice.txt"), "alice").unwrap();
        std::fs::write(dir.join("bob.md"), "bob").unwrap();

        let queued = enqueue_dir(
            &store,
            &tmp.path().join("spool"),
            &dir,
            "acme",
            &["*.md".to_string()],
            &NoProgress,
        )
        .await
        .unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].file_name, "bob.md");
    }
}
