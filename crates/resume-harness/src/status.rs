//! Document status and removal.
//!
//! `rsm status` without an id summarizes documents per stage and the job
//! queue, with a listing of recently touched documents; with an id it
//! prints one document's full processing state, including a signed
//! download URL for the stored original. `rsm delete` removes a document
//! everywhere it lives: vector index, object storage, database.

use anyhow::{bail, Result};

use resume_harness_core::models::Document;

use crate::app;
use crate::config::Config;
use crate::store::DocumentStore;

pub async fn run_status(config: &Config, id: Option<&str>) -> Result<()> {
    let store = app::open_store(config).await?;
    match id {
        Some(id) => print_document(config, &store, id).await,
        None => print_summary(&store).await,
    }
}

async fn print_summary(store: &DocumentStore) -> Result<()> {
    println!("--- Documents ---");
    let stages = store.stage_counts().await?;
    if stages.is_empty() {
        println!("(none)");
    }
    for (stage, n) in &stages {
        println!("{:<24} {}", stage, n);
    }
    println!();

    let recent = store.list_recent(10).await?;
    if !recent.is_empty() {
        println!("--- Recent ---");
        for doc in &recent {
            println!("{}  {:<22} {}", doc.id, doc.stage.as_str(), doc.original_file_name);
        }
        println!();
    }

    println!("--- Jobs ---");
    let queue = store.queue_counts().await?;
    println!("queued:  {}", queue.queued);
    println!("running: {}", queue.running);
    println!("failed:  {}", queue.failed);

    Ok(())
}

async fn print_document(config: &Config, store: &DocumentStore, id: &str) -> Result<()> {
    let doc = match store.get_document(id).await? {
        Some(doc) => doc,
        None => bail!("document not found: {}", id),
    };

    println!("--- Document ---");
    println!("id:            {}", doc.id);
    println!("owner:         {}", doc.owner_id);
    println!("file:          {}", doc.original_file_name);
    println!("content_type:  {}", doc.content_type);
    println!("size:          {} bytes", doc.file_size);
    println!("stage:         {}", doc.stage.as_str());
    println!("processed:     {}", doc.processed);
    if let Some(ref error) = doc.error {
        println!("error:         {}", error);
    }
    println!("chunks:        {}", doc.chunks.len());
    println!("vectors:       {}", doc.vector_ids.len());
    println!("created_at:    {}", format_ts(doc.created_at));
    println!("updated_at:    {}", format_ts(doc.updated_at));
    if let Some(ref key) = doc.file_key {
        let storage = app::object_store(config);
        println!(
            "download:      {}",
            storage.signed_url(key, config.storage.url_ttl_secs)
        );
    }

    print_metadata(&doc);

    Ok(())
}

fn print_metadata(doc: &Document) {
    let meta = &doc.metadata;
    let empty = meta.email.is_none()
        && meta.phone.is_none()
        && meta.location.is_none()
        && meta.experience_years.is_none()
        && meta.skills.is_empty()
        && meta.education.is_empty();
    if empty {
        return;
    }

    println!();
    println!("--- Metadata ---");
    if let Some(ref email) = meta.email {
        println!("email:      {}", email);
    }
    if let Some(ref phone) = meta.phone {
        println!("phone:      {}", phone);
    }
    if let Some(ref location) = meta.location {
        println!("location:   {}", location);
    }
    if let Some(years) = meta.experience_years {
        println!("experience: {} years", years);
    }
    if !meta.skills.is_empty() {
        println!("skills:     {}", meta.skills.join(", "));
    }
    if !meta.education.is_empty() {
        let entries: Vec<String> = meta
            .education
            .iter()
            .map(|e| match e.year {
                Some(year) => format!("{}, {} ({})", e.degree, e.institution, year),
                None => format!("{}, {}", e.degree, e.institution),
            })
            .collect();
        println!("education:  {}", entries.join("; "));
    }
}

/// Delete a document's vectors, stored object, and database row, in that
/// order. The row goes last so a partial delete stays visible and the
/// command can be rerun.
pub async fn run_delete(config: &Config, id: &str) -> Result<()> {
    let store = app::open_store(config).await?;
    let doc = match store.get_document(id).await? {
        Some(doc) => doc,
        None => bail!("document not found: {}", id),
    };

    if !doc.vector_ids.is_empty() {
        let index =
            crate::index::create_index(&config.index, config.embedding.dims, &config.cache).await?;
        index.delete(&doc.vector_ids).await?;
    }
    if let Some(ref key) = doc.file_key {
        app::object_store(config).delete(key).await?;
    }
    store.delete_document(id).await?;

    println!("deleted {}", doc.id);
    Ok(())
}

fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}
