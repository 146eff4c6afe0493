//! # Resume Harness CLI (`rsm`)
//!
//! The `rsm` binary is the primary interface for Resume Harness. It provides
//! commands for database initialization, enqueueing resumes, running the
//! ingestion workers, semantic search, question answering, and document
//! administration.
//!
//! ## Usage
//!
//! ```bash
//! rsm --config ./config/rsm.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rsm init` | Create the SQLite database and run schema migrations |
//! | `rsm enqueue <path>` | Queue a resume file, zip archive, or directory for ingestion |
//! | `rsm worker` | Run the background worker pool (extract, redact, chunk, embed, index) |
//! | `rsm search "<query>"` | Filtered semantic search over indexed resumes |
//! | `rsm ask "<question>"` | Answer a question about the corpus with citations |
//! | `rsm status [id]` | Pipeline summary, or one document's processing state |
//! | `rsm delete <id>` | Remove a document, its stored file, and its vectors |
//! | `rsm completions <shell>` | Generate shell completions |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! rsm init --config ./config/rsm.toml
//!
//! # Queue one resume, then a whole directory
//! rsm enqueue ./cv/jane-doe.pdf --owner acme
//! rsm enqueue ./cv/ --owner acme --include '*.pdf'
//!
//! # Queue a zip of resumes as one batch
//! rsm enqueue ./batch.zip --owner acme --archive
//!
//! # Process the queue and exit when it is empty
//! rsm worker --drain
//!
//! # Search with structured filters
//! rsm search "senior rust engineer" --skills rust,tokio --min-experience 5
//!
//! # Ask a grounded question
//! rsm ask "Which candidates have led a platform team?"
//! ```

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

use resume_harness::config;
use resume_harness::db;
use resume_harness::ingest;
use resume_harness::migrate;
use resume_harness::pipeline;
use resume_harness::progress::ProgressMode;
use resume_harness::rag;
use resume_harness::search;
use resume_harness::status;

use resume_harness_core::models::SearchFilters;

/// Resume Harness CLI — ingestion, semantic search, and grounded question
/// answering over a resume corpus.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/rsm.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "rsm",
    about = "Resume Harness — resume ingestion, semantic search, and retrieval-augmented answering",
    version,
    long_about = "Resume Harness runs a local-first pipeline over uploaded resumes: text \
    extraction (PDF, DOCX, plain text), PII redaction, chunking, embedding, and vector \
    indexing, driven by a persistent job queue with retries. On top of the index it offers \
    filtered semantic search and retrieval-augmented answers with citations."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/rsm.toml`. Database, storage, queue, provider,
    /// and index settings are read from this file.
    #[arg(long, global = true, default_value = "./config/rsm.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database and data directories.
    ///
    /// Creates the SQLite database file with all required tables
    /// (documents, jobs), plus the storage root and spool directory.
    /// This command is idempotent — running it multiple times is safe.
    Init,

    /// Queue a resume file or a directory of resumes for processing.
    ///
    /// The input is copied into the spool directory and a job is pushed onto
    /// the queue; `rsm worker` does the actual extraction and indexing.
    /// Directories are walked with include globs; zip archives of resumes
    /// are expanded by the worker when `--archive` is set.
    Enqueue {
        /// Resume file, zip archive, or directory to queue.
        path: PathBuf,

        /// Owner the queued documents belong to.
        #[arg(long, default_value = "local")]
        owner: String,

        /// Treat the file as a zip archive of resumes (one document per entry).
        #[arg(long)]
        archive: bool,

        /// Include glob for directory enqueue (repeatable). Defaults to
        /// `*.pdf`, `*.docx`, `*.txt`, `*.md`.
        #[arg(long = "include")]
        include: Vec<String>,

        /// Progress output on stderr: auto (TTY detection), off, human, or json.
        #[arg(long, value_enum, default_value_t = ProgressArg::Auto)]
        progress: ProgressArg,
    },

    /// Run the background worker pool.
    ///
    /// Claims queued jobs and drives each document through extraction,
    /// redaction, chunking, embedding, and indexing. Failed attempts are
    /// retried with exponential backoff up to the configured attempt limit.
    Worker {
        /// Exit once the queue holds no queued or running jobs.
        #[arg(long)]
        drain: bool,

        /// Override the number of concurrent workers from config.
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Search indexed resumes.
    ///
    /// Embeds the query, runs a filtered vector search, and prints ranked
    /// candidates with matched passages.
    Search {
        /// The search query string.
        query: String,

        #[command(flatten)]
        filters: FilterArgs,

        /// Maximum number of results to return.
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Ask a question about the candidate corpus.
    ///
    /// Retrieves relevant passages, packs them into a context window, and
    /// generates an answer with citations and a confidence estimate. The
    /// answer is grounded: when retrieval comes back empty, the model is
    /// told there is no context.
    Ask {
        /// The question to answer.
        query: String,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Show pipeline status.
    ///
    /// Without an id: documents per stage, a recent-document listing, and
    /// job queue counts. With an id: one document's full processing state,
    /// extracted metadata, and a signed download URL for the stored
    /// original.
    Status {
        /// Document UUID.
        id: Option<String>,
    },

    /// Delete a document by its UUID.
    ///
    /// Removes the document's vectors from the index, its stored file from
    /// object storage, and its database row, in that order.
    Delete {
        /// Document UUID.
        id: String,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to emit completions for.
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Structured filters shared by `search` and `ask`.
#[derive(clap::Args, Clone, Debug)]
struct FilterArgs {
    /// Require all of these skills (repeatable or comma-separated).
    #[arg(long, value_delimiter = ',')]
    skills: Vec<String>,

    /// Minimum years of professional experience (inclusive).
    #[arg(long)]
    min_experience: Option<u32>,

    /// Maximum years of professional experience (inclusive).
    #[arg(long)]
    max_experience: Option<u32>,

    /// Candidate location.
    #[arg(long)]
    location: Option<String>,

    /// Match any of these degree keywords (repeatable or comma-separated).
    #[arg(long, value_delimiter = ',')]
    education: Vec<String>,
}

impl FilterArgs {
    fn to_filters(&self) -> SearchFilters {
        SearchFilters {
            skills: self.skills.clone(),
            experience_min: self.min_experience,
            experience_max: self.max_experience,
            location: self.location.clone(),
            education: self.education.clone(),
        }
    }
}

/// Progress output mode for `enqueue`.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProgressArg {
    Auto,
    Off,
    Human,
    Json,
}

impl ProgressArg {
    fn mode(self) -> ProgressMode {
        match self {
            ProgressArg::Auto => ProgressMode::default_for_tty(),
            ProgressArg::Off => ProgressMode::Off,
            ProgressArg::Human => ProgressMode::Human,
            ProgressArg::Json => ProgressMode::Json,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays parseable for scripts.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Completions don't require config
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        clap_complete::generate(*shell, &mut cmd, name, &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.db.path).await?;
            migrate::run_migrations(&pool).await?;
            std::fs::create_dir_all(&cfg.storage.root)?;
            std::fs::create_dir_all(&cfg.queue.spool_dir)?;
            println!("Database initialized successfully.");
        }
        Commands::Enqueue {
            path,
            owner,
            archive,
            include,
            progress,
        } => {
            ingest::run_enqueue(&cfg, &path, &owner, archive, &include, progress.mode()).await?;
        }
        Commands::Worker { drain, concurrency } => {
            pipeline::run_worker(&cfg, drain, concurrency).await?;
        }
        Commands::Search {
            query,
            filters,
            top_k,
        } => {
            search::run_search(&cfg, &query, &filters.to_filters(), top_k).await?;
        }
        Commands::Ask { query, filters } => {
            rag::run_ask(&cfg, &query, &filters.to_filters()).await?;
        }
        Commands::Status { id } => {
            status::run_status(&cfg, id.as_deref()).await?;
        }
        Commands::Delete { id } => {
            status::run_delete(&cfg, &id).await?;
        }
        Commands::Completions { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
