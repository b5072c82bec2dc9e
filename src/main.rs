//! # docqa CLI
//!
//! ## Usage
//!
//! ```bash
//! docqa --config ./docqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa index` | Build the index (or reuse a snapshot) and print counts |
//! | `docqa index --dry-run` | Load and chunk only; no embedding calls |
//! | `docqa ask "<question>"` | Build the index and answer one question |
//! | `docqa serve` | Start the HTTP API; indexing runs in the background |
//!
//! Logs go to stderr. Set `RUST_LOG` to change verbosity (default `docqa=info`).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use docqa::chatbot::Chatbot;
use docqa::config::{load_config, Config};
use docqa::docqa_core::chunk::{split_documents, LexicalTokenizer};
use docqa::{loader, provenance, server};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// docqa: ask questions about a directory of JSON documents.
#[derive(Parser)]
#[command(name = "docqa", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./docqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the document index and report document and chunk counts.
    Index {
        /// Only load and chunk; do not call the embedding service.
        #[arg(long)]
        dry_run: bool,
    },

    /// Answer a single question.
    Ask {
        /// The question to answer.
        question: String,

        /// Also print the retrieved chunks and any companion PDF files.
        #[arg(long)]
        sources: bool,
    },

    /// Serve the JSON HTTP API.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docqa=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Index { dry_run: true } => dry_run(&config)?,
        Commands::Index { dry_run: false } => {
            let chatbot = Chatbot::from_config(&config)?;
            let report = chatbot.build(&config.data.dir).await?;
            println!(
                "Indexed {} documents into {} chunks{} in {} ms",
                report.documents,
                report.chunks,
                if report.from_snapshot { " (from snapshot)" } else { "" },
                report.elapsed_ms
            );
        }
        Commands::Ask { question, sources } => {
            let chatbot = Chatbot::from_config(&config)?;
            chatbot.build(&config.data.dir).await?;
            let answer = chatbot.ask(&question).await?;
            println!("{}", answer.text);

            if sources {
                println!();
                println!("Sources:");
                for (rank, hit) in answer.sources.iter().enumerate() {
                    println!(
                        "  {}. {} [chunk {}] distance {:.4}",
                        rank + 1,
                        hit.chunk.document_id,
                        hit.chunk.chunk_index,
                        hit.distance
                    );
                }
                if let Some(dir) = &config.data.companion_dir {
                    let ids = provenance::extract_ids(&answer.text);
                    for file in provenance::companion_files(dir, &ids) {
                        println!("  file: {}", file.display());
                    }
                }
            }
        }
        Commands::Serve => {
            let chatbot = Arc::new(Chatbot::from_config(&config)?);
            let builder = Arc::clone(&chatbot);
            let dir = config.data.dir.clone();
            tokio::spawn(async move {
                if let Err(e) = builder.build(&dir).await {
                    error!(error = %e, "index build failed; queries will report not_ready");
                }
            });
            server::run_server(chatbot, &config.server.bind)
                .await
                .with_context(|| format!("server on {} stopped", config.server.bind))?;
        }
    }

    Ok(())
}

fn dry_run(config: &Config) -> anyhow::Result<()> {
    let documents = loader::load(&config.data.dir)?;
    let params = config.chunk_params()?;
    let chunks = split_documents(&documents, &params, &LexicalTokenizer);
    println!(
        "Dry run: {} documents, {} chunks (chunk_size={}, overlap={})",
        documents.len(),
        chunks.len(),
        params.chunk_size(),
        params.overlap()
    );
    Ok(())
}
