use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;

use docpipe::config::Config;
use docpipe::ingest::IngestService;
use docpipe::logging;

#[derive(Parser)]
#[command(
    name = "docpipe-ingest",
    about = "Batch-ingest PDF and DOCX documents into the vector index"
)]
struct Cli {
    /// File or directory to ingest; defaults to the configured DOC_DIR.
    path: Option<PathBuf>,

    /// Target collection (defaults to QDRANT_COLLECTION).
    #[arg(long)]
    collection: Option<String>,

    /// Language tag stored with each chunk (defaults to LANGUAGE_HINTS).
    #[arg(long)]
    language: Option<String>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    logging::init_tracing();

    let config = Config::from_env().context("configuration is incomplete")?;
    let service =
        IngestService::from_config(&config).context("failed to build the ingestion pipeline")?;

    let target = cli.path.unwrap_or_else(|| config.doc_dir.clone());
    if target.is_dir() {
        let report = service
            .ingest_directory(&target, cli.collection.as_deref(), cli.language.as_deref())
            .await;

        for (path, outcome) in &report.succeeded {
            println!(
                "indexed {path}: {} pages ({} via OCR), {} chunks, {} points",
                outcome.pages, outcome.ocr_pages, outcome.chunks, outcome.points_upserted
            );
        }
        for failure in &report.failed {
            eprintln!("failed {}: {}", failure.path, failure.error);
        }
        println!(
            "{} of {} documents indexed",
            report.succeeded.len(),
            report.attempted()
        );

        if report.attempted() == 0 {
            bail!("no ingestible documents found under {}", target.display());
        }
        if report.succeeded.is_empty() {
            bail!("every document under {} failed", target.display());
        }
    } else {
        let outcome = service
            .ingest_file(&target, cli.collection.as_deref(), cli.language.as_deref())
            .await
            .with_context(|| format!("failed to ingest {}", target.display()))?;
        println!(
            "indexed {}: {} pages ({} via OCR), {} chunks, {} points",
            target.display(),
            outcome.pages,
            outcome.ocr_pages,
            outcome.chunks,
            outcome.points_upserted
        );
    }

    Ok(())
}
