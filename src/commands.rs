use anyhow::{Context, Result, bail};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::config::Config;
use crate::corpus::{PreparedCorpus, SourceGroup, prepare_corpus};
use crate::database::VectorStore;
use crate::embeddings::OllamaClient;
use crate::loader::{BatchLoader, ProgressTracker, RunOutcome};
use crate::search::SearchService;

const PROGRESS_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Walk and deduplicate the configured corpus on a blocking thread
async fn prepare(config: &Config) -> Result<PreparedCorpus> {
    let root = config.ingestion.embeddings_root.clone();
    let sources = config.ingestion.sources.clone();
    let prepared = tokio::task::spawn_blocking(move || prepare_corpus(&root, &sources))
        .await
        .context("Corpus walk task failed")?;

    let stats = &prepared.stats;
    println!(
        "Walked {} folders ({} missing), parsed {} files ({} skipped)",
        stats.folders_visited, stats.folders_skipped, stats.files_parsed, stats.files_skipped
    );
    println!(
        "{} records, {} duplicates removed",
        prepared.records.len(),
        prepared.duplicates_removed
    );
    Ok(prepared)
}

/// Insert the whole corpus into the vector store, optionally resuming at an offset
#[inline]
pub async fn load_corpus(config: &Config, resume_from: Option<usize>) -> Result<()> {
    if !config.ingestion.supports_insert {
        bail!(
            "Insert operation is not supported; enable ingestion.supports_insert or unset SUPPORT_INSERT"
        );
    }

    let prepared = prepare(config).await?;
    let total = prepared.records.len();
    let start_offset = resume_from.unwrap_or(0);

    let store = Arc::new(
        VectorStore::new(config)
            .await
            .context("Failed to open vector store")?,
    );
    let tracker = Arc::new(ProgressTracker::new());
    let loader = BatchLoader::new(store, Arc::clone(&tracker), &config.ingestion);

    let bar = if console::user_attended_stderr() {
        ProgressBar::new(100).with_style(
            ProgressStyle::with_template("{bar:40} {pos:>3}% {msg}")
                .context("Invalid progress bar template")?,
        )
    } else {
        ProgressBar::hidden()
    };
    bar.set_message(format!("{} records from offset {}", total, start_offset));

    let handle = loader.start(prepared.records, start_offset)?;
    while !handle.is_finished() {
        bar.set_position(u64::from(tracker.snapshot().percent));
        tokio::time::sleep(PROGRESS_POLL_INTERVAL).await;
    }
    let outcome = handle.await.context("Ingestion task panicked")?;

    match outcome {
        RunOutcome::Completed { inserted } => {
            bar.finish_with_message("done");
            info!("Inserted {} of {} records", inserted, total);
            println!("{} Inserted {} records", style("✓").green(), inserted);
            Ok(())
        }
        RunOutcome::Failed { offset, reason } => {
            bar.abandon_with_message("failed");
            error!("Ingestion failed at offset {}: {}", offset, reason);
            println!(
                "{} Ingestion failed at offset {}: {}",
                style("✗").red(),
                offset,
                reason
            );
            println!("  Resume with: corpus-loader load --resume-from {}", offset);
            bail!("Ingestion failed at offset {}", offset)
        }
    }
}

/// Write the deduplicated records as JSON without touching the store
#[inline]
pub async fn export_records(config: &Config, output: &Path) -> Result<()> {
    let prepared = prepare(config).await?;

    let file = File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &prepared.records)
        .with_context(|| format!("Failed to write records to {}", output.display()))?;
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", output.display()))?;

    println!(
        "Exported {} records to {}",
        prepared.records.len(),
        style(output.display()).cyan()
    );
    Ok(())
}

#[inline]
pub async fn search_corpus(config: &Config, text: &str, limit: Option<usize>) -> Result<()> {
    let store = Arc::new(
        VectorStore::new(config)
            .await
            .context("Failed to open vector store")?,
    );
    let embedder = Arc::new(OllamaClient::new(config)?);
    let service = SearchService::new(embedder, store, config.store.search_limit);

    let results = service.search(text, limit).await?;
    if results.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    for (rank, result) in results.iter().enumerate() {
        println!(
            "{:>3}. {} {} {}",
            rank + 1,
            style(format!("{:.4}", result.score)).green(),
            style(&result.vector_id).cyan(),
            style(&result.title).bold()
        );
        println!("     {}", result.vector_text);
    }
    Ok(())
}

#[inline]
pub async fn serve(config: &Config, bind: SocketAddr) -> Result<()> {
    crate::server::serve(config, bind).await?;
    Ok(())
}

/// Report embedder health and vector store contents
#[inline]
pub async fn show_status(config: &Config, sample: Option<usize>) -> Result<()> {
    println!("{}", style("📊 Corpus Loader Status").bold().cyan());
    println!();

    println!("{}", style("Ollama:").bold().yellow());
    let health = match OllamaClient::new(config) {
        Ok(client) => tokio::task::spawn_blocking(move || client.health_check())
            .await
            .context("Health check task failed")?,
        Err(e) => Err(e),
    };
    match health {
        Ok(()) => println!(
            "   ✅ Connected ({}:{}), model {}",
            config.ollama.host, config.ollama.port, config.ollama.model
        ),
        Err(e) => println!("   ❌ Unavailable - {:#}", e),
    }

    println!("{}", style("Vector Store:").bold().yellow());
    let store = match VectorStore::new(config).await {
        Ok(store) => store,
        Err(e) => {
            println!("   ❌ Failed to open - {}", e);
            return Ok(());
        }
    };
    println!("   ✅ Table '{}'", store.table_name());
    println!("   Records: {}", store.count_records(None).await?);

    for source in &config.ingestion.sources {
        match store.count_records(Some(&source_filter(source))).await {
            Ok(count) => println!("     {}: {}", style(&source.tag).cyan(), count),
            Err(e) => println!("     {}: error - {}", style(&source.tag).cyan(), e),
        }
    }

    if let Some(limit) = sample {
        println!();
        println!("{}", style("Sample:").bold().yellow());
        for record in store.query_records(None, limit).await? {
            println!(
                "   {} {} {}",
                style(&record.id).cyan(),
                style(&record.title).bold(),
                truncate(&record.text, 80)
            );
        }
    }

    Ok(())
}

/// Write the current configuration to its config file
#[inline]
pub fn init_config(config: &Config) -> Result<()> {
    config.save()?;
    println!(
        "Configuration written to {}",
        style(config.config_file_path().display()).cyan()
    );
    Ok(())
}

/// Rows whose id starts with the group's tag; valid tags hold no `LIKE` wildcards
fn source_filter(source: &SourceGroup) -> String {
    format!("vector_id LIKE '{}%'", source.tag)
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => format!("{}…", text.get(..index).unwrap_or(text)),
        None => text.to_string(),
    }
}
