// Configuration management module
// TOML settings for the embedder, the vector store and corpus ingestion

pub mod settings;


use anyhow::Result;
use console::style;

pub use settings::{
    Config, ConfigError, IngestionConfig, OllamaConfig, StoreConfig, default_sources,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}

/// Print the effective configuration to stderr
#[inline]
pub fn show_config(config: &Config) -> Result<()> {
    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Ollama Settings:").bold().yellow());
    match config.ollama_url() {
        Ok(url) => eprintln!("  URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!("  Model: {}", style(&config.ollama.model).cyan());

    eprintln!();
    eprintln!("{}", style("Vector Store:").bold().yellow());
    let uri = config
        .store
        .uri
        .clone()
        .unwrap_or_else(|| config.vector_database_path().display().to_string());
    eprintln!("  URI: {}", style(uri).cyan());
    eprintln!("  Table: {}", style(&config.store.table_name).cyan());
    eprintln!("  Dimension: {}", style(config.store.dimension).cyan());
    eprintln!("  Search limit: {}", style(config.store.search_limit).cyan());

    eprintln!();
    eprintln!("{}", style("Ingestion:").bold().yellow());
    let insert_state = if config.ingestion.supports_insert {
        style("enabled").green()
    } else {
        style("disabled").red()
    };
    eprintln!("  Insert: {}", insert_state);
    eprintln!("  Chunk size: {}", style(config.ingestion.chunk_size).cyan());
    eprintln!(
        "  Embeddings root: {}",
        style(config.ingestion.embeddings_root.display()).cyan()
    );
    for source in &config.ingestion.sources {
        let years = source
            .years
            .map(|range| format!(" ({}..{})", range.start, range.end))
            .unwrap_or_default();
        eprintln!(
            "    {} → {}{}",
            style(&source.tag).cyan(),
            source.path.display(),
            years
        );
    }

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}
