use clap::{Parser, Subcommand};
use corpus_loader::{LoaderError, Result};
use corpus_loader::commands::{
    export_records, init_config, load_corpus, search_corpus, serve, show_status,
};
use corpus_loader::config::{Config, get_config_dir, show_config};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "corpus-loader")]
#[command(about = "Loads pre-computed embedding corpora into a vector store and searches them")]
#[command(version)]
struct Cli {
    /// Use this configuration directory instead of ~/.corpus-loader
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or write the configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Walk, deduplicate and insert the corpus into the vector store
    Load {
        /// Restart a failed run at this record offset
        #[arg(long)]
        resume_from: Option<usize>,
    },
    /// Write the deduplicated records to a JSON file without inserting them
    Export {
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Search the vector store with free text
    Search {
        text: String,
        /// Maximum number of results (defaults to store.search_limit)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Start the HTTP server
    Serve {
        #[arg(long, default_value = "127.0.0.1:3000")]
        bind: SocketAddr,
    },
    /// Show embedder health and vector store contents
    Status {
        /// Print this many stored records
        #[arg(long)]
        sample: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir().map_err(|e| LoaderError::Config(e.to_string()))?,
    };
    let config = Config::load(&config_dir)?;

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config)?;
            } else {
                init_config(&config)?;
            }
        }
        Commands::Load { resume_from } => {
            load_corpus(&config, resume_from).await?;
        }
        Commands::Export { output } => {
            export_records(&config, &output).await?;
        }
        Commands::Search { text, limit } => {
            search_corpus(&config, &text, limit).await?;
        }
        Commands::Serve { bind } => {
            serve(&config, bind).await?;
        }
        Commands::Status { sample } => {
            show_status(&config, sample).await?;
        }
    }

    Ok(())
}
