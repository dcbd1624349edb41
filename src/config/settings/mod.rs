
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::corpus::SourceGroup;
use crate::loader::DEFAULT_CHUNK_SIZE;

/// Dimension of all-MiniLM-L6-v2 embeddings
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 384;

/// Set to `false` to refuse insertion regardless of the config file
pub const SUPPORT_INSERT_ENV: &str = "SUPPORT_INSERT";
/// Overrides `store.uri`
pub const STORE_URI_ENV: &str = "VECTOR_STORE_URI";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: "all-minilm:latest".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// LanceDB URI; a local directory under the config dir when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    pub table_name: String,
    pub dimension: u32,
    pub search_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: None,
            table_name: "main".to_string(),
            dimension: DEFAULT_EMBEDDING_DIMENSION,
            search_limit: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestionConfig {
    pub supports_insert: bool,
    pub chunk_size: usize,
    pub embeddings_root: PathBuf,
    pub sources: Vec<SourceGroup>,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            supports_insert: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
            embeddings_root: PathBuf::from("public/embeddings"),
            sources: default_sources(),
        }
    }
}

/// Dataset groups of the deployed corpus
#[inline]
pub fn default_sources() -> Vec<SourceGroup> {
    vec![
        SourceGroup::yearly("legcoqna", "legcoqna/128embeddings", 1998, 2024),
        SourceGroup::yearly("pressrelease", "pressrelease/128embeddings", 1999, 2025),
        SourceGroup::flat("sfcqna", "sfcqna/128embeddings"),
        SourceGroup::flat("sfcspeakingnotes", "sfcspeakingnotes/128embeddings"),
    ]
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid table name: {0:?} (cannot be empty)")]
    InvalidTableName(String),
    #[error("Invalid embedding dimension: {0} (must be between 1 and 4096)")]
    InvalidDimension(u32),
    #[error("Invalid search limit: {0} (must be between 1 and 16384)")]
    InvalidSearchLimit(usize),
    #[error("Invalid chunk size: {0} (must be between 1 and 10000)")]
    InvalidChunkSize(usize),
    #[error("Invalid source tag: {0:?} (letters, digits and '-', not ending in a digit)")]
    InvalidSourceTag(String),
    #[error("Duplicate source tag: {0}")]
    DuplicateSourceTag(String),
    #[error("Invalid year range for {tag}: {start}..{end} (start must be before end)")]
    InvalidYearRange { tag: String, start: u16, end: u16 },
    #[error("Invalid boolean for {0}: {1:?}")]
    InvalidBoolean(&'static str, String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Default configuration directory (`~/.corpus-loader`)
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".corpus-loader"))
            .or_else(|| dirs::data_dir().map(|data| data.join("corpus-loader")))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load `config.toml` from `config_dir`, falling back to defaults
    ///
    /// Environment overrides are applied before validation.
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).with_context(|| {
                format!("Failed to read config file: {}", config_path.display())
            })?;
            toml::from_str::<Config>(&content).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?
        } else {
            Self::default()
        };
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .apply_env_overrides(|key| std::env::var(key).ok())
            .context("Invalid environment override")?;
        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Apply environment overrides using `lookup` to read variables
    #[inline]
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(SUPPORT_INSERT_ENV) {
            self.ingestion.supports_insert = match value.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => return Err(ConfigError::InvalidBoolean(SUPPORT_INSERT_ENV, value)),
            };
        }

        if let Some(uri) = lookup(STORE_URI_ENV).filter(|uri| !uri.trim().is_empty()) {
            self.store.uri = Some(uri);
        }

        Ok(())
    }

    /// Get the base directory for the application
    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ollama.validate()?;
        self.store.validate()?;
        self.ingestion.validate()?;
        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    /// Get the path for the local vector database directory
    #[inline]
    pub fn vector_database_path(&self) -> PathBuf {
        self.get_base_dir().join("vectors")
    }

    #[inline]
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        self.ollama.ollama_url()
    }
}

impl OllamaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        self.ollama_url()?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        Ok(())
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.table_name.trim().is_empty() {
            return Err(ConfigError::InvalidTableName(self.table_name.clone()));
        }

        if !(1..=4096).contains(&self.dimension) {
            return Err(ConfigError::InvalidDimension(self.dimension));
        }

        if !(1..=16384).contains(&self.search_limit) {
            return Err(ConfigError::InvalidSearchLimit(self.search_limit));
        }

        Ok(())
    }
}

impl IngestionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=10_000).contains(&self.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(self.chunk_size));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if !source.has_valid_tag() {
                return Err(ConfigError::InvalidSourceTag(source.tag.clone()));
            }

            if !seen.insert(source.tag.as_str()) {
                return Err(ConfigError::DuplicateSourceTag(source.tag.clone()));
            }

            if let Some(range) = source.years {
                if range.start >= range.end {
                    return Err(ConfigError::InvalidYearRange {
                        tag: source.tag.clone(),
                        start: range.start,
                        end: range.end,
                    });
                }
            }
        }

        Ok(())
    }
}
