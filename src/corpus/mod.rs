// Corpus module
// Discovers pre-computed embedding files on disk and turns them into ingestion records

pub mod dedup;
pub mod normalizer;
pub mod walker;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

pub use dedup::dedup_by_text;
pub use normalizer::{Channel, RawSourceFile, TextField, normalize, normalize_str};
pub use walker::{CorpusWalker, LocalFs, SourceFs, SourceGroup, WalkStats, YearRange};

/// One vector and its text, ready to be written to the vector store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionRecord {
    /// Source tag followed by the run-wide counter, e.g. `legcoqna42`
    #[serde(rename = "vector_id")]
    pub id: String,
    pub title: String,
    pub vector: Vec<f32>,
    #[serde(rename = "vector_text")]
    pub text: String,
}

/// Run-wide id sequence shared by every file and channel of a corpus walk
#[derive(Debug, Default)]
pub struct IdCounter {
    next: u64,
}

impl IdCounter {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next id for `source_tag` and advance the counter
    #[inline]
    pub fn next_id(&mut self, source_tag: &str) -> String {
        let id = format!("{}{}", source_tag, self.next);
        self.next += 1;
        id
    }

    /// Number of ids issued so far
    #[inline]
    pub fn issued(&self) -> u64 {
        self.next
    }
}

/// Non-fatal problems met while discovering source files
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Path not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed JSON in {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Deduplicated records of a whole corpus walk together with walk statistics
#[derive(Debug, Clone)]
pub struct PreparedCorpus {
    pub records: Vec<IngestionRecord>,
    pub stats: WalkStats,
    pub duplicates_removed: usize,
}

/// Walk every configured source group under `root` and deduplicate the result
#[inline]
pub fn prepare_corpus(root: &Path, groups: &[SourceGroup]) -> PreparedCorpus {
    let walker = CorpusWalker::new(root, groups.to_vec());
    let mut ids = IdCounter::new();
    let (records, stats) = walker.walk(&mut ids);

    info!("Total data points with duplicates: {}", records.len());
    let before = records.len();
    let records = dedup_by_text(records);
    let duplicates_removed = before - records.len();
    info!(
        "Removed {} duplicates, {} data points remain",
        duplicates_removed,
        records.len()
    );

    PreparedCorpus {
        records,
        stats,
        duplicates_removed,
    }
}
