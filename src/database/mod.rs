// Database module
// Narrow store capabilities used by the loader and search, with a LanceDB implementation

pub mod lancedb;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::corpus::IngestionRecord;

pub use self::lancedb::VectorStore;

/// A row returned by a similarity search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredHit {
    pub vector_id: String,
    pub title: String,
    pub vector_text: String,
    /// Cosine similarity, higher is closer
    pub score: f32,
}

/// Batch insertion into the vector store
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Insert all `records` in one call; either the whole call succeeds or it fails
    async fn insert_batch(&self, records: &[IngestionRecord]) -> Result<()>;
}

/// Nearest-neighbour search against the vector store
#[async_trait]
pub trait RecordSearch: Send + Sync {
    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<StoredHit>>;
}
