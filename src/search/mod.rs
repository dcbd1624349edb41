// Search module
// Free-text nearest neighbour search: embed the query, then ask the store


use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::database::{RecordSearch, StoredHit};
use crate::embeddings::Embedder;
use crate::{LoaderError, Result};

/// One search hit as returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub vector_id: String,
    pub score: f32,
    pub title: String,
    pub vector_text: String,
}

impl From<StoredHit> for SearchResult {
    #[inline]
    fn from(hit: StoredHit) -> Self {
        Self {
            vector_id: hit.vector_id,
            score: hit.score,
            title: hit.title,
            vector_text: hit.vector_text,
        }
    }
}

#[derive(Clone)]
pub struct SearchService {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn RecordSearch>,
    default_limit: usize,
}

impl SearchService {
    #[inline]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn RecordSearch>,
        default_limit: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            default_limit,
        }
    }

    #[inline]
    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    /// Embed `text` and return the closest stored records, best first
    ///
    /// An empty result set is not an error.
    #[inline]
    pub async fn search(&self, text: &str, limit: Option<usize>) -> Result<Vec<SearchResult>> {
        let query = text.trim();
        if query.is_empty() {
            return Err(LoaderError::InvalidInput(
                "Search text cannot be empty".to_string(),
            ));
        }

        let limit = limit.unwrap_or(self.default_limit);
        if limit == 0 {
            return Err(LoaderError::InvalidInput(
                "Search limit must be at least 1".to_string(),
            ));
        }

        let embedder = Arc::clone(&self.embedder);
        let owned_query = query.to_string();
        let vector = tokio::task::spawn_blocking(move || embedder.embed(&owned_query))
            .await
            .map_err(|e| LoaderError::Embedding(format!("Embedding task failed: {}", e)))?
            .map_err(|e| LoaderError::Embedding(format!("Failed to embed query: {:#}", e)))?;
        debug!("Query embedded into {} dimensions", vector.len());

        let hits = self.store.search(&vector, limit).await?;
        info!("Search for {:?} returned {} results", query, hits.len());

        Ok(hits.into_iter().map(SearchResult::from).collect())
    }
}
