// Loader module
// Inserts deduplicated records into the vector store in sequential chunks

pub mod progress;


use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::IngestionConfig;
use crate::corpus::IngestionRecord;
use crate::database::RecordSink;

pub use progress::{ProgressSnapshot, ProgressTracker};

/// Records sent to the store per insert call
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Error recorded when a run stops without reporting an outcome
pub const ABORTED_REASON: &str = "Insert task aborted";

/// Reasons a run is refused before any work begins
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("Insert operation is not supported")]
    NotPermitted,
    #[error("An ingestion run is already in progress")]
    Conflict,
    #[error("Start offset {offset} is past the end of {total} records")]
    InvalidOffset { offset: usize, total: usize },
}

/// How an accepted run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { inserted: usize },
    Failed { offset: usize, reason: String },
}

/// Chunked, strictly sequential insertion with shared progress state
pub struct BatchLoader {
    sink: Arc<dyn RecordSink>,
    progress: Arc<ProgressTracker>,
    chunk_size: usize,
    allow_insert: bool,
}

impl BatchLoader {
    #[inline]
    pub fn new(
        sink: Arc<dyn RecordSink>,
        progress: Arc<ProgressTracker>,
        config: &IngestionConfig,
    ) -> Self {
        Self {
            sink,
            progress,
            chunk_size: config.chunk_size.max(1),
            allow_insert: config.supports_insert,
        }
    }

    #[inline]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    #[inline]
    pub fn progress(&self) -> &Arc<ProgressTracker> {
        &self.progress
    }

    #[inline]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[inline]
    pub fn allows_insert(&self) -> bool {
        self.allow_insert
    }

    /// Run a whole load on the current task
    ///
    /// Refusals come back as `Err`; once accepted, insertion failures are
    /// reported through the outcome and the progress state.
    #[inline]
    pub async fn load(
        &self,
        records: &[IngestionRecord],
        start_offset: usize,
    ) -> Result<RunOutcome, LoadError> {
        let guard = self.claim(records.len(), start_offset)?;
        Ok(run_chunks(
            self.sink.as_ref(),
            guard,
            self.chunk_size,
            records,
            start_offset,
        )
        .await)
    }

    /// Claim the run synchronously and continue it on a background task
    #[inline]
    pub fn start(
        &self,
        records: Vec<IngestionRecord>,
        start_offset: usize,
    ) -> Result<JoinHandle<RunOutcome>, LoadError> {
        let guard = self.claim(records.len(), start_offset)?;

        let sink = Arc::clone(&self.sink);
        let chunk_size = self.chunk_size;
        Ok(tokio::spawn(async move {
            run_chunks(sink.as_ref(), guard, chunk_size, &records, start_offset).await
        }))
    }

    fn claim(&self, total: usize, start_offset: usize) -> Result<RunGuard, LoadError> {
        if !self.allow_insert {
            return Err(LoadError::NotPermitted);
        }
        if start_offset > total {
            return Err(LoadError::InvalidOffset {
                offset: start_offset,
                total,
            });
        }
        self.progress.try_begin(start_offset)?;
        Ok(RunGuard {
            progress: Arc::clone(&self.progress),
            offset: start_offset,
            settled: false,
        })
    }
}

/// Holds the claimed progress slot for one run
///
/// A run that ends without reaching `complete` or `fail` (a panicking sink,
/// a dropped `load` future, an aborted task) is recorded as failed at the
/// chunk it was working on when the guard drops.
struct RunGuard {
    progress: Arc<ProgressTracker>,
    offset: usize,
    settled: bool,
}

impl RunGuard {
    fn record_chunk(&mut self, end: usize, total: usize) -> u8 {
        self.offset = end;
        self.progress.record_chunk(end, total)
    }

    fn complete(mut self) {
        self.settled = true;
        self.progress.complete();
    }

    fn fail(mut self, reason: String) {
        self.settled = true;
        self.progress.fail(self.offset, reason);
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if !self.settled {
            warn!("Ingestion run aborted at offset {}", self.offset);
            self.progress.fail(self.offset, ABORTED_REASON.to_string());
        }
    }
}

async fn run_chunks(
    sink: &dyn RecordSink,
    mut guard: RunGuard,
    chunk_size: usize,
    records: &[IngestionRecord],
    start_offset: usize,
) -> RunOutcome {
    let total = records.len();
    let mut offset = start_offset;
    let mut inserted = 0;

    while offset < total {
        let end = total.min(offset + chunk_size);
        let chunk = &records[offset..end];
        info!("--- {} ~ {} begin to insert ---", offset, end);

        if let Err(e) = sink.insert_batch(chunk).await {
            let mut reason = e.to_string();
            if reason.is_empty() {
                reason = "Insert failed".to_string();
            }
            error!("Insert of {} ~ {} failed: {}", offset, end, reason);
            guard.fail(reason.clone());
            return RunOutcome::Failed { offset, reason };
        }

        let percent = guard.record_chunk(end, total);
        inserted += chunk.len();
        info!("--- {} ~ {} insert done, {}% now ---", offset, end, percent);
        offset = end;
    }

    guard.complete();
    info!("Inserted {} records, run complete", inserted);
    RunOutcome::Completed { inserted }
}
