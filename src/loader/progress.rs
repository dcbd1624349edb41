use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::LoadError;

/// Point-in-time view of the current ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    /// 0..=100
    pub percent: u8,
    pub inserting: bool,
    /// Empty unless the last run failed
    pub error: String,
    /// Offset of the chunk that failed, usable to resume the run
    pub resume_offset: Option<usize>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Shared progress slot: one writer (the running load), any number of readers
///
/// All fields sit behind a single lock so a reader always gets a snapshot
/// written by one update.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    state: RwLock<ProgressSnapshot>,
}

impl ProgressTracker {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state; valid at any time, including before the first run
    #[inline]
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.read().clone()
    }

    #[inline]
    pub fn is_inserting(&self) -> bool {
        self.read().inserting
    }

    /// Claim the slot for a new run starting at `start_offset`
    ///
    /// Fails without touching the state if a run is already in flight. A run
    /// starting at offset 0 resets the percentage.
    pub(crate) fn try_begin(&self, start_offset: usize) -> Result<(), LoadError> {
        let mut state = self.write();
        if state.inserting {
            return Err(LoadError::Conflict);
        }

        state.inserting = true;
        if start_offset == 0 {
            state.percent = 0;
        }
        state.error.clear();
        state.resume_offset = None;
        state.updated_at = Some(Utc::now());
        Ok(())
    }

    /// Record a finished chunk ending at `end` out of `total` records
    pub(crate) fn record_chunk(&self, end: usize, total: usize) -> u8 {
        let percent = percent_of(end, total);
        let mut state = self.write();
        state.percent = percent;
        state.updated_at = Some(Utc::now());
        percent
    }

    pub(crate) fn complete(&self) {
        let mut state = self.write();
        state.percent = 100;
        state.inserting = false;
        state.updated_at = Some(Utc::now());
    }

    pub(crate) fn fail(&self, offset: usize, reason: String) {
        let mut state = self.write();
        state.percent = 0;
        state.inserting = false;
        state.error = reason;
        state.resume_offset = Some(offset);
        state.updated_at = Some(Utc::now());
    }

    fn read(&self) -> RwLockReadGuard<'_, ProgressSnapshot> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ProgressSnapshot> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// `floor(end / total * 100)`, with an empty set counting as complete
fn percent_of(end: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let percent = end.min(total) * 100 / total;
    u8::try_from(percent).unwrap_or(100)
}
