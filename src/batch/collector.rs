//! Thread-safe result aggregation in completion order.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::types::{ResultEntry, ResultStatus};

/// Handle for an `InProgress` entry. Not `Clone`: an entry can be finished only once.
#[derive(Debug)]
pub struct EntryId(usize);

#[derive(Debug, Default)]
struct CollectorState {
    next_id: usize,
    in_progress: HashMap<usize, ResultEntry>,
    completed: Vec<ResultEntry>,
    peak_in_progress: usize,
}

#[derive(Debug, Default)]
pub struct ResultCollector {
    state: Mutex<CollectorState>,
}

impl ResultCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CollectorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a task as started (`InProgress`).
    pub fn start(&self, file: &Path, task: String) -> EntryId {
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.in_progress.insert(
            id,
            ResultEntry {
                file: file.to_path_buf(),
                task,
                status: ResultStatus::InProgress,
                message: None,
            },
        );
        state.peak_in_progress = state.peak_in_progress.max(state.in_progress.len());
        EntryId(id)
    }

    /// Move a started entry to its terminal status and append it to the completed list.
    pub fn finish(
        &self,
        id: EntryId,
        status: ResultStatus,
        message: Option<String>,
    ) -> Option<ResultEntry> {
        debug_assert!(status.is_terminal(), "finish with non-terminal status");
        let mut state = self.lock();
        let mut entry = state.in_progress.remove(&id.0)?;
        entry.status = status;
        entry.message = message;
        state.completed.push(entry.clone());
        Some(entry)
    }

    /// Append an entry that is already terminal (dry run, worker unavailable).
    pub fn append(&self, entry: ResultEntry) {
        self.lock().completed.push(entry);
    }

    pub fn in_progress_count(&self) -> usize {
        self.lock().in_progress.len()
    }

    /// Highest number of entries that were `InProgress` at the same time.
    pub fn peak_in_progress(&self) -> usize {
        self.lock().peak_in_progress
    }

    /// Completed entries in completion order.
    pub fn snapshot(&self) -> Vec<ResultEntry> {
        self.lock().completed.clone()
    }

    pub fn into_results(self) -> Vec<ResultEntry> {
        self.state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .completed
    }
}
