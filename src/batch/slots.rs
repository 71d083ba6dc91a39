//! Worker slots: one per worker thread, reused across tasks for the whole batch.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::types::Stage;

#[derive(Clone, Debug, PartialEq)]
pub struct WorkerSlot {
    pub slot_index: usize,
    pub busy: bool,
    pub current_file: Option<PathBuf>,
    pub current_stage: Option<Stage>,
}

impl WorkerSlot {
    fn idle(slot_index: usize) -> Self {
        Self {
            slot_index,
            busy: false,
            current_file: None,
            current_stage: None,
        }
    }
}

/// Shared view of all slots. Busy count and its peak are tracked atomically.
#[derive(Debug)]
pub struct SlotBoard {
    slots: Mutex<Vec<WorkerSlot>>,
    busy: AtomicUsize,
    peak_busy: AtomicUsize,
}

impl SlotBoard {
    pub fn new(count: usize) -> Self {
        Self {
            slots: Mutex::new((0..count).map(WorkerSlot::idle).collect()),
            busy: AtomicUsize::new(0),
            peak_busy: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<WorkerSlot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mark `index` busy with `file`. The slot is released when the guard drops, on every exit path.
    pub fn claim(&self, index: usize, file: &Path) -> SlotGuard<'_> {
        {
            let mut slots = self.lock();
            if let Some(slot) = slots.get_mut(index) {
                debug_assert!(!slot.busy, "slot {index} claimed twice");
                slot.busy = true;
                slot.current_file = Some(file.to_path_buf());
                slot.current_stage = Some(Stage::Starting);
            }
        }
        let now = self.busy.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_busy.fetch_max(now, Ordering::SeqCst);
        SlotGuard { board: self, index }
    }

    pub fn set_stage(&self, index: usize, stage: Stage) {
        if let Some(slot) = self.lock().get_mut(index) {
            slot.current_stage = Some(stage);
        }
    }

    fn release(&self, index: usize) {
        if let Some(slot) = self.lock().get_mut(index) {
            *slot = WorkerSlot::idle(index);
        }
        self.busy.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn busy_count(&self) -> usize {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn peak_busy(&self) -> usize {
        self.peak_busy.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Vec<WorkerSlot> {
        self.lock().clone()
    }
}

/// A claimed slot; dropping it marks the slot idle again.
#[derive(Debug)]
pub struct SlotGuard<'a> {
    board: &'a SlotBoard,
    index: usize,
}

impl SlotGuard<'_> {
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.board.release(self.index);
    }
}
