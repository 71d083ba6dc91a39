//! Concurrent batch processing: scheduler, worker slots, task queue, result collector.

pub mod collector;
pub mod queue;
pub mod scheduler;
pub mod slots;
pub mod task;

pub use collector::{EntryId, ResultCollector};
pub use queue::TaskQueue;
pub use scheduler::BatchScheduler;
pub use slots::{SlotBoard, SlotGuard, WorkerSlot};
pub use task::{TaskContext, execute_task, interpret_outcome};

use log::warn;

use crate::utils::config::WorkerThreadLimits;

/// Coerce a requested worker count: positive integer → used, zero or negative → 1,
/// missing → detected logical cores, unparsable → detected logical cores (with a warning).
pub fn resolve_max_workers(raw: Option<&str>) -> usize {
    let limits = WorkerThreadLimits::current();
    let detected = limits.detected();
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return detected;
    };
    match raw.parse::<i64>() {
        Ok(n) if n > 0 => usize::try_from(n).unwrap_or(detected),
        Ok(_) => limits.floor,
        Err(_) => {
            warn!("Invalid worker count {raw:?}; using {detected} (logical cores)");
            detected
        }
    }
}
