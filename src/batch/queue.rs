use crossbeam_channel::{Receiver, unbounded};

use crate::types::Task;

/// FIFO of pending tasks shared by all worker threads. Filled once up front and closed, so
/// [`pop`](Self::pop) returns `None` when drained. Each task is received by exactly one worker.
pub struct TaskQueue {
    rx: Receiver<Task>,
}

impl TaskQueue {
    pub fn new(tasks: impl IntoIterator<Item = Task>) -> Self {
        let (tx, rx) = unbounded::<Task>();
        for task in tasks {
            // Receiver is alive in this scope, send cannot fail.
            let _ = tx.send(task);
        }
        // Dropping the only sender closes the channel so workers exit once it is empty.
        drop(tx);
        Self { rx }
    }

    /// Next task in input order, or `None` when the queue is drained.
    pub fn pop(&self) -> Option<Task> {
        self.rx.recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Take every task no worker picked up.
    pub fn drain(&self) -> Vec<Task> {
        self.rx.try_iter().collect()
    }
}
