//! Batch scheduler: a fixed set of worker threads (one per slot) draining a FIFO task queue.

use log::{debug, info, warn};
use std::path::PathBuf;
use std::thread;

use super::collector::ResultCollector;
use super::queue::TaskQueue;
use super::slots::SlotBoard;
use super::task::{TaskContext, execute_task};
use crate::encode::EncodePipeline;
use crate::engine::progress::{ProgressSink, notify_sink};
use crate::types::{Operation, ResultEntry, ResultStatus, Task};

pub struct BatchScheduler<'a> {
    pipeline: &'a dyn EncodePipeline,
    sink: &'a dyn ProgressSink,
    max_workers: usize,
}

fn dry_run_message(operation: &Operation) -> String {
    match operation {
        Operation::Normalize => "Dry Run: would normalize loudness".to_string(),
        Operation::Boost { percent } => format!("Dry Run: would boost volume by {percent}%"),
    }
}

/// One worker thread: owns `slot` for the whole batch and takes tasks until the queue is drained.
fn worker_loop(slot: usize, queue: &TaskQueue, ctx: &TaskContext<'_>) {
    while let Some(task) = queue.pop() {
        execute_task(&task, slot, ctx);
    }
    debug!("slot {slot}: queue drained");
}

impl<'a> BatchScheduler<'a> {
    /// `max_workers` is clamped to at least 1.
    pub fn new(
        pipeline: &'a dyn EncodePipeline,
        sink: &'a dyn ProgressSink,
        max_workers: usize,
    ) -> Self {
        Self {
            pipeline,
            sink,
            max_workers: max_workers.max(1),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Number of worker threads a batch of `file_count` files uses.
    pub fn worker_count_for(&self, file_count: usize) -> usize {
        self.max_workers.min(file_count)
    }

    /// Process `files` and return one entry per file, in completion order.
    ///
    /// - Empty `files` returns immediately without starting a thread.
    /// - `dry_run` resolves every file to `DryRun` without touching the pipeline or any slot.
    /// - Otherwise at most `max_workers` tasks run at once; a failing or panicking task only
    ///   affects its own entry.
    pub fn run(&self, files: &[PathBuf], operation: Operation, dry_run: bool) -> Vec<ResultEntry> {
        if files.is_empty() {
            return Vec::new();
        }
        let collector = ResultCollector::new();

        if dry_run {
            for file in files {
                info!("Dry run: {} {}", operation.label(), file.display());
                let entry = ResultEntry {
                    file: file.clone(),
                    task: operation.label(),
                    status: ResultStatus::DryRun,
                    message: Some(dry_run_message(&operation)),
                };
                notify_sink(|| self.sink.task_completed(None, &entry));
                collector.append(entry);
            }
            return collector.into_results();
        }

        let queue = TaskQueue::new(files.iter().map(|file| Task {
            file_path: file.clone(),
            operation,
            dry_run,
        }));
        let worker_count = self.worker_count_for(files.len());
        let board = SlotBoard::new(worker_count);
        info!(
            "Processing {} file(s) with {} worker(s)",
            files.len(),
            worker_count
        );

        let ctx = TaskContext {
            pipeline: self.pipeline,
            sink: self.sink,
            board: &board,
            collector: &collector,
        };
        thread::scope(|scope| {
            let (queue, ctx) = (&queue, &ctx);
            for slot in 0..worker_count {
                let spawned = thread::Builder::new()
                    .name(format!("{}-slot-{slot}", env!("CARGO_PKG_NAME")))
                    .spawn_scoped(scope, move || worker_loop(slot, queue, ctx));
                if let Err(e) = spawned {
                    warn!("could not start worker thread for slot {slot}: {e}");
                }
            }
        });

        // Only non-empty when no worker thread could be started at all.
        for task in queue.drain() {
            collector.append(ResultEntry {
                file: task.file_path,
                task: task.operation.label(),
                status: ResultStatus::Failed,
                message: Some("no worker thread available".to_string()),
            });
        }
        debug!(
            "batch done: peak {} busy slot(s), peak {} in progress",
            board.peak_busy(),
            collector.peak_in_progress()
        );
        collector.into_results()
    }
}
