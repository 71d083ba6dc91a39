//! Execution of one task inside a claimed slot.

use log::warn;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use super::collector::ResultCollector;
use super::slots::SlotBoard;
use crate::encode::{EncodePipeline, PipelineOutcome, ProgressFn, TaskError, TaskResult};
use crate::engine::progress::{ProgressSink, notify_sink};
use crate::types::{Operation, ProgressEvent, ResultEntry, ResultStatus, Stage, Task};

/// Shared state every worker needs to run a task.
pub struct TaskContext<'a> {
    pub pipeline: &'a dyn EncodePipeline,
    pub sink: &'a dyn ProgressSink,
    pub board: &'a SlotBoard,
    pub collector: &'a ResultCollector,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Map what the pipeline returned (or raised) to a terminal status and message.
pub fn interpret_outcome(
    operation: &Operation,
    outcome: TaskResult<PipelineOutcome>,
) -> (ResultStatus, Option<String>) {
    match outcome {
        Ok(PipelineOutcome {
            success: true,
            message,
        }) => (ResultStatus::Success, message),
        Ok(PipelineOutcome {
            success: false,
            message,
        }) => (
            ResultStatus::Failed,
            Some(message.unwrap_or_else(|| operation.default_failure_message().to_string())),
        ),
        Err(e) => (ResultStatus::Failed, Some(e.to_string())),
    }
}

/// Run `task` in `slot`. Never fails: pipeline errors and panics become a `Failed` entry.
/// The slot is released when this returns, whatever happened.
pub fn execute_task(task: &Task, slot: usize, ctx: &TaskContext<'_>) -> Option<ResultEntry> {
    let _slot = ctx.board.claim(slot, &task.file_path);
    let id = ctx.collector.start(&task.file_path, task.operation.label());

    notify_sink(|| ctx.sink.task_started(slot, task));
    notify_sink(|| ctx.sink.update(slot, ProgressEvent::stage(Stage::Starting)));

    let progress: &ProgressFn<'_> = &|event: ProgressEvent<'_>| {
        ctx.board.set_stage(slot, event.stage);
        notify_sink(|| ctx.sink.update(slot, event));
    };
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| ctx.pipeline.process(task, progress)))
        .unwrap_or_else(|payload| Err(TaskError::Panicked(panic_message(payload.as_ref()))));

    let (status, message) = interpret_outcome(&task.operation, outcome);
    match status {
        ResultStatus::Success => progress(ProgressEvent::stage(Stage::Success)),
        _ => {
            let msg = message.as_deref().unwrap_or_default();
            warn!(
                "{} failed for {}: {}",
                task.operation.label(),
                task.file_path.display(),
                msg
            );
            progress(ProgressEvent::error(Stage::Failed, msg));
        }
    }

    let entry = ctx.collector.finish(id, status, message)?;
    notify_sink(|| ctx.sink.task_completed(Some(slot), &entry));
    Some(entry)
}
