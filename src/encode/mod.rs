//! Encode pipeline boundary: the trait the scheduler calls per task, and the ffmpeg implementation.

pub mod error;
pub mod ffmpeg;
pub mod filters;
pub mod probe;
pub mod runner;

pub use error::{TaskError, TaskResult};
pub use ffmpeg::FfmpegPipeline;
pub use probe::AudioStream;

use crate::types::{ProgressEvent, Task};

/// Progress callback handed to the pipeline: `(stage, last_line?, error)`. Never fails.
pub type ProgressFn<'a> = dyn Fn(ProgressEvent<'_>) + 'a;

/// What the pipeline reports for a task that did not raise.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PipelineOutcome {
    pub success: bool,
    pub message: Option<String>,
}

impl PipelineOutcome {
    pub fn success() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn failure(message: Option<String>) -> Self {
        Self {
            success: false,
            message,
        }
    }
}

/// Performs the work for one task, blocking until the external encode finishes.
/// Temp outputs and child processes must go through the cleanup registry.
pub trait EncodePipeline: Send + Sync {
    fn process(&self, task: &Task, progress: &ProgressFn<'_>) -> TaskResult<PipelineOutcome>;
}
