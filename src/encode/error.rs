use std::io;
use thiserror::Error;

/// Why a single task failed. Always converted into a `Failed` result entry at the task boundary.
#[derive(Debug, Error)]
pub enum TaskError {
    /// ffprobe failed or found no audio stream to work on.
    #[error("{0}")]
    Probe(String),

    /// The loudnorm analysis pass produced no usable measurement.
    #[error("Failed to get loudness data for stream {stream}: {reason}")]
    Analyze { stream: usize, reason: String },

    /// An external encode step exited unsuccessfully.
    #[error("{program} exited with {status}{}", last_line.as_deref().map(|l| format!(": {l}")).unwrap_or_default())]
    Encode {
        program: String,
        status: String,
        last_line: Option<String>,
    },

    /// The external program could not be started.
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),

    /// Renaming the finished output into place failed.
    #[error("{0}")]
    Finalize(String),

    /// The pipeline panicked; the payload message is kept.
    #[error("pipeline panicked: {0}")]
    Panicked(String),
}

pub type TaskResult<T> = std::result::Result<T, TaskError>;
