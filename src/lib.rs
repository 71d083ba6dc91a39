//! molexaudio: concurrent batch loudness normalization and volume boost for media files

pub mod batch;
pub mod encode;
pub mod engine;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use batch::{BatchScheduler, resolve_max_workers};
pub use encode::{EncodePipeline, FfmpegPipeline, PipelineOutcome, TaskError};
pub use engine::progress::{NullSink, ProgressSink};
pub use utils::CleanupRegistry;

use log::debug;
use std::path::PathBuf;

/// Result alias used by public molexaudio API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Single entry point: run `operation` over `files` with the ffmpeg pipeline and return one
/// [`ResultEntry`] per file in completion order.
///
/// - **`workers`** is coerced like the `--workers` flag (see [`resolve_max_workers`]).
/// - **`sink: None`** → no progress output. Pass a sink to receive per-slot stage events.
///
/// Temp files and ffmpeg children go through [`CleanupRegistry::global`]; install its interrupt
/// handler yourself if the process should clean up on Ctrl+C.
pub fn run_batch(
    files: &[PathBuf],
    operation: Operation,
    dry_run: bool,
    workers: Option<&str>,
    settings: EncodeSettings,
    sink: Option<&dyn ProgressSink>,
) -> Vec<ResultEntry> {
    let max_workers = resolve_max_workers(workers);
    debug!(
        "{} batch: {} file(s), {} worker(s), {:?}",
        env!("CARGO_PKG_NAME").to_uppercase(),
        files.len(),
        max_workers,
        settings
    );
    let pipeline = FfmpegPipeline::new(
        utils::Executables::discover(),
        settings,
        CleanupRegistry::global(),
    );
    let sink = sink.unwrap_or(&NullSink);
    BatchScheduler::new(&pipeline, sink, max_workers).run(files, operation, dry_run)
}
