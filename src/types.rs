//! Public and internal types for the molexaudio API and batch scheduler.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::utils::config::{AudioDefaults, LoudnormDefaults};

/// Which transformation a task applies to every audio stream of a file.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Operation {
    /// Two-pass EBU R128 loudness normalization.
    Normalize,
    /// Volume change by a percentage (negative values attenuate).
    Boost { percent: f64 },
}

impl Operation {
    /// Human label stored in [`ResultEntry::task`].
    pub fn label(&self) -> String {
        match self {
            Operation::Normalize => "normalize".to_string(),
            Operation::Boost { percent } => format!("Boost {percent}% Audio"),
        }
    }

    /// Message used when the pipeline reports failure without an explanation.
    pub fn default_failure_message(&self) -> &'static str {
        match self {
            Operation::Normalize => "Normalization failed",
            Operation::Boost { .. } => "Boost failed",
        }
    }
}

/// One file's requested operation. Immutable once enqueued.
#[derive(Clone, Debug, PartialEq)]
pub struct Task {
    pub file_path: PathBuf,
    pub operation: Operation,
    pub dry_run: bool,
}

/// Stage reported through the progress callback and shown by the presentation sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    Starting,
    Probing,
    Analyzing,
    ShowParams,
    Normalizing,
    Boosting,
    Finalizing,
    Success,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Starting => "starting",
            Stage::Probing => "probing",
            Stage::Analyzing => "analyzing",
            Stage::ShowParams => "show_params",
            Stage::Normalizing => "normalizing",
            Stage::Boosting => "boosting",
            Stage::Finalizing => "finalizing",
            Stage::Success => "success",
            Stage::Failed => "failed",
        }
    }

    /// True for the two stages that end a task.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Success | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One progress callback invocation: `(stage, last_line?, error)`.
#[derive(Clone, Copy, Debug)]
pub struct ProgressEvent<'a> {
    pub stage: Stage,
    pub last_line: Option<&'a str>,
    pub error: bool,
}

impl<'a> ProgressEvent<'a> {
    pub fn stage(stage: Stage) -> Self {
        Self {
            stage,
            last_line: None,
            error: false,
        }
    }

    pub fn line(stage: Stage, last_line: &'a str) -> Self {
        Self {
            stage,
            last_line: Some(last_line),
            error: false,
        }
    }

    pub fn error(stage: Stage, last_line: &'a str) -> Self {
        Self {
            stage,
            last_line: Some(last_line),
            error: true,
        }
    }
}

/// Status of a [`ResultEntry`]. `InProgress` is the only non-terminal value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ResultStatus {
    Success,
    Failed,
    DryRun,
    InProgress,
}

impl ResultStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ResultStatus::InProgress)
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResultStatus::Success => "Success",
            ResultStatus::Failed => "Failed",
            ResultStatus::DryRun => "Dry Run",
            ResultStatus::InProgress => "In Progress",
        };
        f.write_str(s)
    }
}

/// Outcome record of one file. Created `InProgress` when the task starts and moved to its
/// terminal status exactly once.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResultEntry {
    pub file: PathBuf,
    pub task: String,
    pub status: ResultStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Loudnorm targets: integrated loudness (LUFS), true peak (dBTP), loudness range (LU).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoudnormParams {
    pub integrated: f64,
    pub true_peak: f64,
    pub lra: f64,
}

impl Default for LoudnormParams {
    fn default() -> Self {
        Self {
            integrated: LoudnormDefaults::INTEGRATED,
            true_peak: LoudnormDefaults::TRUE_PEAK,
            lra: LoudnormDefaults::LRA,
        }
    }
}

/// Encoder settings shared by every task of a batch.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodeSettings {
    pub loudnorm: LoudnormParams,
    pub audio_codec: String,
    pub audio_bitrate: String,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            loudnorm: LoudnormParams::default(),
            audio_codec: AudioDefaults::CODEC.to_string(),
            audio_bitrate: AudioDefaults::BITRATE.to_string(),
        }
    }
}

/// Full options (CLI and config file), resolved before the batch starts.
#[derive(Clone, Debug)]
pub struct Opts {
    /// File or directory to process.
    pub path: PathBuf,
    pub operation: Operation,
    pub dry_run: bool,
    /// Raw `--workers` text; coerced by [`resolve_max_workers`](crate::batch::resolve_max_workers).
    pub workers: Option<String>,
    pub settings: EncodeSettings,
    pub verbose: bool,
    /// Print results as JSON instead of a table.
    pub json: bool,
}
