use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::types::Operation;

/// Batch loudness normalization and volume boost for media files (ffmpeg).
#[derive(Clone, Debug, Parser)]
#[command(name = "molexaudio", version)]
#[command(about = "Normalize loudness or boost volume of every audio track in a file or directory.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output (also logs every ffmpeg command and its stderr).
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Print results as JSON instead of a table.
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Two-pass EBU R128 loudness normalization of every audio stream.
    Normalize {
        #[command(flatten)]
        common: CommonArgs,

        /// Target integrated loudness in LUFS.
        #[arg(long, allow_negative_numbers = true)]
        target_i: Option<f64>,

        /// Target true peak in dBTP.
        #[arg(long, allow_negative_numbers = true)]
        target_tp: Option<f64>,

        /// Target loudness range in LU.
        #[arg(long)]
        target_lra: Option<f64>,
    },
    /// Change the volume of every audio stream by a percentage (negative attenuates).
    Boost {
        #[command(flatten)]
        common: CommonArgs,

        /// Volume change in percent, e.g. 50 for +50%, -25 for -25%.
        #[arg(value_name = "PERCENTAGE", allow_negative_numbers = true)]
        percentage: f64,
    },
}

/// Arguments shared by every subcommand.
#[derive(Clone, Debug, Args)]
pub struct CommonArgs {
    /// Media file or directory (scanned recursively).
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// List what would be processed; do not run ffmpeg or touch any file.
    #[arg(long)]
    pub dry_run: bool,

    /// Maximum files processed at once. Default: logical CPU count.
    #[arg(long, short = 'w', value_name = "N", allow_negative_numbers = true)]
    pub workers: Option<String>,
}

impl Commands {
    pub fn common(&self) -> &CommonArgs {
        match self {
            Commands::Normalize { common, .. } | Commands::Boost { common, .. } => common,
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            Commands::Normalize { .. } => Operation::Normalize,
            Commands::Boost { percentage, .. } => Operation::Boost {
                percent: *percentage,
            },
        }
    }
}
