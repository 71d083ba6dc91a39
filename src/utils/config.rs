//! Application configuration constants.
//! Encoder defaults and thresholds in one place.

use std::sync::OnceLock;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    config_filename: String,
    env_prefix: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                config_filename: format!(".{pkg}.toml"),
                env_prefix: pkg.to_uppercase(),
            }
        })
    }

    /// Per-directory config file, e.g. `.molexaudio.toml`.
    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }

    /// Environment variable naming an executable override, e.g. `MOLEXAUDIO_FFMPEG`.
    pub fn exe_env_var(&self, program: &str) -> String {
        format!("{}_{}", self.env_prefix, program.to_uppercase())
    }
}

// ---- Worker threads ----

/// Worker count limits for the batch scheduler.
/// Use [`WorkerThreadLimits::current()`] to fill `all_threads` from rayon.
#[derive(Clone, Copy, Debug)]
pub struct WorkerThreadLimits {
    /// Detected logical cores; set by [`WorkerThreadLimits::current()`].
    pub all_threads: usize,
    /// Lowest worker count ever used.
    pub floor: usize,
}

impl Default for WorkerThreadLimits {
    fn default() -> Self {
        Self {
            all_threads: 0, // use current() to set from rayon
            floor: Self::FLOOR_THREADS,
        }
    }
}

impl WorkerThreadLimits {
    pub const FLOOR_THREADS: usize = 1;

    /// Build limits with `all_threads` set from `rayon::current_num_threads()`.
    pub fn current() -> Self {
        Self {
            all_threads: rayon::current_num_threads(),
            ..Self::default()
        }
    }

    /// Detected core count, never below the floor.
    pub fn detected(&self) -> usize {
        self.all_threads.max(self.floor)
    }
}

// ---- Encoder ----

/// EBU R128 loudnorm targets.
pub struct LoudnormDefaults;

impl LoudnormDefaults {
    /// Integrated loudness target (LUFS).
    pub const INTEGRATED: f64 = -16.0;
    /// True peak target (dBTP).
    pub const TRUE_PEAK: f64 = -1.5;
    /// Loudness range target (LU).
    pub const LRA: f64 = 11.0;
}

/// Output audio codec settings.
pub struct AudioDefaults;

impl AudioDefaults {
    pub const CODEC: &'static str = "ac3";
    pub const BITRATE: &'static str = "256k";
    /// Sample rate used when ffprobe does not report one.
    pub const SAMPLE_RATE: u32 = 48_000;
    /// Channel count used for `-ac` when no stream reports channels.
    pub const CHANNELS: u32 = 2;
}

/// Tag prefix written into rewritten track titles.
pub const TITLE_TAG: &str = "molexAudio";

// ---- Files ----

/// Inserted between file stem and extension for in-progress output.
pub const TEMP_SUFFIX: &str = "_temp_processing";

/// Media extensions picked up by a directory scan (compared case-insensitively).
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "flv", "wmv", "webm", "m4v", "mpg", "mpeg", "mp3", "wav", "flac",
    "ogg", "m4a", "wma", "aac",
];

// ---- Progress ----

/// Presentation tuning.
pub struct ProgressConsts;

impl ProgressConsts {
    /// Longest ffmpeg line shown in a slot bar postfix (chars).
    pub const MAX_LINE_CHARS: usize = 60;
}
