//! ffprobe stream discovery with fallbacks for containers that hide stream details.

use log::{error, info};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::process::Command;

use super::error::{TaskError, TaskResult};
use super::runner::run_captured;
use crate::utils::{CleanupRegistry, Executables};

/// One audio stream as far as the encoder cares.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AudioStream {
    pub index: u32,
    pub codec_name: Option<String>,
    /// 0 when ffprobe did not report it.
    pub channels: u32,
    pub sample_rate: Option<u32>,
    pub title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<RawStream>,
}

#[derive(Debug, Deserialize)]
struct RawStream {
    index: Option<u32>,
    codec_name: Option<String>,
    channels: Option<u32>,
    sample_rate: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

impl From<RawStream> for AudioStream {
    fn from(raw: RawStream) -> Self {
        let title = raw
            .tags
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("title"))
            .map(|(_, v)| v.clone());
        AudioStream {
            index: raw.index.unwrap_or(0),
            codec_name: raw.codec_name,
            channels: raw.channels.unwrap_or(0),
            sample_rate: raw.sample_rate.and_then(|s| s.trim().parse().ok()),
            title,
        }
    }
}

/// Parse `ffprobe -print_format json` output into streams.
pub fn parse_streams_json(json: &str) -> Result<Vec<AudioStream>, serde_json::Error> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    let out: ProbeOutput = serde_json::from_str(json)?;
    Ok(out.streams.into_iter().map(AudioStream::from).collect())
}

/// Placeholder streams for `-of csv=p=0` output (one stream index per line).
pub fn placeholder_streams_from_csv(csv: &str) -> Vec<AudioStream> {
    csv.lines()
        .filter(|l| !l.trim().is_empty())
        .enumerate()
        .map(|(i, _)| AudioStream {
            index: i as u32,
            ..AudioStream::default()
        })
        .collect()
}

fn ffprobe(exes: &Executables) -> Command {
    let mut cmd = Command::new(&exes.ffprobe);
    cmd.arg("-hide_banner");
    cmd
}

fn probe_json(
    exes: &Executables,
    registry: &CleanupRegistry,
    media_path: &Path,
    select: &str,
) -> TaskResult<Vec<AudioStream>> {
    let mut cmd = ffprobe(exes);
    cmd.args(["-loglevel", "quiet", "-show_streams", "-select_streams", select])
        .args(["-print_format", "json", "-i"])
        .arg(media_path);
    let stdout = run_captured(&mut cmd, registry)?;
    parse_streams_json(&stdout).map_err(|e| TaskError::Probe(format!("ffprobe output: {e}")))
}

fn probe_entries_fallback(
    exes: &Executables,
    registry: &CleanupRegistry,
    media_path: &Path,
) -> TaskResult<Vec<AudioStream>> {
    let mut cmd = ffprobe(exes);
    cmd.args(["-v", "error", "-select_streams", "a"])
        .args([
            "-show_entries",
            "stream=index,codec_name,channels,sample_rate:stream_tags",
        ])
        .args(["-print_format", "json"])
        .arg(media_path);
    let stdout = run_captured(&mut cmd, registry)?;
    parse_streams_json(&stdout).map_err(|e| TaskError::Probe(format!("ffprobe output: {e}")))
}

fn probe_count_fallback(
    exes: &Executables,
    registry: &CleanupRegistry,
    media_path: &Path,
) -> TaskResult<Vec<AudioStream>> {
    let mut cmd = ffprobe(exes);
    cmd.args(["-v", "error", "-select_streams", "a"])
        .args(["-show_entries", "stream=index", "-of", "csv=p=0"])
        .arg(media_path);
    let stdout = run_captured(&mut cmd, registry)?;
    Ok(placeholder_streams_from_csv(&stdout))
}

/// Audio streams of `media_path`. Tries the full JSON listing, then a reduced entry listing, then a
/// plain index count (placeholder streams). An empty result is a [`TaskError::Probe`].
pub fn probe_audio_streams(
    exes: &Executables,
    registry: &CleanupRegistry,
    media_path: &Path,
) -> TaskResult<Vec<AudioStream>> {
    let streams = probe_json(exes, registry, media_path, "a").inspect_err(|e| {
        error!("ffprobe failed for {}: {}", media_path.display(), e);
    })?;
    if !streams.is_empty() {
        return Ok(streams);
    }

    let streams = probe_entries_fallback(exes, registry, media_path).unwrap_or_default();
    if !streams.is_empty() {
        info!(
            "ffprobe fallback returned {} audio streams for {}",
            streams.len(),
            media_path.display()
        );
        return Ok(streams);
    }

    let streams = probe_count_fallback(exes, registry, media_path).unwrap_or_default();
    if !streams.is_empty() {
        info!(
            "Creating {} placeholder audio stream entries for {}",
            streams.len(),
            media_path.display()
        );
        return Ok(streams);
    }
    Err(TaskError::Probe("No audio streams found".to_string()))
}

/// True when `media_path` has at least one video stream.
pub fn probe_has_video(
    exes: &Executables,
    registry: &CleanupRegistry,
    media_path: &Path,
) -> TaskResult<bool> {
    Ok(!probe_json(exes, registry, media_path, "v")?.is_empty())
}
