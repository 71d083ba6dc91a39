//! ffmpeg filter graphs, argument lists and track titles. Pure functions, no process spawning.

use regex::Regex;
use serde::Deserialize;
use std::path::Path;
use std::sync::LazyLock;

use super::probe::AudioStream;
use crate::types::{EncodeSettings, LoudnormParams};
use crate::utils::config::{AudioDefaults, TITLE_TAG};

static TITLE_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\[{TITLE_TAG} (Normalized|Boosted [^\]]+)\] ?"))
        .expect("title tag pattern is valid")
});

/// Measured values printed by the loudnorm analysis pass. ffmpeg prints numbers as strings.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct LoudnormMeasurement {
    pub input_i: String,
    pub input_tp: String,
    pub input_lra: String,
    pub input_thresh: String,
    #[serde(default)]
    pub target_offset: Option<String>,
}

/// Pull the loudnorm JSON object out of an analysis transcript (first `{` to last `}`).
pub fn extract_loudnorm_json(stderr: &str) -> Option<LoudnormMeasurement> {
    let start = stderr.find('{')?;
    let end = stderr.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&stderr[start..=end]).ok()
}

fn loudnorm_targets(p: &LoudnormParams) -> String {
    format!("I={}:TP={}:LRA={}", p.integrated, p.true_peak, p.lra)
}

/// `-af` value for the analysis pass of one stream.
pub fn loudnorm_analysis_filter(params: &LoudnormParams) -> String {
    format!("loudnorm={}:print_format=json", loudnorm_targets(params))
}

/// `-filter_complex` for the normalize encode: one measured loudnorm per stream, labelled `[a<i>]`.
pub fn normalize_filter_graph(params: &LoudnormParams, measured: &[LoudnormMeasurement]) -> String {
    measured
        .iter()
        .enumerate()
        .map(|(i, m)| {
            format!(
                "[0:a:{i}]loudnorm={}:measured_I={}:measured_TP={}:measured_LRA={}:measured_thresh={}:offset={}[a{i}]",
                loudnorm_targets(params),
                m.input_i,
                m.input_tp,
                m.input_lra,
                m.input_thresh,
                m.target_offset.as_deref().unwrap_or("0"),
            )
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// Linear gain for a percentage change (`10` → `1.1`, `-10` → `0.9`).
pub fn volume_multiplier(percent: f64) -> f64 {
    1.0 + percent / 100.0
}

pub fn channels_to_layout(channels: u32) -> &'static str {
    match channels {
        1 => "mono",
        2 => "stereo",
        6 => "5.1",
        8 => "7.1",
        _ => "stereo",
    }
}

/// `-filter_complex` for the boost encode: format each stream then apply the gain.
pub fn boost_filter_graph(streams: &[AudioStream], percent: f64) -> String {
    let multiplier = volume_multiplier(percent);
    streams
        .iter()
        .enumerate()
        .map(|(i, s)| {
            format!(
                "[0:a:{i}]aformat=channel_layouts={}:sample_fmts=s16:sample_rates={},volume={multiplier}[a{i}]",
                channels_to_layout(s.channels),
                s.sample_rate.unwrap_or(AudioDefaults::SAMPLE_RATE),
            )
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// Highest reported channel count, or the default when none is reported.
pub fn max_channels(streams: &[AudioStream]) -> u32 {
    match streams.iter().map(|s| s.channels).max() {
        Some(n) if n > 0 => n,
        _ => AudioDefaults::CHANNELS,
    }
}

/// `[molexAudio <operation> <extra>] <title>`, replacing any tag a previous run added.
pub fn update_track_title(original: &str, operation: &str, extra: &str) -> String {
    let cleaned = TITLE_TAG_RE.replace_all(original, "");
    let tag = if extra.is_empty() {
        format!("[{TITLE_TAG} {operation}]")
    } else {
        format!("[{TITLE_TAG} {operation} {extra}]")
    };
    format!("{tag} {}", cleaned.trim()).trim().to_string()
}

/// Title of stream `i` before rewriting (`Track <i+1>` when untitled).
pub fn original_title(stream: &AudioStream, i: usize) -> String {
    stream
        .title
        .clone()
        .unwrap_or_else(|| format!("Track {}", i + 1))
}

/// Everything needed to build the final encode argument list.
pub struct EncodeArgs<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub filter_graph: &'a str,
    pub titles: &'a [String],
    pub has_video: bool,
    pub settings: &'a EncodeSettings,
    /// `-ac` override (boost only).
    pub channels: Option<u32>,
}

/// ffmpeg arguments (without the program) for the encode pass. Video and subtitles are copied.
pub fn build_encode_args(a: &EncodeArgs<'_>) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-hide_banner".into(),
        "-i".into(),
        a.input.to_string_lossy().into_owned(),
        "-threads".into(),
        "0".into(),
        "-filter_complex".into(),
        a.filter_graph.to_string(),
    ];
    if a.has_video {
        args.extend(["-map".into(), "0:v".into()]);
    }
    for (i, title) in a.titles.iter().enumerate() {
        args.extend([
            "-map".into(),
            format!("[a{i}]"),
            format!("-metadata:s:a:{i}"),
            format!("title={title}"),
        ]);
    }
    args.extend(["-map".into(), "0:s?".into()]);
    args.extend([
        "-c:v".into(),
        "copy".into(),
        "-c:s".into(),
        "copy".into(),
        "-c:a".into(),
        a.settings.audio_codec.clone(),
        "-b:a".into(),
        a.settings.audio_bitrate.clone(),
    ]);
    if let Some(ch) = a.channels {
        args.extend(["-ac".into(), ch.to_string()]);
    }
    args.push(a.output.to_string_lossy().into_owned());
    args
}
