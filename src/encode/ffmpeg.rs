//! ffmpeg-backed [`EncodePipeline`]: two-pass loudnorm and volume boost.

use log::info;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use super::error::{TaskError, TaskResult};
use super::filters::{
    EncodeArgs, build_encode_args, boost_filter_graph, extract_loudnorm_json,
    loudnorm_analysis_filter, max_channels, normalize_filter_graph, original_title,
    update_track_title,
};
use super::probe::{AudioStream, probe_audio_streams, probe_has_video};
use super::runner::{StreamedRun, run_streaming, status_text};
use super::{EncodePipeline, PipelineOutcome, ProgressFn};
use crate::types::{EncodeSettings, Operation, ProgressEvent, Stage, Task};
use crate::utils::{CleanupRegistry, Executables, temp_path_for};

/// Filter graph and mapping for the final encode pass.
struct EncodePlan {
    filter_graph: String,
    titles: Vec<String>,
    has_video: bool,
    channels: Option<u32>,
    stage: Stage,
}

pub struct FfmpegPipeline {
    exes: Executables,
    settings: EncodeSettings,
    registry: Arc<CleanupRegistry>,
}

impl FfmpegPipeline {
    pub fn new(exes: Executables, settings: EncodeSettings, registry: Arc<CleanupRegistry>) -> Self {
        Self {
            exes,
            settings,
            registry,
        }
    }

    fn ffmpeg(&self) -> Command {
        Command::new(&self.exes.ffmpeg)
    }

    fn probe(
        &self,
        path: &Path,
        progress: &ProgressFn<'_>,
    ) -> TaskResult<(Vec<AudioStream>, bool)> {
        progress(ProgressEvent::stage(Stage::Probing));
        let streams = probe_audio_streams(&self.exes, &self.registry, path)?;
        info!("Found {} audio stream(s) in {}", streams.len(), path.display());
        let has_video = probe_has_video(&self.exes, &self.registry, path)?;
        Ok((streams, has_video))
    }

    /// Run one ffmpeg pass, forwarding stderr lines as `stage` progress. Non-zero exit is an error.
    fn run_pass(
        &self,
        mut cmd: Command,
        stage: Stage,
        progress: &ProgressFn<'_>,
    ) -> TaskResult<StreamedRun> {
        let run = run_streaming(&mut cmd, &self.registry, |line| {
            progress(ProgressEvent::line(stage, line))
        })?;
        if !run.status.success() {
            return Err(TaskError::Encode {
                program: "ffmpeg".to_string(),
                status: status_text(&run.status),
                last_line: run.last_line().map(str::to_string),
            });
        }
        Ok(run)
    }

    /// Encode into the registered temp path and rename over the input. The temp file is removed
    /// (and unregistered) on every failure path by the guard.
    fn encode_into_place(
        &self,
        path: &Path,
        plan: EncodePlan,
        progress: &ProgressFn<'_>,
    ) -> TaskResult<()> {
        let temp = self.registry.track_temp_file(temp_path_for(path))?;
        let args = build_encode_args(&EncodeArgs {
            input: path,
            output: temp.path(),
            filter_graph: &plan.filter_graph,
            titles: &plan.titles,
            has_video: plan.has_video,
            settings: &self.settings,
            channels: plan.channels,
        });
        let mut cmd = self.ffmpeg();
        cmd.args(&args);
        progress(ProgressEvent::stage(plan.stage));
        self.run_pass(cmd, plan.stage, progress)?;

        progress(ProgressEvent::stage(Stage::Finalizing));
        temp.finalize(path)
            .map_err(|e| TaskError::Finalize(format!("{e:#}")))
    }

    fn normalize(&self, path: &Path, progress: &ProgressFn<'_>) -> TaskResult<PipelineOutcome> {
        let (streams, has_video) = self.probe(path, progress)?;
        let params = &self.settings.loudnorm;

        let mut measured = Vec::with_capacity(streams.len());
        for i in 0..streams.len() {
            let label = format!("Stream {}...", i + 1);
            progress(ProgressEvent::line(Stage::Analyzing, &label));
            let map = format!("0:a:{i}");
            let filter = loudnorm_analysis_filter(params);
            let mut cmd = self.ffmpeg();
            cmd.args(["-hide_banner", "-i"])
                .arg(path)
                .args(["-threads", "0", "-map", map.as_str()])
                .args(["-af", filter.as_str()])
                .args(["-f", "null", "-"]);
            let run = self.run_pass(cmd, Stage::Analyzing, progress)?;
            let m = extract_loudnorm_json(&run.transcript()).ok_or_else(|| TaskError::Analyze {
                stream: i,
                reason: "no loudnorm JSON in ffmpeg output".to_string(),
            })?;
            measured.push(m);
        }
        progress(ProgressEvent::stage(Stage::ShowParams));

        let plan = EncodePlan {
            filter_graph: normalize_filter_graph(params, &measured),
            titles: streams
                .iter()
                .enumerate()
                .map(|(i, s)| update_track_title(&original_title(s, i), "Normalized", ""))
                .collect(),
            has_video,
            channels: None,
            stage: Stage::Normalizing,
        };
        self.encode_into_place(path, plan, progress)?;
        info!("Normalization complete: {}", path.display());
        Ok(PipelineOutcome::success())
    }

    fn boost(
        &self,
        path: &Path,
        percent: f64,
        progress: &ProgressFn<'_>,
    ) -> TaskResult<PipelineOutcome> {
        info!("Starting volume boost ({percent}%): {}", path.display());
        let (streams, has_video) = self.probe(path, progress)?;

        let extra = format!("{percent}%");
        let plan = EncodePlan {
            filter_graph: boost_filter_graph(&streams, percent),
            titles: streams
                .iter()
                .enumerate()
                .map(|(i, s)| update_track_title(&original_title(s, i), "Boosted", &extra))
                .collect(),
            has_video,
            channels: Some(max_channels(&streams)),
            stage: Stage::Boosting,
        };
        self.encode_into_place(path, plan, progress)?;
        info!("Boost complete: {}", path.display());
        Ok(PipelineOutcome::success())
    }
}

impl EncodePipeline for FfmpegPipeline {
    fn process(&self, task: &Task, progress: &ProgressFn<'_>) -> TaskResult<PipelineOutcome> {
        match task.operation {
            Operation::Normalize => self.normalize(&task.file_path, progress),
            Operation::Boost { percent } => self.boost(&task.file_path, percent, progress),
        }
    }
}
