//! CLI command handler: resolve options, scan files, run the batch, print results.

use anyhow::{Result, bail};
use log::{debug, info, warn};
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use crate::Opts;
use crate::batch::{BatchScheduler, resolve_max_workers};
use crate::encode::FfmpegPipeline;
use crate::engine::arg_parser::{Cli, Commands};
use crate::engine::progress::{KdamSink, LogSink, ProgressSink, notify_sink};
use crate::engine::report::{write_json, write_table};
use crate::engine::tools::collect_media_files;
use crate::types::{EncodeSettings, Operation};
use crate::utils::molex_toml::{apply_file_to_opts, config_dir_for, load_molex_toml};
use crate::utils::{CleanupRegistry, Executables, setup_logging};

/// Build Opts (defaults, then `.molexaudio.toml`, then flags) and set up logging.
/// A bad config file is reported once logging is up, then ignored.
fn setup_opts(cli: &Cli) -> Opts {
    let common = cli.command.common();
    let mut opts = Opts {
        path: common.path.clone(),
        operation: cli.command.operation(),
        dry_run: common.dry_run,
        workers: None,
        settings: EncodeSettings::default(),
        verbose: false,
        json: cli.json,
    };
    let file_cfg = load_molex_toml(config_dir_for(&common.path));
    if let Ok(Some(file)) = &file_cfg {
        apply_file_to_opts(file, &mut opts);
    }

    if common.workers.is_some() {
        opts.workers = common.workers.clone();
    }
    if let Commands::Normalize {
        target_i,
        target_tp,
        target_lra,
        ..
    } = &cli.command
    {
        let loudnorm = &mut opts.settings.loudnorm;
        loudnorm.integrated = target_i.unwrap_or(loudnorm.integrated);
        loudnorm.true_peak = target_tp.unwrap_or(loudnorm.true_peak);
        loudnorm.lra = target_lra.unwrap_or(loudnorm.lra);
    }
    opts.verbose |= cli.verbose;

    setup_logging(opts.verbose);
    if let Err(e) = file_cfg {
        warn!("{e:#}; ignoring config file");
    }
    opts
}

/// Reject arguments no task could succeed with, before anything is scheduled.
pub fn validate_opts(opts: &Opts) -> Result<()> {
    if !opts.path.exists() {
        bail!("Path does not exist: {}", opts.path.display());
    }
    if let Operation::Boost { percent } = opts.operation
        && (!percent.is_finite() || percent <= -100.0)
    {
        bail!("Boost percentage must be a number greater than -100 (got {percent})");
    }
    Ok(())
}

fn choose_sink(opts: &Opts, workers: usize, total: usize) -> Box<dyn ProgressSink> {
    if !opts.dry_run && io::stderr().is_terminal() {
        Box::new(KdamSink::new(workers.min(total), total))
    } else {
        Box::new(LogSink)
    }
}

/// Run normalize or boost over the requested path. Per-file failures only show in the results.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let opts = setup_opts(cli);
    debug!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_uppercase(),
        opts
    );
    validate_opts(&opts)?;

    let registry = CleanupRegistry::global();
    registry.install_interrupt_handler()?;

    let files: Vec<PathBuf> = collect_media_files(&opts.path)?;
    if files.is_empty() {
        warn!("No supported media files found in {}", opts.path.display());
        return Ok(());
    }
    if opts.dry_run {
        warn!("RUNNING IN DRY-RUN MODE. NO FILES WILL BE CHANGED.");
    }

    let max_workers = resolve_max_workers(opts.workers.as_deref());
    let sink = choose_sink(&opts, max_workers, files.len());
    let pipeline = FfmpegPipeline::new(Executables::discover(), opts.settings.clone(), registry);
    info!("{} {} file(s)", opts.operation.label(), files.len());

    let results = BatchScheduler::new(&pipeline, sink.as_ref(), max_workers).run(
        &files,
        opts.operation,
        opts.dry_run,
    );
    notify_sink(|| sink.finish());

    let mut out = io::stdout().lock();
    if opts.json {
        write_json(&mut out, &results)?;
    } else {
        let base = opts.path.is_dir().then_some(opts.path.as_path());
        write_table(&mut out, &results, base)?;
    }
    Ok(())
}
