//! Presentation sinks: receive per-slot stage events. Rendering problems never reach the scheduler.

use anyhow::{Result, anyhow};
use kdam::{Animation, Bar, BarExt};
use log::debug;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::types::{ProgressEvent, ResultEntry, ResultStatus, Task};
use crate::utils::config::ProgressConsts;

/// Receives progress for each worker slot. Errors are reported back but always discarded by the
/// caller, so implementations may fail freely.
pub trait ProgressSink: Send + Sync {
    /// A slot picked up `task`.
    fn task_started(&self, _slot: usize, _task: &Task) -> Result<()> {
        Ok(())
    }

    /// Stage transition or a new line of external-process output for `slot`.
    fn update(&self, slot: usize, event: ProgressEvent<'_>) -> Result<()>;

    /// A task reached its terminal entry. `slot` is `None` for tasks resolved without a slot (dry run).
    fn task_completed(&self, _slot: Option<usize>, _entry: &ResultEntry) -> Result<()> {
        Ok(())
    }

    /// The batch is over; flush whatever is on screen.
    fn finish(&self) -> Result<()> {
        Ok(())
    }
}

/// Call into a sink, discarding both errors and panics.
pub fn notify_sink(call: impl FnOnce() -> Result<()>) {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("progress sink error ignored: {e:#}"),
        Err(_) => debug!("progress sink panicked; ignored"),
    }
}

/// Sink that shows nothing.
#[derive(Debug, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn update(&self, _slot: usize, _event: ProgressEvent<'_>) -> Result<()> {
        Ok(())
    }
}

/// Sink that logs stage transitions at debug level (non-terminal stderr).
#[derive(Debug, Default)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn task_started(&self, slot: usize, task: &Task) -> Result<()> {
        debug!("[slot {slot}] {} {}", task.operation.label(), task.file_path.display());
        Ok(())
    }

    fn update(&self, slot: usize, event: ProgressEvent<'_>) -> Result<()> {
        // Output lines are already logged with the ffmpeg transcript; only log transitions.
        if event.last_line.is_none() || event.error {
            debug!(
                "[slot {slot}] {}{}",
                event.stage,
                event.last_line.map(|l| format!(": {l}")).unwrap_or_default()
            );
        }
        Ok(())
    }

    fn task_completed(&self, _slot: Option<usize>, entry: &ResultEntry) -> Result<()> {
        debug!("{} {}: {}", entry.task, entry.file.display(), entry.status);
        Ok(())
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

/// Live terminal display: an overall bar plus one line per worker slot.
pub struct KdamSink {
    overall: Mutex<Bar>,
    slots: Vec<Mutex<Bar>>,
}

impl KdamSink {
    pub fn new(slot_count: usize, total_files: usize) -> Self {
        let overall = kdam::tqdm!(
            total = total_files,
            desc = "Processing",
            animation = Animation::Classic,
            position = 0,
            unit = " files"
        );
        let slots = (0..slot_count)
            .map(|i| {
                Mutex::new(kdam::tqdm!(
                    total = 0,
                    desc = format!("slot {}", i + 1),
                    position = (i + 1) as u16,
                    leave = false
                ))
            })
            .collect();
        Self {
            overall: Mutex::new(overall),
            slots,
        }
    }

    fn slot(&self, slot: usize) -> Result<MutexGuard<'_, Bar>> {
        self.slots
            .get(slot)
            .ok_or_else(|| anyhow!("no progress bar for slot {slot}"))?
            .try_lock()
            .map_err(|_| anyhow!("progress bar for slot {slot} busy"))
    }
}

impl ProgressSink for KdamSink {
    fn task_started(&self, slot: usize, task: &Task) -> Result<()> {
        let mut bar = self.slot(slot)?;
        bar.set_description(file_label(&task.file_path));
        bar.set_postfix("pending");
        bar.refresh()?;
        Ok(())
    }

    fn update(&self, slot: usize, event: ProgressEvent<'_>) -> Result<()> {
        let mut bar = self.slot(slot)?;
        let postfix = match event.last_line {
            Some(line) => format!(
                "{} | {}",
                event.stage,
                truncate_chars(line, ProgressConsts::MAX_LINE_CHARS)
            ),
            None => event.stage.to_string(),
        };
        bar.set_postfix(if event.error {
            format!("ERROR {postfix}")
        } else {
            postfix
        });
        bar.refresh()?;
        Ok(())
    }

    fn task_completed(&self, slot: Option<usize>, entry: &ResultEntry) -> Result<()> {
        if let Some(slot) = slot {
            let mut bar = self.slot(slot)?;
            bar.set_description(format!("slot {}", slot + 1));
            bar.set_postfix(match entry.status {
                ResultStatus::Success => "done",
                ResultStatus::Failed => "failed",
                _ => "idle",
            });
            bar.refresh()?;
        }
        // Blocking lock: every completion must be counted.
        let mut overall = self
            .overall
            .lock()
            .map_err(|_| anyhow!("overall progress bar poisoned"))?;
        overall.update(1)?;
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        for slot in &self.slots {
            if let Ok(mut bar) = slot.lock() {
                bar.clear()?;
            }
        }
        let mut overall = self
            .overall
            .lock()
            .map_err(|_| anyhow!("overall progress bar poisoned"))?;
        overall.refresh()?;
        eprintln!();
        Ok(())
    }
}
