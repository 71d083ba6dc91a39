//! Final results output: coloured table + summary, or JSON.

use anyhow::{Context, Result};
use colored::{ColoredString, Colorize};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::types::{ResultEntry, ResultStatus};

/// Counts per terminal status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub dry_run: usize,
}

impl Summary {
    pub fn from_results(results: &[ResultEntry]) -> Self {
        results.iter().fold(
            Summary {
                total: results.len(),
                ..Summary::default()
            },
            |mut acc, entry| {
                match entry.status {
                    ResultStatus::Success => acc.succeeded += 1,
                    ResultStatus::Failed => acc.failed += 1,
                    ResultStatus::DryRun => acc.dry_run += 1,
                    ResultStatus::InProgress => {}
                }
                acc
            },
        )
    }
}

fn status_cell(status: ResultStatus) -> ColoredString {
    let text = format!("{:<11}", status.to_string());
    match status {
        ResultStatus::Success => text.green(),
        ResultStatus::Failed => text.red().bold(),
        ResultStatus::DryRun => text.cyan(),
        ResultStatus::InProgress => text.yellow(),
    }
}

fn display_name(path: &Path, base: Option<&Path>) -> String {
    base.and_then(|b| path.strip_prefix(b).ok())
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(path)
        .display()
        .to_string()
}

/// Write the results table (completion order) and a summary line. File names are shown
/// relative to `base` when they live under it.
pub fn write_table<W: Write>(out: &mut W, results: &[ResultEntry], base: Option<&Path>) -> Result<()> {
    let task_width = results
        .iter()
        .map(|r| r.task.chars().count())
        .max()
        .unwrap_or(0)
        .max("Task".len());
    writeln!(
        out,
        "{}",
        format!("{:<11}  {:<task_width$}  {}", "Status", "Task", "File").bold()
    )?;
    for entry in results {
        write!(
            out,
            "{}  {:<task_width$}  {}",
            status_cell(entry.status),
            entry.task,
            display_name(&entry.file, base)
        )?;
        match &entry.message {
            Some(msg) if entry.status == ResultStatus::Failed => {
                writeln!(out, "  {}", msg.red())?
            }
            Some(msg) => writeln!(out, "  {}", msg.dimmed())?,
            None => writeln!(out)?,
        }
    }
    let s = Summary::from_results(results);
    writeln!(out)?;
    writeln!(
        out,
        "{} file(s): {} succeeded, {} failed, {} dry run",
        s.total,
        s.succeeded.to_string().green(),
        s.failed.to_string().red(),
        s.dry_run.to_string().cyan()
    )?;
    Ok(())
}

#[derive(Serialize)]
struct JsonReport<'a> {
    summary: Summary,
    results: &'a [ResultEntry],
}

/// Write `{ "summary": {...}, "results": [...] }`.
pub fn write_json<W: Write>(out: &mut W, results: &[ResultEntry]) -> Result<()> {
    let report = JsonReport {
        summary: Summary::from_results(results),
        results,
    };
    serde_json::to_writer_pretty(&mut *out, &report).context("serialize results")?;
    writeln!(out)?;
    Ok(())
}
