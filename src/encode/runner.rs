//! External command execution: captured (ffprobe) and streamed (ffmpeg stderr, line by line).

use log::debug;
use std::io::{BufRead, BufReader, Read};
use std::process::{Command, ExitStatus, Stdio};

use super::error::{TaskError, TaskResult};
use crate::utils::CleanupRegistry;
use crate::utils::logger::FFMPEG_TARGET;

/// Result of a streamed run: exit status plus every non-empty stderr line.
#[derive(Debug)]
pub struct StreamedRun {
    pub status: ExitStatus,
    pub log: Vec<String>,
}

impl StreamedRun {
    pub fn last_line(&self) -> Option<&str> {
        self.log.last().map(String::as_str)
    }

    pub fn transcript(&self) -> String {
        self.log.join("\n")
    }
}

/// `program arg arg ...` for logs.
pub fn describe(cmd: &Command) -> String {
    std::iter::once(cmd.get_program().to_string_lossy())
        .chain(cmd.get_args().map(|a| a.to_string_lossy()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn program_name(cmd: &Command) -> String {
    cmd.get_program().to_string_lossy().into_owned()
}

/// Status text used in error messages (`code 1`, or `signal` when killed).
pub fn status_text(status: &ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

/// Call `on_line` for every line of `reader`, splitting on both `\n` and `\r`
/// (ffmpeg rewrites its stats line with carriage returns). Empty lines are skipped.
pub fn for_each_line<R: Read>(reader: R, mut on_line: impl FnMut(&str)) -> std::io::Result<()> {
    let mut reader = BufReader::new(reader);
    let mut pending: Vec<u8> = Vec::new();
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            break;
        }
        let len = buf.len();
        for &b in buf {
            if b == b'\n' || b == b'\r' {
                emit(&mut pending, &mut on_line);
            } else {
                pending.push(b);
            }
        }
        reader.consume(len);
    }
    emit(&mut pending, &mut on_line);
    Ok(())
}

fn emit(pending: &mut Vec<u8>, on_line: &mut impl FnMut(&str)) {
    if pending.is_empty() {
        return;
    }
    let line = String::from_utf8_lossy(pending);
    let trimmed = line.trim();
    if !trimmed.is_empty() {
        on_line(trimmed);
    }
    pending.clear();
}

/// Run `cmd` to completion and capture stdout. The child is registered with `registry` while it runs.
/// Non-zero exit is an error.
pub fn run_captured(cmd: &mut Command, registry: &CleanupRegistry) -> TaskResult<String> {
    debug!(target: FFMPEG_TARGET, "{}", describe(cmd));
    let child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| TaskError::Spawn {
            program: program_name(cmd),
            source,
        })?;
    let guard = registry.track_child(&child);
    // The pid is free for reuse once reaped; release it before anything else, including `?`.
    let output = child.wait_with_output();
    drop(guard);
    let output = output?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let last_line = stderr
            .lines()
            .map(str::trim)
            .rfind(|l| !l.is_empty())
            .map(str::to_string);
        return Err(TaskError::Encode {
            program: program_name(cmd),
            status: status_text(&output.status),
            last_line,
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run `cmd`, feeding each stderr line to `on_line` as it arrives. The child is registered with
/// `registry` from spawn until it has been waited on. The exit status is returned, not judged.
pub fn run_streaming(
    cmd: &mut Command,
    registry: &CleanupRegistry,
    mut on_line: impl FnMut(&str),
) -> TaskResult<StreamedRun> {
    debug!(target: FFMPEG_TARGET, "{}", describe(cmd));
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| TaskError::Spawn {
            program: program_name(cmd),
            source,
        })?;
    let guard = registry.track_child(&child);

    let mut log = Vec::new();
    let read_result = match child.stderr.take() {
        Some(stderr) => for_each_line(stderr, |line| {
            on_line(line);
            log.push(line.to_string());
        }),
        None => Ok(()),
    };
    let status = child.wait();
    drop(guard);
    let status = status?;
    read_result?;

    if !log.is_empty() {
        debug!(target: FFMPEG_TARGET, "{}", log.join("\n"));
    }
    Ok(StreamedRun { status, log })
}
