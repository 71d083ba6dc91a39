//! Process-wide registry of in-flight temp files and child processes.
//!
//! Every mutation takes the same lock. On Ctrl+C / SIGTERM the registry deletes every still
//! registered temp file, terminates every still registered child and exits the process.

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Child;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::utils::tempfiles::rename_temp_to_final;

/// Exit code used after an interrupt (128 + SIGINT).
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

static GLOBAL: OnceLock<Arc<CleanupRegistry>> = OnceLock::new();

#[derive(Debug, Default)]
struct RegistryState {
    temp_files: HashSet<PathBuf>,
    child_pids: HashSet<u32>,
    interrupted: bool,
}

/// What [`CleanupRegistry::cleanup`] did. Failures are logged, never raised.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CleanupReport {
    pub removed_files: Vec<PathBuf>,
    pub signalled_pids: Vec<u32>,
    pub failures: usize,
}

#[derive(Debug, Default)]
pub struct CleanupRegistry {
    state: Mutex<RegistryState>,
    handler_installed: AtomicBool,
}

impl CleanupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by the whole process. Created on first use.
    pub fn global() -> Arc<CleanupRegistry> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(CleanupRegistry::new())))
    }

    /// Install the Ctrl+C / SIGTERM handler. Calling it again is a no-op.
    pub fn install_interrupt_handler(self: &Arc<Self>) -> Result<()> {
        if self.handler_installed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let registry = Arc::clone(self);
        // ctrlc runs this on its own thread, never inside the signal handler itself,
        // so blocking on the registry lock is fine.
        ctrlc::set_handler(move || {
            info!("Interrupted. Cleaning up...");
            let report = registry.cleanup();
            debug!(
                "cleanup removed {} temp files, signalled {} children, {} failures",
                report.removed_files.len(),
                report.signalled_pids.len(),
                report.failures
            );
            std::process::exit(INTERRUPTED_EXIT_CODE);
        })
        .context("set Ctrl+C handler")
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // A panicking holder never leaves the sets half-updated, so keep using them.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a temp path. Returns false when it is already registered or cleanup already ran.
    pub fn register_temp_file(&self, path: &Path) -> bool {
        let mut state = self.lock();
        if state.interrupted {
            return false;
        }
        state.temp_files.insert(path.to_path_buf())
    }

    pub fn unregister_temp_file(&self, path: &Path) -> bool {
        self.lock().temp_files.remove(path)
    }

    /// Register a spawned child. Returns false when cleanup already ran.
    pub fn register_child_pid(&self, pid: u32) -> bool {
        let mut state = self.lock();
        if state.interrupted {
            return false;
        }
        state.child_pids.insert(pid);
        true
    }

    pub fn unregister_child_pid(&self, pid: u32) -> bool {
        self.lock().child_pids.remove(&pid)
    }

    pub fn temp_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self.lock().temp_files.iter().cloned().collect();
        files.sort();
        files
    }

    pub fn child_pids(&self) -> Vec<u32> {
        let mut pids: Vec<u32> = self.lock().child_pids.iter().copied().collect();
        pids.sort_unstable();
        pids
    }

    pub fn is_interrupted(&self) -> bool {
        self.lock().interrupted
    }

    /// Delete every registered temp file and terminate every registered child (best-effort).
    /// Leaves the registry in its terminal state: later registrations are refused.
    pub fn cleanup(&self) -> CleanupReport {
        let mut state = self.lock();
        state.interrupted = true;
        let mut report = CleanupReport::default();

        for path in state.temp_files.drain() {
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    info!("Temporary file {} deleted.", path.display());
                    report.removed_files.push(path);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    error!("Error deleting {}: {}", path.display(), e);
                    report.failures += 1;
                }
            }
        }

        for pid in state.child_pids.drain() {
            match terminate_pid(pid) {
                Ok(()) => {
                    debug!("Sent termination signal to child {pid}");
                    report.signalled_pids.push(pid);
                }
                Err(e) => {
                    error!("Error terminating child {pid}: {e}");
                    report.failures += 1;
                }
            }
        }
        report.removed_files.sort();
        report.signalled_pids.sort_unstable();
        report
    }

    /// Register `path` as a temp output and return a guard that deletes and unregisters it on drop
    /// unless [`TempFileGuard::finalize`] renamed it into place.
    pub fn track_temp_file(&self, path: PathBuf) -> io::Result<TempFileGuard<'_>> {
        if !self.register_temp_file(&path) {
            if self.is_interrupted() {
                return Err(io::Error::new(
                    io::ErrorKind::Interrupted,
                    format!("interrupt in progress, not starting {}", path.display()),
                ));
            }
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("temp path {} is already in use", path.display()),
            ));
        }
        Ok(TempFileGuard {
            registry: self,
            path,
            finalized: false,
        })
    }

    /// Register a freshly spawned child; the guard unregisters it on drop.
    /// If cleanup already ran the child is terminated right away.
    pub fn track_child(&self, child: &Child) -> ChildGuard<'_> {
        let pid = child.id();
        if !self.register_child_pid(pid)
            && let Err(e) = terminate_pid(pid)
        {
            warn!("Error terminating late child {pid}: {e}");
        }
        ChildGuard {
            registry: self,
            pid,
        }
    }
}

/// Registered temp output. Dropping without [`finalize`](Self::finalize) deletes the file.
#[derive(Debug)]
pub struct TempFileGuard<'a> {
    registry: &'a CleanupRegistry,
    path: PathBuf,
    finalized: bool,
}

impl TempFileGuard<'_> {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rename the temp output over `final_path`, then unregister it.
    pub fn finalize(mut self, final_path: &Path) -> Result<()> {
        rename_temp_to_final(&self.path, final_path)?;
        self.finalized = true;
        self.registry.unregister_temp_file(&self.path);
        Ok(())
    }
}

impl Drop for TempFileGuard<'_> {
    fn drop(&mut self) {
        if self.finalized {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("removed partial output {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("could not remove {}: {}", self.path.display(), e),
        }
        self.registry.unregister_temp_file(&self.path);
    }
}

/// Registered child process id; unregistered on drop (after the child was waited on).
#[derive(Debug)]
pub struct ChildGuard<'a> {
    registry: &'a CleanupRegistry,
    pid: u32,
}

impl ChildGuard<'_> {
    pub fn pid(&self) -> u32 {
        self.pid
    }
}

impl Drop for ChildGuard<'_> {
    fn drop(&mut self) {
        self.registry.unregister_child_pid(self.pid);
    }
}

/// Send SIGTERM to `pid`.
#[cfg(unix)]
pub fn terminate_pid(pid: u32) -> io::Result<()> {
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    if unsafe { libc::kill(pid, libc::SIGTERM) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Kill `pid` and its tree via `taskkill`.
#[cfg(not(unix))]
pub fn terminate_pid(pid: u32) -> io::Result<()> {
    let status = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T", "/F"])
        .status()?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("taskkill exited with {status}")))
    }
}
