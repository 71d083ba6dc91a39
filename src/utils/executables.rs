//! Locate ffmpeg / ffprobe: env var → .env in working dir → bundled next to the binary → PATH.

use log::debug;
use std::path::{Path, PathBuf};

use crate::utils::config::PackagePaths;

fn try_env_then_dotenv(var: &str, dir: &Path) -> Option<PathBuf> {
    if let Ok(s) = std::env::var(var) {
        let s = s.trim().to_string();
        if !s.is_empty() {
            return Some(PathBuf::from(s));
        }
    }
    let env_path = dir.join(".env");
    if env_path.is_file() {
        let _ = dotenvy::from_path(&env_path);
        if let Ok(s) = std::env::var(var) {
            let s = s.trim().to_string();
            if !s.is_empty() {
                return Some(PathBuf::from(s));
            }
        }
    }
    None
}

/// Executable shipped in the same directory as the running binary, if any.
fn bundled_executable(program: &str) -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let dir = exe.parent()?;
    let candidate = dir.join(program);
    if candidate.is_file() {
        return Some(candidate);
    }
    let candidate_exe = dir.join(format!("{program}.exe"));
    candidate_exe.is_file().then_some(candidate_exe)
}

/// Resolve the path used to launch `program` (e.g. `"ffmpeg"`). Falls back to the bare name so
/// the OS searches `PATH`.
pub fn resolve_executable(program: &str) -> PathBuf {
    let var = PackagePaths::get().exe_env_var(program);
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let resolved = try_env_then_dotenv(&var, &cwd)
        .or_else(|| bundled_executable(program))
        .unwrap_or_else(|| PathBuf::from(program));
    debug!("{program}: using {}", resolved.display());
    resolved
}

/// Resolved `ffmpeg` and `ffprobe` paths.
#[derive(Clone, Debug, PartialEq)]
pub struct Executables {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Executables {
    pub fn discover() -> Self {
        Self {
            ffmpeg: resolve_executable("ffmpeg"),
            ffprobe: resolve_executable("ffprobe"),
        }
    }
}

impl Default for Executables {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}
