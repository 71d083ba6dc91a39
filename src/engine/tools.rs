//! Path utilities: media scan and file filters

use anyhow::{Context, Result};
use log::debug;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::utils::config::SUPPORTED_EXTENSIONS;
use crate::utils::tempfiles::is_temp_artifact;

/// Check if a file should be excluded based on OS-specific hidden files
pub fn is_os_hidden_file(path: &Path) -> bool {
    match path.file_name().and_then(|n| n.to_str()) {
        // macOS resource forks, Windows/Linux folder metadata
        Some(name) => {
            name.starts_with("._")
                || matches!(
                    name,
                    ".DS_Store" | "Thumbs.db" | "ehthumbs.db" | "Desktop.ini" | ".directory"
                )
        }
        None => false,
    }
}

/// True when `path` has a supported media extension (case-insensitive).
pub fn is_supported_media(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|s| s.eq_ignore_ascii_case(ext))
        })
}

/// Returns true if the walked file should become a task.
pub fn should_process(path: &Path) -> bool {
    is_supported_media(path) && !is_temp_artifact(path) && !is_os_hidden_file(path)
}

/// Media files under `dir` (recursive), sorted so tasks start in a stable order.
/// Unreadable entries are skipped.
pub fn scan_media_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                debug!("skip unreadable entry: {e}");
                None
            }
        })
        .filter(|e| e.file_type().is_file() && should_process(e.path()))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// Files for `path`: the file itself when it is one (whatever its extension), else a scan.
pub fn collect_media_files(path: &Path) -> Result<Vec<PathBuf>> {
    let meta = std::fs::metadata(path).with_context(|| format!("read {}", path.display()))?;
    if meta.is_file() {
        Ok(vec![path.to_path_buf()])
    } else {
        Ok(scan_media_files(path))
    }
}
