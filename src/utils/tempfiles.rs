use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::utils::config::TEMP_SUFFIX;

/// Temp output path for `media_path`: `<stem>_temp_processing.<ext>` in the same directory,
/// so the final rename never crosses filesystems.
pub fn temp_path_for(media_path: &Path) -> PathBuf {
    let stem = media_path
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    let name = match media_path.extension() {
        Some(ext) => format!("{stem}{TEMP_SUFFIX}.{}", ext.to_string_lossy()),
        None => format!("{stem}{TEMP_SUFFIX}"),
    };
    media_path.parent().unwrap_or(Path::new(".")).join(name)
}

/// True when `path` looks like a temp output left behind by a previous run.
pub fn is_temp_artifact(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.ends_with(TEMP_SUFFIX))
}

/// Replace `final_path` with `temp_path`.
///
/// On unix `rename` already replaces the target, so a failure is returned as is and the original
/// stays untouched. Elsewhere the target is removed and the rename retried, but only when the temp
/// output is really there to take its place.
pub fn rename_temp_to_final(temp_path: &Path, final_path: &Path) -> Result<()> {
    let first = match fs::rename(temp_path, final_path) {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };
    let context = || {
        format!(
            "rename temp output to final path ({} -> {})",
            temp_path.display(),
            final_path.display()
        )
    };
    if cfg!(unix) || first.kind() == io::ErrorKind::NotFound || !temp_path.is_file() {
        return Err(first).with_context(context);
    }
    if final_path.exists() {
        fs::remove_file(final_path)
            .with_context(|| format!("remove original before replace ({})", final_path.display()))?;
    }
    fs::rename(temp_path, final_path).with_context(context)
}
