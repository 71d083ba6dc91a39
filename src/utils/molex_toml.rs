//! Load `.molexaudio.toml` from the target directory (CLI only). Lib callers pass settings directly.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::Opts;
use crate::utils::config::PackagePaths;

#[derive(Debug, Default, Deserialize)]
pub struct MolexToml {
    #[serde(default)]
    settings: SettingsSection,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsSection {
    workers: Option<i64>,
    codec: Option<String>,
    bitrate: Option<String>,
    target_i: Option<f64>,
    target_tp: Option<f64>,
    target_lra: Option<f64>,
    verbose: Option<bool>,
}

/// Directory whose config applies to `path`: the path itself when it is a directory, else its parent.
pub fn config_dir_for(path: &Path) -> &Path {
    if path.is_dir() {
        path
    } else {
        path.parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
    }
}

/// Load the config file from `dir`. `Ok(None)` when there is no file; `Err` when it exists but
/// cannot be read or parsed (the caller logs and ignores it).
pub fn load_molex_toml(dir: &Path) -> Result<Option<MolexToml>> {
    let path = dir.join(PackagePaths::get().config_filename());
    if !path.is_file() {
        return Ok(None);
    }
    let s = std::fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let file = parse_molex_toml(&s).with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(file))
}

pub fn parse_molex_toml(s: &str) -> std::result::Result<MolexToml, toml::de::Error> {
    toml::from_str(s)
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($section:expr, $target:expr, $field:ident => $target_field:ident) => {
        if let Some(v) = $section.$field.clone() {
            $target.$target_field = v;
        }
    };
}

/// Apply file config to opts (only fields present in the file). Call before applying CLI.
/// dry_run is never in the file.
pub fn apply_file_to_opts(file: &MolexToml, opts: &mut Opts) {
    let s = &file.settings;
    if let Some(n) = s.workers {
        opts.workers = Some(n.to_string());
    }
    apply_file_opt!(s, opts.settings, codec => audio_codec);
    apply_file_opt!(s, opts.settings, bitrate => audio_bitrate);
    apply_file_opt!(s, opts.settings.loudnorm, target_i => integrated);
    apply_file_opt!(s, opts.settings.loudnorm, target_tp => true_peak);
    apply_file_opt!(s, opts.settings.loudnorm, target_lra => lra);
    apply_file_opt!(s, opts, verbose => verbose);
}
