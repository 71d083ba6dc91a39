pub mod cleanup;
pub mod config;
pub mod executables;
pub mod logger;
pub mod molex_toml;
pub mod tempfiles;

pub use cleanup::{CleanupRegistry, CleanupReport, TempFileGuard};
pub use config::*;
pub use executables::{Executables, resolve_executable};
pub use logger::setup_logging;
pub use tempfiles::{is_temp_artifact, rename_temp_to_final, temp_path_for};
