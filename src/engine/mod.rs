//! Engine module: CLI surface, progress presentation and result reporting

pub mod arg_parser;
pub mod cli;
pub mod progress;
pub mod report;
pub mod tools;

// Re-export commonly used functions
pub use arg_parser::{Cli, Commands, CommonArgs};
pub use cli::{handle_run, validate_opts};
pub use progress::{KdamSink, LogSink, NullSink, ProgressSink, notify_sink};
pub use report::{Summary, write_json, write_table};
pub use tools::{collect_media_files, is_supported_media, scan_media_files};
