use colored::Colorize;
use env_logger::Builder;
use log::Level;
use std::io::Write;

/// Log target for external command lines and ffmpeg stderr transcripts.
pub const FFMPEG_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::ffmpeg");

pub fn setup_logging(verbose: bool) {
    use log::LevelFilter;

    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let result = Builder::from_default_env()
        .filter_level(LevelFilter::Warn) // Default: only warnings from dependencies
        .filter_module(env!("CARGO_PKG_NAME"), level) // Our crate: use requested level
        .format(|buf, record| {
            let name = env!("CARGO_PKG_NAME");
            let line = match record.level() {
                Level::Error | Level::Warn => {
                    let level_str = match record.level() {
                        Level::Warn => "WARN".yellow(),
                        Level::Error => "ERROR".red(),
                        _ => unreachable!(),
                    };
                    let path = record.target().to_string().white();
                    format!("[{} {} {}] {}", name.cyan(), level_str, path, record.args())
                }
                _ if record.target() == FFMPEG_TARGET => {
                    format!("[{} {}] {}", name.cyan(), "ffmpeg".dimmed(), record.args())
                }
                _ => format!("[{}] {}", name.cyan(), record.args()),
            };
            writeln!(buf, "{}", line)
        })
        .try_init();
    // A logger is already installed (second call in the same process).
    if result.is_err() {
        log::debug!("logger already initialized");
    }
}
