//! molexaudio CLI: normalize loudness or boost volume of media files in parallel.

use anyhow::Result;
use clap::Parser;
use molexaudio::engine::arg_parser::Cli;
use molexaudio::engine::handle_run;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
