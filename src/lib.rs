pub mod cli;
pub mod config;
pub mod embed;
pub mod error;
pub mod export;
pub mod jobs;
pub mod lifecycle;
pub mod media;
pub mod paths;
pub mod project;
pub mod store;
pub mod timecode;
pub mod timeline;
pub mod transcription;

pub use error::{Error, Result};

use anyhow::Context;
use clap::Parser;
use config::AppConfig;
use paths::Paths;
use std::path::Path;

/// Log to stderr and to `log_file`. Stdout is left to command output.
pub fn init_logger(log_file: &Path, level: log::LevelFilter) -> Result<(), fern::InitError> {
    let format = |out: fern::FormatCallback<'_>, message: &std::fmt::Arguments<'_>, record: &log::Record| {
        out.finish(format_args!(
            "[{}][{}][{}][{:?}] {}",
            chrono::Local::now().format("%Y-%m-%d"),
            chrono::Local::now().format("%H:%M:%S"),
            record.target(),
            record.level(),
            message
        ))
    };

    fern::Dispatch::new()
        .format(format)
        .level(level)
        .level_for("reqwest", log::LevelFilter::Warn)
        .level_for("hyper", log::LevelFilter::Warn)
        .chain(std::io::stderr())
        .chain(fern::log_file(log_file)?)
        .apply()?;

    Ok(())
}

pub fn run() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("cannot load settings")?;
    let paths = Paths::resolve(config.data_dir.as_deref());
    paths.ensure_directories()?;

    let log_file = paths.log_file_path()?;
    if let Err(e) = init_logger(&log_file, config.log_level_filter()) {
        eprintln!("logging disabled: {}", e);
    }
    log::debug!("[app] data dir {}", paths.data_dir().display());

    let runtime = tokio::runtime::Runtime::new().context("cannot start async runtime")?;
    runtime.block_on(cli::execute(cli, config, paths))
}
