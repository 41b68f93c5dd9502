mod common;
mod shuffle;
mod ui;

use clap::Parser;
use std::path::PathBuf;

use crate::shuffle::{ShuffleCommands, ShuffleConfig, handle_shuffle_command};
use crate::ui::prelude::*;

/// Shuffle the spoken dialogue of a video while keeping its timing intact
#[derive(Parser, Debug)]
#[command(name = "dshuffle", author, version, about, long_about = None)]
struct Cli {
    /// Activate debug mode
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit machine-readable JSON events
    #[arg(long, global = true)]
    json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Use an alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: ShuffleCommands,
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => ShuffleConfig::load_from_path(path)?,
        None => ShuffleConfig::load()?,
    };
    handle_shuffle_command(cli.command, &config)
}

fn main() {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };
    ui::init(format, !cli.no_color);
    ui::set_debug_mode(cli.debug);
    emit(Level::Debug, "debug.enabled", "Debug mode is on", None);

    if let Err(err) = run(cli) {
        emit(Level::Error, "error", &format!("Error: {err:#}"), None);
        std::process::exit(1);
    }
}
