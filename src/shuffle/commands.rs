use anyhow::Result;

use super::cli::ShuffleCommands;
use super::config::ShuffleConfig;
use super::pipeline::{handle_convert, handle_plan, handle_run};

pub fn handle_shuffle_command(command: ShuffleCommands, config: &ShuffleConfig) -> Result<()> {
    match command {
        ShuffleCommands::Run(args) => handle_run(args, config),
        ShuffleCommands::Plan(args) => handle_plan(args, config),
        ShuffleCommands::Convert(args) => handle_convert(args),
    }
}
