pub mod cli;
pub mod commands;
mod compose;
mod config;
mod error;
mod intervals;
mod pipeline;
mod planner;
mod reassemble;
mod segment;
mod shuffler;
mod srt;
mod store;
#[cfg(test)]
mod testing;
mod time;
mod transcode;
mod utils;

pub use cli::ShuffleCommands;
pub use commands::handle_shuffle_command;
pub use config::ShuffleConfig;
