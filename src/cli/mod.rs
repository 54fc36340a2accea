/// CLI argument parsing and command handling - Gateway
mod args;
mod commands;

pub use args::{BusArg, Cli, Commands};
pub use commands::{handle_command, ping_provider, show_version};
