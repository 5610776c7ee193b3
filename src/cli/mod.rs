/// CLI argument parsing and command handling - Gateway
mod args;
mod commands;

pub use args::{AskArgs, CacheAction, Cli, Commands, OutputFormat};
pub use commands::{handle_command, resolve_config};
