//! Command-line interface components
//!
//! This module contains CLI-specific code for the salesbridge application:
//! argument parsing and the command handlers.

pub mod args;
pub mod commands;

pub use args::{CheckArgs, Cli, Commands, GlobalArgs, RunArgs};
pub use commands::{handle_check, handle_run};
