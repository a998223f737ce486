//! CLI module - argument parsing and the non-training subcommands

mod args;
pub mod import;
pub mod predict;

pub use args::{Cli, Commands};
