//! Command line interface module
//!
//! Argument parsing with environment overrides, the runner for the `sync` and `list-tags`
//! subcommands, and the tag report printed by `list-tags`.

pub mod args;
pub mod report;
pub mod runner;

pub use args::{Args, Command};
pub use runner::Runner;
