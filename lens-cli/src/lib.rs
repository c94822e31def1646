//! # lens-cli
//!
//! The `lens` binary's library half: argument parsing, env config and the command
//! implementations, on a SQLite-backed store.

pub mod cli;
pub mod commands;
pub mod config;

pub use cli::{Cli, Commands, ProfileCommands, Target};
pub use commands::{Lens, ReplayReport, SnapshotReport};
pub use config::LensConfig;
