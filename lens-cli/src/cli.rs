//! CLI parser.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "lens")]
#[command(about = "Chat message metadata: replay captured exchanges, inspect, resolve, profiles", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay captured exchanges (JSON lines) into the store; optionally annotate a DOM snapshot.
    Replay {
        /// File with one `{ method, url, requestBody, responseBody }` object per line.
        #[arg(short, long)]
        exchanges: PathBuf,
        #[command(flatten)]
        target: Target,
        /// DOM snapshot to annotate once the replay is done.
        #[arg(short, long)]
        snapshot: Option<PathBuf>,
    },
    /// Show stored records of a conversation, or list characters when none is given.
    Show {
        #[arg(long)]
        character: Option<String>,
        #[arg(long)]
        conversation: Option<String>,
    },
    /// Annotate a DOM snapshot from stored records (no positional fallback).
    Resolve {
        #[arg(short, long)]
        snapshot: PathBuf,
        #[command(flatten)]
        target: Target,
    },
    /// Wipe every stored record.
    Clear,
    /// Manage named generation profiles.
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
}

/// Character and conversation the records belong to.
#[derive(Args, Debug, Clone)]
pub struct Target {
    #[arg(short, long)]
    pub character: String,
    /// Defaults to the conversation id found in the exchanges.
    #[arg(long)]
    pub conversation: Option<String>,
}

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// Save (or replace) a profile.
    Save {
        name: String,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        max_tokens: Option<u32>,
        #[arg(long)]
        temperature: Option<f64>,
        #[arg(long)]
        top_p: Option<f64>,
        #[arg(long)]
        top_k: Option<u32>,
    },
    /// Show one profile as JSON.
    Show { name: String },
    /// List profiles by name.
    List,
    /// Delete a profile.
    Delete { name: String },
}
