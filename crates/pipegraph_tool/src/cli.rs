// SPDX-License-Identifier: MIT OR Apache-2.0
//! Command line arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Log filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "pipegraph_tool=info,pipegraph_core=warn";

/// Inspect and convert pipegraph session files
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Settings file (defaults to `pipegraph.ron` in the working directory, if present)
    #[arg(long, global = true, env = "PIPEGRAPH_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Log core graph operations
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Tool subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load a session and report entries that could not be restored
    Check {
        /// Session file
        file: PathBuf,
    },
    /// Re-encode a session; the format follows each file's extension
    Convert {
        /// Source session
        input: PathBuf,
        /// Destination session
        output: PathBuf,
    },
    /// List the registered node types
    Types {
        /// Only show types under this namespace
        #[arg(long)]
        namespace: Option<String>,
    },
    /// Print the nodes of a session with producers before consumers
    Order {
        /// Session file
        file: PathBuf,
    },
    /// Paste one session into another, shifted by the duplicate offset
    Merge {
        /// Session pasted into
        base: PathBuf,
        /// Session to paste
        other: PathBuf,
        /// Destination session
        output: PathBuf,
    },
}
