//! CLI interface for Maestro
//!
//! This module provides the command-line interface using clap's derive API.
//! It defines all commands and global flags for driving the task agent.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Maestro task agent
///
/// An autonomous agent that plans a task, executes the plan step by step
/// against its tools, and remembers the outcome for future tasks.
#[derive(Parser, Debug)]
#[command(name = "maestro")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute a task immediately
    Run {
        /// The task to execute
        task: String,

        /// Force a specific specialist profile
        #[arg(long, value_name = "NAME")]
        agent: Option<String>,

        /// Additional structured context as a JSON object
        #[arg(long, value_name = "JSON")]
        context: Option<String>,
    },

    /// Show agent status
    Status,

    /// List specialist profiles
    Agents,

    /// List registered tools
    Tools,

    /// Manage the memory store
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },
}

/// Memory store management actions
#[derive(Subcommand, Debug)]
pub enum MemoryAction {
    /// Show per-tier sizes and stats
    Stats,

    /// Export all memories to a JSON file
    Export {
        /// Destination file
        path: PathBuf,
    },

    /// Import memories from a JSON file
    Import {
        /// Source file
        path: PathBuf,
    },
}
