//! CLI interface for troupe
//!
//! Commands and global flags, defined with clap's derive API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// troupe: a coordinator that tracks project goals and delegates work to
/// specialist roles
#[derive(Parser, Debug)]
#[command(name = "troupe")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Project key for goals and the activity log (defaults to the workspace)
    #[arg(long, global = true, value_name = "KEY")]
    pub project: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one coordinator turn
    Run {
        /// What you want done
        task: String,
    },

    /// Talk to the coordinator interactively
    Chat,

    /// Inspect and edit project goals
    Goals {
        #[command(subcommand)]
        action: GoalAction,
    },

    /// Import or export the activity log
    Log {
        #[command(subcommand)]
        action: LogAction,
    },

    /// Inspect and assign role providers and models
    Role {
        #[command(subcommand)]
        action: RoleAction,
    },

    /// Check a command against the security gate without running it
    CheckCommand {
        /// Command line to check
        command: String,
    },

    /// Run system diagnostics
    Doctor,
}

#[derive(Subcommand, Debug)]
pub enum GoalAction {
    /// Show the goal tree with ids
    List,

    /// Add a goal
    Add {
        description: String,

        /// Attach under this goal
        #[arg(long)]
        parent: Option<String>,

        /// Initial status (PENDING, IN_PROGRESS, COMPLETED, FAILED)
        #[arg(long)]
        status: Option<String>,
    },

    /// Change a goal's status
    Status {
        id: String,

        status: String,

        /// Re-derive ancestor statuses afterwards
        #[arg(long)]
        propagate: bool,
    },

    /// Remove a goal and its sub-goals
    Remove { id: String },

    /// Show the prioritized outstanding-work report
    Report,

    /// List every project with stored goals
    Projects,

    /// Load goals from an indented bullet document
    Import {
        file: PathBuf,

        /// Replace the current goals instead of appending
        #[arg(long)]
        replace: bool,
    },

    /// Write the goals as an indented bullet document
    Export {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum LogAction {
    /// Append entries from a `### ROLE - TIMESTAMP` document
    Import { file: PathBuf },

    /// Write the activity log as a `### ROLE - TIMESTAMP` document
    Export {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete the project's activity log
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum RoleAction {
    /// List roles with their provider, model and capabilities
    List,

    /// Show one role
    Show { role: String },

    /// Assign a provider (and optionally a model) to a role
    Set {
        role: String,

        /// ollama or openai
        #[arg(long)]
        provider: String,

        /// Model name; defaults to the provider's configured model
        #[arg(long)]
        model: Option<String>,
    },
}
