//! LexiSync CLI
//!
//! Operator tools over a LexiSync store snapshot.
//!
//! # Commands
//!
//! - `create-user` - Register a user so it can sync
//! - `push` - Apply a batch of client logs from a JSON file
//! - `pull` - Show what a device at some version would receive
//! - `dump-log` - Dump a user's operation log
//! - `issues` - List recorded integrity issues
//! - `prune-log` - Drop old log entries
//! - `check-log` - Find (and optionally delete) log entries beyond the ledger

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// LexiSync command-line sync tools.
#[derive(Parser)]
#[command(name = "lexisync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store snapshot file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Server configuration file (JSON)
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a user
    CreateUser {
        /// User id
        #[arg(short, long)]
        user: String,

        /// Login name (defaults to the id)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Apply a batch of client logs
    Push {
        /// User id
        #[arg(short, long)]
        user: String,

        /// Server version the batch was built against
        #[arg(short, long)]
        expected: u64,

        /// JSON file holding an array of logs
        #[arg(short, long)]
        logs: PathBuf,
    },

    /// Show the pull response for a device
    Pull {
        /// User id
        #[arg(short, long)]
        user: String,

        /// Last version the device applied
        #[arg(long, default_value = "0")]
        from: u64,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Dump a user's operation log
    DumpLog {
        /// User id
        #[arg(short, long)]
        user: String,

        /// Maximum number of entries to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// List recorded integrity issues
    Issues {
        /// User id
        #[arg(short, long)]
        user: String,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Drop log entries older than a version
    PruneLog {
        /// User id
        #[arg(short, long)]
        user: String,

        /// Keep entries at or above this version
        #[arg(short, long)]
        before: u64,
    },

    /// Check for log entries beyond the ledger version
    CheckLog {
        /// User id
        #[arg(short, long)]
        user: String,

        /// Delete the entries found
        #[arg(long)]
        fix: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Commands::Version = cli.command {
        println!("LexiSync CLI v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let path = cli.path.ok_or("Store path required (--path)")?;
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::CreateUser { user, name } => {
            commands::create_user::run(&path, config, &user, name.as_deref())?;
        }
        Commands::Push {
            user,
            expected,
            logs,
        } => {
            commands::push::run(&path, config, &user, expected, &logs)?;
        }
        Commands::Pull { user, from, format } => {
            commands::pull::run(&path, config, &user, from, &format)?;
        }
        Commands::DumpLog {
            user,
            limit,
            format,
        } => {
            commands::dump_log::run(&path, &user, limit, &format)?;
        }
        Commands::Issues { user, format } => {
            commands::issues::run(&path, &user, &format)?;
        }
        Commands::PruneLog { user, before } => {
            commands::prune_log::run(&path, config, &user, before)?;
        }
        Commands::CheckLog { user, fix } => {
            commands::check_log::run(&path, config, &user, fix)?;
        }
        Commands::Version => {}
    }

    Ok(())
}
