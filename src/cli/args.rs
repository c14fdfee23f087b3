//! CLI argument definitions using clap derive

use crate::state::StateType;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// statecache - key-addressed cache for persisted build state
///
/// Stores, loads and validates state files per cache key and removes
/// entries that have not been used for a while.
#[derive(Parser, Debug)]
#[command(name = "statecache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "STATECACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Cache base directory (overrides cache.dir)
    #[arg(long, global = true, env = "STATECACHE_DIR")]
    pub cache_dir: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Store state for a cache key (reads stdin unless --input is given)
    Store(StoreArgs),

    /// Write stored state for a cache key to stdout
    Load(LoadArgs),

    /// Check whether a cache key has a usable fingerprint
    Check(CheckArgs),

    /// List cache entries
    List(ListArgs),

    /// Remove entries not accessed recently
    Gc(GcArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the store command
#[derive(Parser, Debug)]
pub struct StoreArgs {
    /// Cache key
    pub key: String,

    /// State type to write
    #[arg(short, long, default_value = "entry")]
    pub state: StateType,

    /// Read the payload from this file instead of stdin
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Address the variant for an included build (repeat for nesting)
    #[arg(long = "included-build", value_name = "NAME")]
    pub included_builds: Vec<String>,
}

/// Arguments for the load command
#[derive(Parser, Debug)]
pub struct LoadArgs {
    /// Cache key
    pub key: String,

    /// State type to read
    #[arg(short, long, default_value = "entry")]
    pub state: StateType,

    /// Address the variant for an included build (repeat for nesting)
    #[arg(long = "included-build", value_name = "NAME")]
    pub included_builds: Vec<String>,
}

/// Arguments for the check command
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Cache key
    pub key: String,
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the gc command
#[derive(Parser, Debug)]
pub struct GcArgs {
    /// Remove entries unused for more than N days (default: from config)
    #[arg(long)]
    pub days: Option<u32>,

    /// Dry run - show what would be removed
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for list command
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}
