//! statecache - key-addressed cache for persisted build state
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use statecache::cli::{commands, Cli, Commands};
use statecache::config::ConfigManager;
use statecache::error::StateCacheResult;
use statecache::repository::CacheRepository;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

fn run() -> StateCacheResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load()?;

    init_logging(cli.verbose, &config.general.log_format);

    // Config command doesn't need the cache
    if let Commands::Config(args) = cli.command {
        return commands::config(args, &config, &config_manager);
    }

    let base_dir = ConfigManager::resolve_cache_dir(&config, cli.cache_dir.as_deref());
    debug!("Using cache directory {}", base_dir.display());
    let repo = CacheRepository::open(base_dir, &config.cache)?;

    let result = match cli.command {
        Commands::Config(_) => unreachable!("Config handled above"),
        Commands::Store(args) => commands::store(args, &repo),
        Commands::Load(args) => commands::load(args, &repo),
        Commands::Check(args) => commands::check(args, &repo),
        Commands::List(args) => commands::list(args, &repo),
        Commands::Gc(args) => commands::gc(args, &repo),
    };

    // Shut down even if the command failed; its error wins.
    let shutdown = repo.shutdown();
    result?;
    if let Some(report) = shutdown? {
        info!(
            "Scheduled cleanup removed {} of {} entries",
            report.deleted, report.scanned
        );
    }
    Ok(())
}

/// Initialize logging: 0 = warn, 1 = info, 2+ = debug
fn init_logging(verbose: u8, log_format: &str) {
    let filter = match verbose {
        0 => EnvFilter::new("statecache=warn"),
        1 => EnvFilter::new("statecache=info"),
        _ => EnvFilter::new("statecache=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
