//! Gc command - remove entries that have not been used recently

use crate::cli::args::GcArgs;
use crate::error::StateCacheResult;
use crate::repository::CacheRepository;
use console::style;

/// Execute the gc command
pub fn execute(args: GcArgs, repo: &CacheRepository) -> StateCacheResult<()> {
    let report = repo.cleanup(args.days, args.dry_run)?;

    let verb = if args.dry_run { "Would remove" } else { "Removed" };
    for path in &report.removed {
        println!("  {} {}", style("-").red(), path.display());
    }
    for error in &report.errors {
        eprintln!("  {} {}", style("[WARN]").yellow(), error);
    }
    println!(
        "{} {} of {} entries ({} bytes)",
        verb, report.deleted, report.scanned, report.bytes_reclaimed
    );
    Ok(())
}
