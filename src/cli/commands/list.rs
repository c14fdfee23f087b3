//! List command - show cache entries

use crate::cli::args::{ListArgs, OutputFormat};
use crate::error::StateCacheResult;
use crate::repository::{CacheRepository, EntrySummary};
use console::style;

/// Execute the list command
pub fn execute(args: ListArgs, repo: &CacheRepository) -> StateCacheResult<()> {
    let entries = repo.entries()?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Plain => entries.iter().for_each(|e| println!("{}", e.key)),
        OutputFormat::Table if entries.is_empty() => println!("No cache entries found."),
        OutputFormat::Table => print_table(&entries),
    }

    Ok(())
}

fn print_table(entries: &[EntrySummary]) {
    println!(
        "{:<40} {:<18} {:>10}  {}",
        "KEY", "LAST ACCESSED", "SIZE", "STATE FILES"
    );
    println!("{}", "-".repeat(90));

    for entry in entries {
        let accessed = entry
            .last_accessed
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:<40} {:<18} {:>10}  {}",
            entry.key,
            accessed,
            entry.size_bytes,
            style(entry.state_files.join(", ")).dim()
        );
    }

    println!();
    println!("Total: {} entr{}", entries.len(), if entries.len() == 1 { "y" } else { "ies" });
}
