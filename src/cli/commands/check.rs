//! Check command - validate the stored fingerprint of a key

use crate::cli::args::CheckArgs;
use crate::error::{StateCacheError, StateCacheResult};
use crate::repository::CacheRepository;
use crate::state::{CheckedFingerprint, StateFile};
use console::style;

/// Execute the check command
pub fn execute(args: CheckArgs, repo: &CacheRepository) -> StateCacheResult<()> {
    let outcome = repo.check_fingerprint(&args.key, |file| {
        let len = file
            .open_for_read()?
            .metadata()
            .map_err(|e| StateCacheError::io(format!("inspecting {}", file.path().display()), e))?
            .len();
        Ok::<_, StateCacheError>((len == 0).then(|| "fingerprint is empty".to_string()))
    })?;

    let label = match &outcome {
        CheckedFingerprint::Valid => style(outcome.to_string()).green(),
        CheckedFingerprint::NotFound => style(outcome.to_string()).yellow(),
        CheckedFingerprint::Invalid(_) => style(outcome.to_string()).red(),
    };
    println!("{}: {}", args.key, label);
    Ok(())
}
