//! Store command - write a payload into a cache entry

use super::included_variant;
use crate::cli::args::StoreArgs;
use crate::error::{StateCacheError, StateCacheResult};
use crate::repository::CacheRepository;
use crate::state::{StateFile, StateLayout};
use console::style;
use std::fs;
use std::io::{self, Read, Write};

/// Execute the store command
pub fn execute(args: StoreArgs, repo: &CacheRepository) -> StateCacheResult<()> {
    // Read the payload before taking the cache lock.
    let payload = match &args.input {
        Some(path) => fs::read(path)
            .map_err(|e| StateCacheError::io(format!("reading {}", path.display()), e))?,
        None => {
            let mut buf = Vec::new();
            io::stdin()
                .lock()
                .read_to_end(&mut buf)
                .map_err(|e| StateCacheError::io("reading stdin", e))?;
            buf
        }
    };

    let target = repo.store_state(&args.key, args.state, |layout| {
        let file = included_variant(layout.primary(), &args.included_builds);
        let mut out = file.open_for_write()?;
        out.write_all(&payload)
            .and_then(|()| out.sync_all())
            .map_err(|e| StateCacheError::io(format!("writing {}", file.path().display()), e))?;
        Ok::<_, StateCacheError>(file.path().to_path_buf())
    })?;

    println!(
        "{} Stored {} bytes in {}",
        style("[OK]").green(),
        payload.len(),
        target.display()
    );
    Ok(())
}
