//! Load command - copy stored state to stdout

use super::included_variant;
use crate::cli::args::LoadArgs;
use crate::error::{StateCacheError, StateCacheResult};
use crate::repository::CacheRepository;
use crate::state::StateLayout;
use std::io::{self, Write};

/// Execute the load command
pub fn execute(args: LoadArgs, repo: &CacheRepository) -> StateCacheResult<()> {
    repo.load_state(&args.key, args.state, |layout| {
        let file = included_variant(layout.primary(), &args.included_builds);
        let mut reader = file.open_for_read()?;
        let mut stdout = io::stdout().lock();
        io::copy(&mut reader, &mut stdout)
            .and_then(|_| stdout.flush())
            .map_err(|e| StateCacheError::io("writing to stdout", e))
    })
}
