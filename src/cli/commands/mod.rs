//! CLI command implementations

pub mod check;
pub mod config;
pub mod gc;
pub mod list;
pub mod load;
pub mod store;

pub use check::execute as check;
pub use config::execute as config;
pub use gc::execute as gc;
pub use list::execute as list;
pub use load::execute as load;
pub use store::execute as store;

use crate::state::StateFile;

/// Follow `--included-build` names from a primary handle
fn included_variant<F: StateFile + Clone>(file: &F, builds: &[String]) -> F {
    builds
        .iter()
        .fold(file.clone(), |current, build| current.for_included_build(build))
}
