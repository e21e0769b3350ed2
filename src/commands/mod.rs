//! Command dispatch and handlers.

pub mod config;
pub mod diff;

use crate::cli::Command;

/// Dispatch a parsed command to its handler.
///
/// # Errors
///
/// Returns an error string if the selected command handler fails.
pub fn dispatch(command: &Command) -> Result<(), String> {
    match command {
        Command::Diff(args) => diff::run(args),
        Command::Config => config::run(),
    }
}
