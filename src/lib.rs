//! Core library for the `archdiff` CLI.
//!
//! Compares two versions of a reverse-engineered architecture (source files
//! clustered into named modules, modules grouped into components) and emits
//! a structured diff IR of typed, evidenced change events.

pub mod align;
pub mod cli;
pub mod commands;
pub mod config;
pub mod denoise;
pub mod events;
pub mod inputs;
pub mod ir;
pub mod quality;
pub mod render;
pub mod significance;
pub mod snapshot;

use clap::Parser;

/// Run the CLI with the provided arguments.
///
/// # Errors
///
/// Returns an error string when argument parsing fails or command execution
/// fails.
pub fn run<I, T>(args: I) -> Result<(), String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = cli::Cli::try_parse_from(args).map_err(|err| err.to_string())?;
    commands::dispatch(&cli.command)
}

#[cfg(test)]
mod tests {
    use super::run;

    #[test]
    fn run_executes_config() {
        let result = run(["archdiff", "config"]);
        assert!(result.is_ok());
    }

    #[test]
    fn run_errors_on_unknown_subcommand() {
        let result = run(["archdiff", "unknown"]);
        assert!(result.is_err());
    }
}
