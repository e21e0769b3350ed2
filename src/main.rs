//! Binary entrypoint for the `archdiff` CLI.

use std::process::ExitCode;

fn main() -> ExitCode {
    // Picks up DEEPSEEK_API_KEY for --md-mode=llm.
    dotenvy::dotenv().ok();

    match archdiff::run(std::env::args()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
