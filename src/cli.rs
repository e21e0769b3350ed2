//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Top-level CLI parser for `archdiff`.
#[derive(Debug, Parser)]
#[command(name = "archdiff", version, about = "Diff reverse-engineered module clusterings")]
pub struct Cli {
    /// The command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compare two versions' analysis outputs and write the diff IR.
    Diff(DiffArgs),
    /// Print the default configuration as YAML.
    Config,
}

/// Event-generation pipeline to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DiffMode {
    /// Alignment-driven module-level events (recommended).
    Module,
    /// Overlap-driven split/merge inference plus per-file events.
    Legacy,
}

/// How the Markdown summary is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MdMode {
    /// Deterministic template rendering.
    Template,
    /// Chat-model rendering (requires `DEEPSEEK_API_KEY`).
    Llm,
    /// Skip the Markdown summary.
    None,
}

/// Arguments of the `diff` subcommand.
#[derive(Debug, Args)]
pub struct DiffArgs {
    /// Directory holding version A's analysis JSON files.
    #[arg(long)]
    pub dir_a: PathBuf,
    /// Directory holding version B's analysis JSON files.
    #[arg(long)]
    pub dir_b: PathBuf,
    /// Repository name recorded in the IR meta.
    #[arg(long)]
    pub repo: String,
    /// Version label of A, e.g. "v1.49.0".
    #[arg(long)]
    pub label_a: String,
    /// Version label of B, e.g. "v1.50.0".
    #[arg(long)]
    pub label_b: String,
    /// Output directory; defaults to out/<repo>_<label-a>-<label-b>.
    #[arg(long)]
    pub out: Option<PathBuf>,
    /// Event-generation pipeline.
    #[arg(long, value_enum, default_value_t = DiffMode::Module)]
    pub mode: DiffMode,
    /// Markdown summary mode.
    #[arg(long, value_enum, default_value_t = MdMode::Template)]
    pub md_mode: MdMode,
    /// Chat model used when --md-mode=llm.
    #[arg(long, default_value = crate::render::llm::DEFAULT_MODEL)]
    pub model: String,
    /// YAML config file overriding the default thresholds.
    #[arg(long)]
    pub config: Option<PathBuf>,
}
