// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `pipevisor`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "pipevisor",
    version,
    about = "Supervise a long-running process and relay its console line by line.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// If omitted, `Pipevisor.toml` in the current directory is used when it
    /// exists.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Working directory for the child (overrides `[process].dir`).
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Grace period before a stopping child is killed, e.g. `10s`, `500ms`.
    #[arg(long, value_name = "DURATION")]
    pub stop_timeout: Option<String>,

    /// Name used in log output (defaults to the command).
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PIPEVISOR_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Resolve and print the launch configuration, but don't start anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Command and arguments to supervise (overrides `[process]`).
    #[arg(last = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
