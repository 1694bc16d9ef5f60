// src/lib.rs

pub mod cli;
pub mod config;
pub mod console;
pub mod errors;
pub mod logging;
pub mod relay;
pub mod supervisor;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{RawConfigFile, SupervisorConfig, default_config_path, load_from_path};
use crate::console::{
    STDERR_PREFIX, STDOUT_PREFIX, pump_lines, run_console, spawn_line_reader,
};

pub use crate::errors::SupervisorError;
pub use crate::supervisor::{LifecycleState, ProcessSupervisor};

/// Operator lines buffered between the console thread and the runtime.
const CONSOLE_BACKLOG: usize = 16;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (file + CLI overrides)
/// - the supervisor and its first start
/// - stdout/stderr echo tasks
/// - the operator console on our own stdin
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = resolve_config(&args)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let mut supervisor = ProcessSupervisor::new(cfg)?;

    let mut pumps = Vec::new();
    if let Some(stdout) = supervisor.take_stdout() {
        pumps.push(tokio::spawn(pump_lines(
            stdout,
            STDOUT_PREFIX,
            tokio::io::stdout(),
        )));
    }
    if let Some(stderr) = supervisor.take_stderr() {
        pumps.push(tokio::spawn(pump_lines(
            stderr,
            STDERR_PREFIX,
            tokio::io::stderr(),
        )));
    }

    supervisor.start().await.context("starting child process")?;

    // Read on a plain thread: a pending terminal read must not keep the
    // runtime from shutting down after Ctrl-C.
    let stdin = std::io::BufReader::new(std::io::stdin());
    let console_input =
        spawn_line_reader(stdin, CONSOLE_BACKLOG).context("starting console reader")?;
    let interrupted = tokio::select! {
        _ = run_console(&mut supervisor, console_input) => false,
        sig = tokio::signal::ctrl_c() => {
            sig.context("listening for Ctrl+C")?;
            true
        }
    };

    if interrupted && supervisor.is_alive() {
        info!("Ctrl-C received; shutting down");
        if let Err(e) = supervisor.destroy().await {
            tracing::error!(error = %e, "destroy failed");
        }
    }

    // Outbound channels close once the relays are gone; let the echo tasks
    // flush what is left.
    for pump in pumps {
        pump.await?.context("writing child output")?;
    }

    Ok(())
}

/// Merge the config file (explicit, or `Pipevisor.toml` if present) with
/// command-line overrides and validate the result.
pub fn resolve_config(args: &CliArgs) -> Result<SupervisorConfig> {
    let mut raw = match &args.config {
        Some(path) => load_from_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => {
            let path = default_config_path();
            if path.is_file() {
                debug!(path = %path.display(), "using default config file");
                load_from_path(&path)?
            } else {
                RawConfigFile::default()
            }
        }
    };

    if let Some((command, rest)) = args.command.split_first() {
        raw.process.command = command.clone();
        raw.process.args = rest.to_vec();
    }
    if let Some(dir) = &args.dir {
        raw.process.dir = Some(dir.clone());
    }
    if let Some(name) = &args.name {
        raw.process.name = Some(name.clone());
    }
    if let Some(timeout) = &args.stop_timeout {
        raw.supervisor.stop_timeout = timeout.clone();
    }

    Ok(SupervisorConfig::try_from(raw)?)
}

fn print_dry_run(cfg: &SupervisorConfig) {
    println!("pipevisor dry-run");
    println!("  name: {}", cfg.name);
    println!("  command: {}", cfg.launch.command);
    if !cfg.launch.args.is_empty() {
        println!("  args: {:?}", cfg.launch.args);
    }
    if let Some(ref dir) = cfg.launch.dir {
        println!("  dir: {}", dir.display());
    }
    println!("  stop_timeout: {:?}", cfg.stop_timeout);
    println!("  shutdown_command: {:?}", cfg.shutdown_command);
    println!("  announce_prefix: {:?}", cfg.announce_prefix);
    println!("  read_buffer_capacity: {}", cfg.read_buffer_capacity);
    println!("  channel_capacity: {}", cfg.channel_capacity);
}
