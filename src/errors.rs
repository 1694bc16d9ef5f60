// src/errors.rs

//! Crate-wide error type and result alias.

use std::process::ExitStatus;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("child process already running")]
    AlreadyRunning,

    #[error("child process not running")]
    NotRunning,

    #[error("supervisor has been destroyed")]
    Destroyed,

    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("spawned child is missing its {0} pipe")]
    MissingPipe(&'static str),

    #[error("supervisor must be constructed inside a tokio runtime: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    /// The child exited unsuccessfully (non-zero code or killed by a signal).
    #[error("child process {pid} exited with {status}{}", forced_suffix(.forced))]
    ChildExit {
        pid: u32,
        status: ExitStatus,
        forced: bool,
    },

    #[error("waiting for child process {pid} failed: {source}")]
    Wait {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    /// Reaping a child after `SIGKILL` failed. The OS-level kill did not take
    /// effect, which should never happen.
    #[error("child process {pid} could not be reaped after kill: {source}")]
    Reap {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn forced_suffix(forced: &bool) -> &'static str {
    if *forced { " after a forced kill" } else { "" }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SupervisorError>;
