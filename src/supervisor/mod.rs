// src/supervisor/mod.rs

//! Lifecycle controller for a single supervised child process.
//!
//! [`ProcessSupervisor`] owns the child, the three relay loops from
//! [`crate::relay`], and the state machine
//! `NotStarted → Running → Stopped → Running → … → Destroyed`.

use std::fmt;

pub mod lifecycle;

pub use lifecycle::ProcessSupervisor;

/// Where the supervisor is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    NotStarted,
    Running,
    Stopped,
    /// Terminal: the relay loops are gone and `start` is refused.
    Destroyed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::NotStarted => "not started",
            LifecycleState::Running => "running",
            LifecycleState::Stopped => "stopped",
            LifecycleState::Destroyed => "destroyed",
        };
        f.write_str(s)
    }
}
