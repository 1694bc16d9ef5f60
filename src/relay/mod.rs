// src/relay/mod.rs

//! Relay loops moving line-oriented text between the child's pipes and the
//! supervisor's channels.
//!
//! - [`gate`] is the pause/resume handshake the lifecycle controller uses to
//!   park a loop and swap its pipe.
//! - [`input`] serialises control lines and caller lines onto the child's
//!   stdin.
//! - [`output`] reads stdout or stderr line by line and forwards each line
//!   to an outbound channel. One type serves both streams.
//!
//! Loops are spawned once per supervisor and live until it is destroyed;
//! only the pipes change between child generations.

use std::fmt;

pub mod gate;
pub mod input;
pub mod output;

pub use gate::{GateReceiver, GateSignal, GateState, PauseAck, RunGate, run_gate};
pub use input::{ControlLine, InputRelay, write_line};
pub use output::{OutputRelay, spawn_discard};

/// Which child stream a relay loop is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdin,
    Stdout,
    Stderr,
}

impl StreamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StreamKind::Stdin => "stdin",
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
