// src/relay/gate.rs

//! Pause/resume gate between the lifecycle controller and one relay loop.
//!
//! The controller owns a [`RunGate`], the loop owns the matching
//! [`GateReceiver`]. The gate also carries the pipe for each generation of
//! the child: `resume` hands a fresh pipe to the loop and `pause` takes it
//! back, so a loop can never touch a pipe that belongs to a stopped child.

use std::fmt;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::StreamKind;

/// Signals buffered per gate. The controller never has more than one
/// pause/resume in flight, so this only has to absorb `Terminate`.
const GATE_CAPACITY: usize = 4;

/// Observable state of a gate, as last set by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Paused,
    Running,
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateState::Paused => f.write_str("paused"),
            GateState::Running => f.write_str("running"),
        }
    }
}

/// Acknowledges a pause, handing the loop's pipe (if it still has one) back
/// to the controller.
#[derive(Debug)]
pub struct PauseAck<P>(oneshot::Sender<Option<P>>);

impl<P> PauseAck<P> {
    pub fn acknowledge(self, pipe: Option<P>) {
        // The controller may have given up waiting; the pipe is then dropped.
        let _ = self.0.send(pipe);
    }
}

/// A signal as seen by the relay loop.
#[derive(Debug)]
pub enum GateSignal<P> {
    /// Start (or continue) relaying on this pipe.
    Resume(P),
    /// Stop all I/O and return the pipe through the ack.
    Pause(PauseAck<P>),
    /// The supervisor is gone; exit the loop.
    Terminate,
}

/// Create a connected controller/loop gate pair. Gates start paused.
pub fn run_gate<P>(stream: StreamKind) -> (RunGate<P>, GateReceiver<P>) {
    let (tx, rx) = mpsc::channel(GATE_CAPACITY);
    (
        RunGate {
            tx,
            state: GateState::Paused,
            stream,
        },
        GateReceiver { rx },
    )
}

/// Controller half of a gate.
pub struct RunGate<P> {
    tx: mpsc::Sender<GateSignal<P>>,
    state: GateState,
    stream: StreamKind,
}

impl<P> fmt::Debug for RunGate<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunGate")
            .field("stream", &self.stream)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<P> RunGate<P> {
    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn stream(&self) -> StreamKind {
        self.stream
    }

    /// Hand `pipe` to the loop and let it run.
    ///
    /// Returns `false` if the loop has already exited.
    pub async fn resume(&mut self, pipe: P) -> bool {
        if self.tx.send(GateSignal::Resume(pipe)).await.is_err() {
            warn!(stream = %self.stream, "relay loop gone; cannot resume");
            return false;
        }
        self.state = GateState::Running;
        true
    }

    /// Park the loop and wait until it has stopped all I/O.
    ///
    /// Returns the pipe the loop was holding, if any. Pausing an already
    /// paused gate is a no-op.
    pub async fn pause(&mut self) -> Option<P> {
        if self.state == GateState::Paused {
            return None;
        }
        self.state = GateState::Paused;

        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(GateSignal::Pause(PauseAck(ack_tx))).await.is_err() {
            warn!(stream = %self.stream, "relay loop gone; nothing to pause");
            return None;
        }

        match ack_rx.await {
            Ok(pipe) => {
                debug!(stream = %self.stream, "relay loop paused");
                pipe
            }
            Err(_) => {
                warn!(stream = %self.stream, "relay loop exited before acknowledging pause");
                None
            }
        }
    }

    /// Tell the loop to exit for good.
    pub async fn terminate(&mut self) {
        self.state = GateState::Paused;
        if self.tx.send(GateSignal::Terminate).await.is_err() {
            debug!(stream = %self.stream, "relay loop already gone");
        }
    }
}

/// Loop half of a gate.
#[derive(Debug)]
pub struct GateReceiver<P> {
    rx: mpsc::Receiver<GateSignal<P>>,
}

impl<P> GateReceiver<P> {
    /// Next signal from the controller. A dropped controller reads as
    /// `Terminate`. Cancel safe.
    pub async fn recv(&mut self) -> GateSignal<P> {
        self.rx.recv().await.unwrap_or(GateSignal::Terminate)
    }

    /// Block, consuming signals, until the controller resumes the loop.
    ///
    /// Pauses received while already parked are acknowledged with no pipe.
    /// Returns `None` once the loop should exit.
    pub async fn wait_resumed(&mut self) -> Option<P> {
        loop {
            match self.recv().await {
                GateSignal::Resume(pipe) => return Some(pipe),
                GateSignal::Pause(ack) => ack.acknowledge(None),
                GateSignal::Terminate => return None,
            }
        }
    }
}
