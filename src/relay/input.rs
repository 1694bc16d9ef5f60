// src/relay/input.rs

//! Input relay: the only writer of the child's stdin.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::gate::{GateReceiver, GateSignal};

/// A supervisor-originated line (announcement, shutdown command).
///
/// The sender is told once the line has been handed to the pipe, so it can
/// order later steps after the write.
#[derive(Debug)]
pub struct ControlLine {
    text: String,
    written: oneshot::Sender<()>,
}

impl ControlLine {
    pub fn new(text: impl Into<String>) -> (Self, oneshot::Receiver<()>) {
        let (written, rx) = oneshot::channel();
        (
            Self {
                text: text.into(),
                written,
            },
            rx,
        )
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Write `line` to `writer`, appending `\n` if it is missing, then flush.
pub async fn write_line<W>(writer: &mut W, line: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    if !line.ends_with('\n') {
        writer.write_all(b"\n").await?;
    }
    writer.flush().await
}

enum Event<W> {
    Control(ControlLine),
    Gate(GateSignal<W>),
    Inbound(String),
}

/// Serialises the internal control path and the public inbound channel onto
/// the child's stdin. Control lines win whenever both are ready.
pub struct InputRelay<W> {
    gate: GateReceiver<W>,
    control: mpsc::Receiver<ControlLine>,
    inbound: mpsc::Receiver<String>,
    alive: Arc<AtomicBool>,
}

impl<W> InputRelay<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(
        gate: GateReceiver<W>,
        control: mpsc::Receiver<ControlLine>,
        inbound: mpsc::Receiver<String>,
        alive: Arc<AtomicBool>,
    ) -> Self {
        Self {
            gate,
            control,
            inbound,
            alive,
        }
    }

    /// Run until the supervisor is destroyed.
    ///
    /// On exit the inbound channel is closed, so callers blocked on (or
    /// attempting) a send get an error instead of hanging.
    pub async fn run(mut self) {
        debug!("input relay started");
        let mut pipe: Option<W> = None;

        while self.alive.load(Ordering::Acquire) {
            if pipe.is_none() {
                // Paused: no I/O until the gate hands over a fresh stdin.
                match self.gate.wait_resumed().await {
                    Some(stdin) => {
                        pipe = Some(stdin);
                        continue;
                    }
                    None => break,
                }
            }

            let event = tokio::select! {
                biased;
                Some(control) = self.control.recv() => Event::Control(control),
                signal = self.gate.recv() => Event::Gate(signal),
                Some(line) = self.inbound.recv() => Event::Inbound(line),
            };

            let signal = match event {
                Event::Gate(signal) => Some(signal),
                Event::Control(ControlLine { text, written }) => {
                    debug!(line = %text, "writing control line");
                    let interrupted = self.write(&mut pipe, &text).await;
                    // An interrupted write drops `written` unacknowledged.
                    if interrupted.is_none() {
                        let _ = written.send(());
                    }
                    interrupted
                }
                Event::Inbound(line) => self.write(&mut pipe, &line).await,
            };

            if let Some(signal) = signal {
                if self.apply(signal, &mut pipe).is_break() {
                    break;
                }
            }
        }

        self.inbound.close();
        debug!("input relay finished");
    }

    /// Write one line. A write stuck on a full pipe yields to the gate; the
    /// interrupting signal is returned for the caller to apply.
    async fn write(&mut self, pipe: &mut Option<W>, line: &str) -> Option<GateSignal<W>> {
        let writer = pipe.as_mut()?;

        tokio::select! {
            biased;
            res = write_line(writer, line) => {
                if let Err(e) = res {
                    warn!(error = %e, line = %line, "failed to write line to child stdin");
                }
                None
            }
            signal = self.gate.recv() => {
                warn!(line = %line, "write to child stdin interrupted by gate signal");
                Some(signal)
            }
        }
    }

    fn apply(&mut self, signal: GateSignal<W>, pipe: &mut Option<W>) -> ControlFlow<()> {
        match signal {
            GateSignal::Pause(ack) => {
                // Control lines are addressed to the current child only.
                while let Ok(stale) = self.control.try_recv() {
                    debug!(line = %stale.text(), "discarding control line for paused child");
                }
                ack.acknowledge(pipe.take());
                ControlFlow::Continue(())
            }
            GateSignal::Resume(stdin) => {
                *pipe = Some(stdin);
                ControlFlow::Continue(())
            }
            GateSignal::Terminate => ControlFlow::Break(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncBufReadExt, BufReader, DuplexStream, duplex};

    use super::*;
    use crate::relay::{StreamKind, run_gate};

    #[tokio::test]
    async fn write_line_appends_missing_terminator() {
        let mut out = Vec::new();
        write_line(&mut out, "hello").await.unwrap();
        write_line(&mut out, "world\n").await.unwrap();
        assert_eq!(out, b"hello\nworld\n");
    }

    #[tokio::test]
    async fn control_lines_take_priority_over_inbound() {
        let (mut gate, gate_rx) = run_gate::<DuplexStream>(StreamKind::Stdin);
        let (control_tx, control_rx) = mpsc::channel(4);
        let (inbound_tx, inbound_rx) = mpsc::channel(4);
        let alive = Arc::new(AtomicBool::new(true));

        // Queue both before the loop ever runs so they are ready together.
        inbound_tx.send("from caller".to_string()).await.unwrap();
        let (control, written) = ControlLine::new("from supervisor");
        control_tx.send(control).await.unwrap();

        let relay = InputRelay::new(gate_rx, control_rx, inbound_rx, alive);
        let handle = tokio::spawn(relay.run());

        let (child_side, relay_side) = duplex(1024);
        gate.resume(relay_side).await;
        written.await.unwrap();

        let mut lines = BufReader::new(child_side).lines();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("from supervisor"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("from caller"));

        gate.terminate().await;
        handle.await.unwrap();
        assert!(inbound_tx.send("late".to_string()).await.is_err());
    }

    #[tokio::test]
    async fn paused_relay_returns_stdin_and_holds_inbound_lines() {
        let (mut gate, gate_rx) = run_gate::<DuplexStream>(StreamKind::Stdin);
        let (_control_tx, control_rx) = mpsc::channel(4);
        let (inbound_tx, inbound_rx) = mpsc::channel(4);
        let alive = Arc::new(AtomicBool::new(true));
        let handle = tokio::spawn(InputRelay::new(gate_rx, control_rx, inbound_rx, alive).run());

        let (_first_child, first_pipe) = duplex(1024);
        gate.resume(first_pipe).await;
        assert!(gate.pause().await.is_some(), "pause hands stdin back");

        // Queued while paused; must reach the next child.
        inbound_tx.send("queued".to_string()).await.unwrap();

        let (second_child, second_pipe) = duplex(1024);
        gate.resume(second_pipe).await;
        let mut lines = BufReader::new(second_child).lines();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("queued"));

        gate.terminate().await;
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn control_line_cut_off_by_pause_is_not_acknowledged() {
        let (mut gate, gate_rx) = run_gate::<DuplexStream>(StreamKind::Stdin);
        let (control_tx, control_rx) = mpsc::channel(4);
        let (_inbound_tx, inbound_rx) = mpsc::channel(4);
        let alive = Arc::new(AtomicBool::new(true));
        let handle = tokio::spawn(InputRelay::new(gate_rx, control_rx, inbound_rx, alive).run());

        // The child never reads, so the write stalls once the pipe is full.
        let (_child_side, relay_side) = duplex(8);
        gate.resume(relay_side).await;

        let (control, written) = ControlLine::new("x".repeat(64));
        control_tx.send(control).await.unwrap();

        assert!(gate.pause().await.is_some());
        assert!(written.await.is_err(), "partial write must not be acknowledged");

        gate.terminate().await;
        handle.await.unwrap();
    }
}
