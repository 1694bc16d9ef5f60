// src/relay/output.rs

//! Output relay: forwards complete lines from one of the child's output
//! pipes to an outbound channel.

use std::ops::ControlFlow;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, trace};

use super::StreamKind;
use super::gate::{GateReceiver, GateSignal};

/// Turn the bytes collected by `read_until` into a line: strip one `\n` or
/// `\r\n` terminator and replace invalid UTF-8.
pub(crate) fn take_line(buf: &mut Vec<u8>) -> String {
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    let line = String::from_utf8_lossy(buf).into_owned();
    buf.clear();
    line
}

enum Event<R> {
    Gate(GateSignal<R>),
    Read(std::io::Result<usize>),
}

/// Relay loop for stdout or stderr.
///
/// The pipe is read through a fixed-size buffer; a line longer than that
/// buffer arrives over several fills and is reassembled before it is
/// forwarded as a single message.
pub struct OutputRelay<R> {
    stream: StreamKind,
    gate: GateReceiver<R>,
    outbound: mpsc::Sender<String>,
}

impl<R> OutputRelay<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn new(stream: StreamKind, gate: GateReceiver<R>, outbound: mpsc::Sender<String>) -> Self {
        Self {
            stream,
            gate,
            outbound,
        }
    }

    /// Run until the supervisor is destroyed. Dropping `self` at the end
    /// closes the outbound channel.
    pub async fn run(mut self) {
        debug!(stream = %self.stream, "output relay started");
        let mut pipe: Option<R> = None;
        let mut buf = Vec::new();

        loop {
            if pipe.is_none() {
                // Paused, or the current pipe hit end-of-stream. Either way
                // nothing is read until the gate hands over a fresh pipe.
                match self.gate.wait_resumed().await {
                    Some(fresh) => {
                        buf.clear();
                        pipe = Some(fresh);
                    }
                    None => break,
                }
            }
            let Some(reader) = pipe.as_mut() else {
                continue;
            };

            let event = tokio::select! {
                biased;
                signal = self.gate.recv() => Event::Gate(signal),
                read = reader.read_until(b'\n', &mut buf) => Event::Read(read),
            };

            match event {
                Event::Gate(signal) => {
                    if self.apply(signal, &mut pipe, &mut buf).is_break() {
                        break;
                    }
                }
                Event::Read(Ok(0)) => {
                    debug!(stream = %self.stream, "end of stream");
                    pipe = None;
                    // `buf` is only non-empty here if an earlier read was cut
                    // short; the bytes still form the final line.
                    if !buf.is_empty() {
                        let line = take_line(&mut buf);
                        if self.forward(line, &mut pipe, &mut buf).await.is_break() {
                            break;
                        }
                    }
                }
                Event::Read(Ok(_)) => {
                    let line = take_line(&mut buf);
                    if self.forward(line, &mut pipe, &mut buf).await.is_break() {
                        break;
                    }
                }
                Event::Read(Err(e)) => {
                    debug!(stream = %self.stream, error = %e, "read error; waiting for next run");
                    buf.clear();
                    pipe = None;
                }
            }
        }

        debug!(stream = %self.stream, "output relay finished");
    }

    /// Send one line downstream. A full channel yields to the gate so a
    /// slow consumer cannot hold up a stop.
    async fn forward(
        &mut self,
        line: String,
        pipe: &mut Option<R>,
        buf: &mut Vec<u8>,
    ) -> ControlFlow<()> {
        if self.outbound.is_closed() {
            trace!(stream = %self.stream, line = %line, "outbound receiver dropped; discarding line");
            return ControlFlow::Continue(());
        }

        let signal = tokio::select! {
            biased;
            sent = self.outbound.send(line) => {
                if let Err(e) = sent {
                    trace!(stream = %self.stream, line = %e.0, "outbound receiver dropped; discarding line");
                }
                None
            }
            signal = self.gate.recv() => Some(signal),
        };

        match signal {
            Some(signal) => self.apply(signal, pipe, buf),
            None => ControlFlow::Continue(()),
        }
    }

    fn apply(
        &mut self,
        signal: GateSignal<R>,
        pipe: &mut Option<R>,
        buf: &mut Vec<u8>,
    ) -> ControlFlow<()> {
        // Any half-read line belongs to the outgoing pipe.
        buf.clear();
        match signal {
            GateSignal::Pause(ack) => {
                ack.acknowledge(pipe.take());
                ControlFlow::Continue(())
            }
            GateSignal::Resume(fresh) => {
                *pipe = Some(fresh);
                ControlFlow::Continue(())
            }
            GateSignal::Terminate => ControlFlow::Break(()),
        }
    }
}

/// Read and drop everything left on a retired pipe until end-of-stream.
///
/// Keeps a stopping child from blocking on (or being killed by) a full or
/// closed pipe while none of its late output reaches the outbound channels.
pub fn spawn_discard<R>(stream: StreamKind, mut reader: R) -> JoinHandle<()>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    tokio::spawn(
        async move {
            let mut buf = Vec::new();
            loop {
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        let line = take_line(&mut buf);
                        debug!(stream = %stream, line = %line, "discarding output from stopping child");
                    }
                }
            }
        }
        .in_current_span(),
    )
}
