// src/console.rs

//! Operator console: the glue between a terminal and a supervisor.
//!
//! Each input line is either a command (`!start`, `!stop`, `!exit`) or text
//! forwarded verbatim to the child. Child output is echoed with `[SI]`
//! (stdout) and `[SE]` (stderr) prefixes.

use std::future::Future;
use std::io::{self, BufRead};
use std::thread;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt, Lines};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::supervisor::ProcessSupervisor;

pub const STDOUT_PREFIX: &str = "[SI]";
pub const STDERR_PREFIX: &str = "[SE]";

/// One parsed line of operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Start,
    Stop,
    Exit,
    /// Text for the child's stdin.
    Forward(String),
    /// A `!`-prefixed line that is not a known command.
    Unknown(String),
    Empty,
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return ConsoleCommand::Empty;
        }

        match line.strip_prefix('!') {
            Some("start") => ConsoleCommand::Start,
            Some("stop") => ConsoleCommand::Stop,
            Some("exit") => ConsoleCommand::Exit,
            Some(_) => ConsoleCommand::Unknown(line.to_string()),
            None => ConsoleCommand::Forward(line.to_string()),
        }
    }
}

/// A source of operator input lines.
pub trait ConsoleInput {
    /// The next line without its terminator, or `None` at end of input.
    fn next_line(&mut self) -> impl Future<Output = io::Result<Option<String>>> + Send;
}

impl<R> ConsoleInput for Lines<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    fn next_line(&mut self) -> impl Future<Output = io::Result<Option<String>>> + Send {
        Lines::next_line(self)
    }
}

/// Lines forwarded by [`spawn_line_reader`].
impl ConsoleInput for mpsc::Receiver<io::Result<String>> {
    fn next_line(&mut self) -> impl Future<Output = io::Result<Option<String>>> + Send {
        async move { self.recv().await.transpose() }
    }
}

/// Read `reader` line by line on a dedicated OS thread and forward each
/// line over a channel.
///
/// A read blocked on the terminal then holds up neither the tokio runtime
/// nor its shutdown. The thread ends at end of input, after a read error,
/// or once the receiver is dropped and another line arrives.
pub fn spawn_line_reader<R>(
    reader: R,
    capacity: usize,
) -> io::Result<mpsc::Receiver<io::Result<String>>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity);
    thread::Builder::new()
        .name("pipevisor-console".to_string())
        .spawn(move || {
            for line in reader.lines() {
                let failed = line.is_err();
                if tx.blocking_send(line).is_err() || failed {
                    break;
                }
            }
        })?;
    Ok(rx)
}

/// Drive `supervisor` from operator input until `!exit` or end of input.
///
/// Lifecycle errors are logged and the console keeps going; nothing is
/// retried. The supervisor is destroyed before returning.
pub async fn run_console<I>(supervisor: &mut ProcessSupervisor, mut lines: I)
where
    I: ConsoleInput,
{
    let inbound = supervisor.inbound();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("console input closed");
                break;
            }
            Err(e) => {
                error!(error = %e, "failed to read console input");
                break;
            }
        };

        match ConsoleCommand::parse(&line) {
            ConsoleCommand::Empty => continue,
            ConsoleCommand::Start => {
                if let Err(e) = supervisor.start().await {
                    error!(error = %e, "start failed");
                }
            }
            ConsoleCommand::Stop => {
                if let Err(e) = supervisor.stop(Duration::ZERO, "").await {
                    error!(error = %e, "stop failed");
                }
            }
            ConsoleCommand::Exit => break,
            ConsoleCommand::Forward(text) => {
                if inbound.send(text).await.is_err() {
                    warn!("inbound channel closed; dropping console line");
                }
            }
            ConsoleCommand::Unknown(cmd) => {
                error!(command = %cmd, "unrecognized command");
            }
        }
    }

    if supervisor.is_alive() {
        if let Err(e) = supervisor.destroy().await {
            error!(error = %e, "destroy failed");
        }
    }
}

/// Write every line from `lines` to `out` as `<prefix> <line>`, until the
/// channel closes.
pub async fn pump_lines<W>(
    mut lines: mpsc::Receiver<String>,
    prefix: &str,
    mut out: W,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = lines.recv().await {
        out.write_all(format!("{prefix} {line}\n").as_bytes()).await?;
        out.flush().await?;
    }
    debug!(prefix, "outbound stream closed");
    Ok(())
}
