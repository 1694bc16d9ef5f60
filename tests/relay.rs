// tests/relay.rs
#![cfg(unix)]

mod common;
use crate::common::builders::SupervisorConfigBuilder;
use crate::common::{assert_silent, children, init_tracing, recv_line, with_timeout};

use std::error::Error;
use std::time::{Duration, Instant};

use pipevisor::ProcessSupervisor;

type TestResult = Result<(), Box<dyn Error>>;

fn recorded_lines(path: &std::path::Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn lines_round_trip_through_the_child() -> TestResult {
    init_tracing();

    let mut sup = ProcessSupervisor::new(SupervisorConfigBuilder::shell(children::ECHO).build())?;
    let mut stdout = sup.take_stdout().expect("stdout receiver");
    let inbound = sup.inbound();
    sup.start().await?;

    for line in ["hello", "  leading and trailing  ", "tabs\tinside", "already terminated\n"] {
        inbound.send(line.to_string()).await?;
        assert_eq!(recv_line(&mut stdout).await, line.trim_end_matches('\n'));
    }

    with_timeout(sup.destroy()).await?;
    Ok(())
}

#[tokio::test]
async fn lines_longer_than_the_read_buffer_arrive_whole() -> TestResult {
    init_tracing();

    let cfg = SupervisorConfigBuilder::shell(children::ECHO)
        .read_buffer_capacity(16)
        .build();
    let mut sup = ProcessSupervisor::new(cfg)?;
    let mut stdout = sup.take_stdout().expect("stdout receiver");
    let inbound = sup.inbound();
    sup.start().await?;

    let long: String = (0..2_000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
    inbound.send(long.clone()).await?;
    inbound.send("short".to_string()).await?;

    assert_eq!(recv_line(&mut stdout).await, long);
    assert_eq!(recv_line(&mut stdout).await, "short");

    with_timeout(sup.destroy()).await?;
    Ok(())
}

#[tokio::test]
async fn stderr_is_relayed_separately() -> TestResult {
    init_tracing();

    let mut sup =
        ProcessSupervisor::new(SupervisorConfigBuilder::shell(children::ECHO_BOTH).build())?;
    let mut stdout = sup.take_stdout().expect("stdout receiver");
    let mut stderr = sup.take_stderr().expect("stderr receiver");
    sup.start().await?;

    sup.inbound().send("ping".to_string()).await?;
    assert_eq!(recv_line(&mut stdout).await, "ping");
    assert_eq!(recv_line(&mut stderr).await, "err:ping");

    with_timeout(sup.destroy()).await?;
    Ok(())
}

#[tokio::test]
async fn accepted_lines_are_written_once_in_order_before_shutdown() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let log = dir.path().join("stdin.log");
    let cfg = SupervisorConfigBuilder::shell(children::RECORD)
        .arg(log.to_str().expect("utf-8 temp path"))
        .build();
    let mut sup = ProcessSupervisor::new(cfg)?;
    let mut stdout = sup.take_stdout().expect("stdout receiver");
    let inbound = sup.inbound();
    sup.start().await?;

    let sent: Vec<String> = (0..50).map(|i| format!("line {i}")).collect();
    for line in &sent {
        inbound.send(line.clone()).await?;
    }
    for line in &sent {
        assert_eq!(&recv_line(&mut stdout).await, line);
    }

    with_timeout(sup.stop(Duration::from_millis(20), "restarting soon")).await?;

    let mut expected = sent.clone();
    expected.push("say restarting soon".to_string());
    expected.push("stop".to_string());
    assert_eq!(recorded_lines(&log), expected);

    with_timeout(sup.destroy()).await?;
    Ok(())
}

#[tokio::test]
async fn lines_sent_while_stopped_reach_the_next_child() -> TestResult {
    init_tracing();

    let mut sup = ProcessSupervisor::new(SupervisorConfigBuilder::shell(children::ECHO).build())?;
    let mut stdout = sup.take_stdout().expect("stdout receiver");
    let inbound = sup.inbound();

    inbound.send("before first start".to_string()).await?;
    sup.start().await?;
    assert_eq!(recv_line(&mut stdout).await, "before first start");

    with_timeout(sup.stop(Duration::ZERO, "")).await?;
    inbound.send("while stopped".to_string()).await?;

    sup.start().await?;
    assert_eq!(recv_line(&mut stdout).await, "while stopped");

    with_timeout(sup.destroy()).await?;
    Ok(())
}

#[tokio::test]
async fn output_from_a_stopping_child_never_reaches_the_next_run() -> TestResult {
    init_tracing();

    let mut sup =
        ProcessSupervisor::new(SupervisorConfigBuilder::shell(children::ECHO_BOTH).build())?;
    let mut stdout = sup.take_stdout().expect("stdout receiver");
    let mut stderr = sup.take_stderr().expect("stderr receiver");
    let inbound = sup.inbound();

    sup.start().await?;
    inbound.send("one".to_string()).await?;
    assert_eq!(recv_line(&mut stdout).await, "one");
    assert_eq!(recv_line(&mut stderr).await, "err:one");

    // The child answers the shutdown command with "bye" on both streams.
    with_timeout(sup.stop(Duration::ZERO, "")).await?;
    assert_silent(&mut stdout, Duration::from_millis(100)).await;
    assert_silent(&mut stderr, Duration::from_millis(100)).await;

    sup.start().await?;
    inbound.send("two".to_string()).await?;
    assert_eq!(recv_line(&mut stdout).await, "two");
    assert_eq!(recv_line(&mut stderr).await, "err:two");

    with_timeout(sup.destroy()).await?;
    Ok(())
}

#[tokio::test]
async fn custom_shutdown_command_is_used() -> TestResult {
    init_tracing();

    let script = r#"
while IFS= read -r line; do
    if [ "$line" = "quit now" ]; then
        exit 0
    fi
done
"#;
    let cfg = SupervisorConfigBuilder::shell(script)
        .shutdown_command("quit now")
        .stop_timeout(Duration::from_secs(2))
        .build();
    let mut sup = ProcessSupervisor::new(cfg)?;
    sup.start().await?;

    with_timeout(sup.stop(Duration::ZERO, "")).await?;

    sup.destroy().await?;
    Ok(())
}

#[tokio::test]
async fn stop_delay_keeps_output_flowing_until_shutdown() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let log = dir.path().join("stdin.log");
    let cfg = SupervisorConfigBuilder::shell(children::RECORD)
        .arg(log.to_str().expect("utf-8 temp path"))
        .build();
    let mut sup = ProcessSupervisor::new(cfg)?;
    let mut stdout = sup.take_stdout().expect("stdout receiver");
    sup.start().await?;

    let delay = Duration::from_millis(300);
    let begun = Instant::now();
    with_timeout(sup.stop(delay, "bye soon")).await?;
    assert!(begun.elapsed() >= delay, "stop returned after {:?}", begun.elapsed());

    // The child echoed the announcement during the delay, before stdout was
    // parked.
    assert_eq!(recv_line(&mut stdout).await, "say bye soon");
    assert_eq!(recorded_lines(&log), ["say bye soon", "stop"]);

    with_timeout(sup.destroy()).await?;
    Ok(())
}
