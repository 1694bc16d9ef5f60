//! Shared helpers for `pipevisor` tests: tracing setup, time limits and
//! outbound stream assertions. See [`builders`] for configs and
//! [`children`] for the `sh` programs that play the supervised process.

pub mod builders;
pub mod children;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt};

/// Upper bound for any single awaited step in a test.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

static TRACING: Once = Once::new();

/// Route supervisor and relay logs into the per-test capture.
///
/// Reads the same `PIPEVISOR_LOG` variable as the binary, in `EnvFilter`
/// syntax (e.g. `PIPEVISOR_LOG=pipevisor::relay=trace`). Output shows up
/// only for failing tests unless run with `--nocapture`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_env("PIPEVISOR_LOG")
            .unwrap_or_else(|_| EnvFilter::new("info"));

        // Another harness may have installed a subscriber already.
        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Await `f`, failing the test if it takes longer than [`TEST_TIMEOUT`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(TEST_TIMEOUT, f).await {
        Ok(value) => value,
        Err(_) => panic!("step did not finish within {TEST_TIMEOUT:?}"),
    }
}

/// Next line from an outbound stream. Panics if the stream closes or stays
/// quiet for [`TEST_TIMEOUT`].
pub async fn recv_line(rx: &mut mpsc::Receiver<String>) -> String {
    with_timeout(rx.recv())
        .await
        .expect("outbound channel closed unexpectedly")
}

/// Assert nothing arrives on `rx` within `quiet`.
pub async fn assert_silent(rx: &mut mpsc::Receiver<String>, quiet: Duration) {
    if let Ok(Some(line)) = tokio::time::timeout(quiet, rx.recv()).await {
        panic!("expected no output, got {line:?}");
    }
}
