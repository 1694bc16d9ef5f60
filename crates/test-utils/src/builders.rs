use std::path::PathBuf;
use std::time::Duration;

use pipevisor::config::{LaunchConfig, SupervisorConfig};

/// Builder for `SupervisorConfig` to simplify test setup.
///
/// Defaults to a short stop timeout so a misbehaving child cannot stall the
/// suite for the production 10 seconds.
pub struct SupervisorConfigBuilder {
    config: SupervisorConfig,
}

impl SupervisorConfigBuilder {
    pub fn new(command: &str) -> Self {
        let mut config = SupervisorConfig::new(LaunchConfig::new(
            command,
            Vec::<String>::new(),
            None,
        ));
        config.stop_timeout = Duration::from_secs(3);
        Self { config }
    }

    /// `sh -c <script> sh`; further `arg`s become `$1`, `$2`, ...
    pub fn shell(script: &str) -> Self {
        Self::new("sh").arg("-c").arg(script).arg("sh")
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.config.launch.args.push(arg.to_string());
        self
    }

    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.launch.dir = Some(dir.into());
        self
    }

    pub fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.config.stop_timeout = timeout;
        self
    }

    pub fn shutdown_command(mut self, cmd: &str) -> Self {
        self.config.shutdown_command = cmd.to_string();
        self
    }

    pub fn read_buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.read_buffer_capacity = capacity;
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    pub fn build(self) -> SupervisorConfig {
        self.config
    }
}
