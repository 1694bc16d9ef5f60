// src/config/validate.rs

use crate::config::duration::parse_duration;
use crate::config::model::{LaunchConfig, RawConfigFile, SupervisorConfig};
use crate::errors::{Result, SupervisorError};

impl TryFrom<RawConfigFile> for SupervisorConfig {
    type Error = SupervisorError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let stop_timeout = parse_duration(&raw.supervisor.stop_timeout).map_err(|e| {
            SupervisorError::Config(format!("[supervisor].stop_timeout: {e}"))
        })?;

        let process = raw.process;
        let name = process
            .name
            .clone()
            .unwrap_or_else(|| process.command.clone());

        let config = SupervisorConfig {
            launch: LaunchConfig::new(process.command, process.args, process.dir),
            name,
            stop_timeout,
            shutdown_command: raw.supervisor.shutdown_command,
            announce_prefix: raw.supervisor.announce_prefix,
            destroy_announcement: raw.supervisor.destroy_announcement,
            read_buffer_capacity: raw.supervisor.read_buffer_capacity,
            channel_capacity: raw.supervisor.channel_capacity,
        };

        validate_config(&config)?;
        Ok(config)
    }
}

/// Check the invariants the supervisor relies on.
///
/// Also used on configs built in code, since their fields are public.
pub fn validate_config(cfg: &SupervisorConfig) -> Result<()> {
    if cfg.launch.command.trim().is_empty() {
        return Err(SupervisorError::Config(
            "[process].command must not be empty".to_string(),
        ));
    }

    if cfg.stop_timeout.is_zero() {
        return Err(SupervisorError::Config(
            "[supervisor].stop_timeout must be greater than zero".to_string(),
        ));
    }

    if cfg.shutdown_command.trim().is_empty() {
        return Err(SupervisorError::Config(
            "[supervisor].shutdown_command must not be empty".to_string(),
        ));
    }

    if cfg.read_buffer_capacity == 0 {
        return Err(SupervisorError::Config(
            "[supervisor].read_buffer_capacity must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.channel_capacity == 0 {
        return Err(SupervisorError::Config(
            "[supervisor].channel_capacity must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}
