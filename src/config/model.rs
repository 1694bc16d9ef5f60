// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Upper bound on a graceful stop before the child is killed.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_SHUTDOWN_COMMAND: &str = "stop";
pub const DEFAULT_ANNOUNCE_PREFIX: &str = "say ";
pub const DEFAULT_DESTROY_ANNOUNCEMENT: &str = "Server going down NOW";
pub const DEFAULT_READ_BUFFER_CAPACITY: usize = 4096;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [process]
/// command = "java"
/// args = ["-Xmx1024M", "-jar", "minecraft_server.jar", "nogui"]
/// dir = "/srv/minecraft"
///
/// [supervisor]
/// stop_timeout = "10s"
/// shutdown_command = "stop"
/// ```
///
/// Every field except `process.command` has a default. The command may also
/// be supplied on the command line instead.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub process: ProcessSection,

    #[serde(default)]
    pub supervisor: SupervisorSection,
}

/// `[process]` section: what to launch and where.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProcessSection {
    /// Executable to run (looked up in `PATH` if not absolute).
    #[serde(default)]
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory for the child; inherits ours if unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Name used in log spans. Defaults to the command.
    #[serde(default)]
    pub name: Option<String>,
}

/// `[supervisor]` section: how the child is driven.
#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorSection {
    /// Duration string (e.g. `"10s"`, `"500ms"`).
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout: String,

    /// Line written to the child's stdin to request a graceful exit.
    #[serde(default = "default_shutdown_command")]
    pub shutdown_command: String,

    /// Prepended to stop announcements before they reach the child.
    #[serde(default = "default_announce_prefix")]
    pub announce_prefix: String,

    /// Announcement sent by `destroy()`.
    #[serde(default = "default_destroy_announcement")]
    pub destroy_announcement: String,

    /// Size of the buffer behind each stdout/stderr reader, in bytes.
    #[serde(default = "default_read_buffer_capacity")]
    pub read_buffer_capacity: usize,

    /// Capacity of the inbound and outbound line channels.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_stop_timeout() -> String {
    "10s".to_string()
}

fn default_shutdown_command() -> String {
    DEFAULT_SHUTDOWN_COMMAND.to_string()
}

fn default_announce_prefix() -> String {
    DEFAULT_ANNOUNCE_PREFIX.to_string()
}

fn default_destroy_announcement() -> String {
    DEFAULT_DESTROY_ANNOUNCEMENT.to_string()
}

fn default_read_buffer_capacity() -> usize {
    DEFAULT_READ_BUFFER_CAPACITY
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

impl Default for SupervisorSection {
    fn default() -> Self {
        Self {
            stop_timeout: default_stop_timeout(),
            shutdown_command: default_shutdown_command(),
            announce_prefix: default_announce_prefix(),
            destroy_announcement: default_destroy_announcement(),
            read_buffer_capacity: default_read_buffer_capacity(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Immutable launch parameters for the child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    pub command: String,
    pub args: Vec<String>,
    pub dir: Option<PathBuf>,
}

impl LaunchConfig {
    pub fn new<I, S>(command: impl Into<String>, args: I, dir: Option<PathBuf>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            dir,
        }
    }
}

/// Validated configuration consumed by [`crate::supervisor::ProcessSupervisor`].
///
/// Build one from a TOML file via [`crate::config::load_and_validate`], or
/// directly with [`SupervisorConfig::new`] and adjust the public fields.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub launch: LaunchConfig,
    pub name: String,
    pub stop_timeout: Duration,
    pub shutdown_command: String,
    pub announce_prefix: String,
    pub destroy_announcement: String,
    pub read_buffer_capacity: usize,
    pub channel_capacity: usize,
}

impl SupervisorConfig {
    /// Configuration with every tunable at its default.
    pub fn new(launch: LaunchConfig) -> Self {
        Self {
            name: launch.command.clone(),
            launch,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            shutdown_command: DEFAULT_SHUTDOWN_COMMAND.to_string(),
            announce_prefix: DEFAULT_ANNOUNCE_PREFIX.to_string(),
            destroy_announcement: DEFAULT_DESTROY_ANNOUNCEMENT.to_string(),
            read_buffer_capacity: DEFAULT_READ_BUFFER_CAPACITY,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Text written to the child for a stop announcement.
    pub fn announcement_line(&self, message: &str) -> String {
        format!("{}{}", self.announce_prefix, message)
    }
}
