// tests/config.rs

use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use pipevisor::SupervisorError;
use pipevisor::cli::CliArgs;
use pipevisor::config::{load_and_validate, load_from_path};
use pipevisor::resolve_config;

type TestResult = Result<(), Box<dyn Error>>;

fn write_config(dir: &tempfile::TempDir, contents: &str) -> std::io::Result<PathBuf> {
    let path = dir.path().join("Pipevisor.toml");
    fs::write(&path, contents)?;
    Ok(path)
}

#[test]
fn full_config_file_is_loaded() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = write_config(
        &dir,
        r#"
[process]
command = "java"
args = ["-Xmx1024M", "-jar", "server.jar", "nogui"]
dir = "/srv/minecraft"
name = "mc"

[supervisor]
stop_timeout = "30s"
shutdown_command = "end"
announce_prefix = "broadcast "
destroy_announcement = "bye all"
read_buffer_capacity = 512
channel_capacity = 16
"#,
    )?;

    let cfg = load_and_validate(&path)?;
    assert_eq!(cfg.launch.command, "java");
    assert_eq!(cfg.launch.args, ["-Xmx1024M", "-jar", "server.jar", "nogui"]);
    assert_eq!(cfg.launch.dir, Some(PathBuf::from("/srv/minecraft")));
    assert_eq!(cfg.name, "mc");
    assert_eq!(cfg.stop_timeout, Duration::from_secs(30));
    assert_eq!(cfg.shutdown_command, "end");
    assert_eq!(cfg.announcement_line("hello"), "broadcast hello");
    assert_eq!(cfg.destroy_announcement, "bye all");
    assert_eq!(cfg.read_buffer_capacity, 512);
    assert_eq!(cfg.channel_capacity, 16);
    Ok(())
}

#[test]
fn omitted_fields_take_defaults() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = write_config(&dir, "[process]\ncommand = \"cat\"\n")?;

    let cfg = load_and_validate(&path)?;
    assert_eq!(cfg.name, "cat");
    assert!(cfg.launch.args.is_empty());
    assert_eq!(cfg.launch.dir, None);
    assert_eq!(cfg.stop_timeout, Duration::from_secs(10));
    assert_eq!(cfg.shutdown_command, "stop");
    assert_eq!(cfg.announcement_line("x"), "say x");
    assert_eq!(cfg.destroy_announcement, "Server going down NOW");
    assert_eq!(cfg.read_buffer_capacity, 4096);
    assert_eq!(cfg.channel_capacity, 1024);
    Ok(())
}

#[test]
fn invalid_values_are_config_errors() -> TestResult {
    let dir = tempfile::tempdir()?;

    let cases = [
        "[process]\ncommand = \"cat\"\n[supervisor]\nstop_timeout = \"soon\"\n",
        "[process]\ncommand = \"cat\"\n[supervisor]\nstop_timeout = \"0s\"\n",
        "[process]\ncommand = \"cat\"\n[supervisor]\nchannel_capacity = 0\n",
        "[process]\ncommand = \"cat\"\n[supervisor]\nread_buffer_capacity = 0\n",
        "[process]\ncommand = \"cat\"\n[supervisor]\nshutdown_command = \"  \"\n",
        "[process]\nargs = [\"no command\"]\n",
    ];

    for contents in cases {
        let path = write_config(&dir, contents)?;
        match load_and_validate(&path) {
            Err(SupervisorError::Config(msg)) => assert!(!msg.is_empty()),
            other => panic!("expected Config error for {contents:?}, got {other:?}"),
        }
    }
    Ok(())
}

#[test]
fn malformed_toml_is_reported() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = write_config(&dir, "[process\ncommand = ")?;

    assert!(matches!(
        load_from_path(&path),
        Err(SupervisorError::Toml(_))
    ));
    assert!(matches!(
        load_from_path(dir.path().join("missing.toml")),
        Err(SupervisorError::Io(_))
    ));
    Ok(())
}

#[test]
fn command_line_overrides_the_file() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = write_config(
        &dir,
        "[process]\ncommand = \"java\"\nargs = [\"-jar\"]\n[supervisor]\nstop_timeout = \"30s\"\n",
    )?;
    let config_arg = path.to_str().ok_or("non utf-8 temp path")?;

    let args = CliArgs::try_parse_from([
        "pipevisor",
        "--config",
        config_arg,
        "--stop-timeout",
        "750ms",
        "--name",
        "survival",
        "--dir",
        "/tmp",
        "--",
        "sh",
        "-c",
        "cat",
    ])?;
    let cfg = resolve_config(&args)?;

    assert_eq!(cfg.launch.command, "sh");
    assert_eq!(cfg.launch.args, ["-c", "cat"]);
    assert_eq!(cfg.launch.dir, Some(PathBuf::from("/tmp")));
    assert_eq!(cfg.name, "survival");
    assert_eq!(cfg.stop_timeout, Duration::from_millis(750));
    Ok(())
}

#[test]
fn file_values_survive_without_overrides() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = write_config(
        &dir,
        "[process]\ncommand = \"java\"\nargs = [\"-jar\"]\n[supervisor]\nstop_timeout = \"30s\"\n",
    )?;
    let config_arg = path.to_str().ok_or("non utf-8 temp path")?;

    let args = CliArgs::try_parse_from(["pipevisor", "--config", config_arg, "--dry-run"])?;
    assert!(args.dry_run);

    let cfg = resolve_config(&args)?;
    assert_eq!(cfg.launch.command, "java");
    assert_eq!(cfg.launch.args, ["-jar"]);
    assert_eq!(cfg.stop_timeout, Duration::from_secs(30));
    Ok(())
}

#[test]
fn bad_cli_timeout_is_rejected() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = write_config(&dir, "[process]\ncommand = \"cat\"\n")?;
    let config_arg = path.to_str().ok_or("non utf-8 temp path")?;

    let args = CliArgs::try_parse_from([
        "pipevisor",
        "--config",
        config_arg,
        "--stop-timeout",
        "forever",
    ])?;
    let err = resolve_config(&args).expect_err("invalid timeout accepted");
    assert!(err.to_string().contains("stop_timeout"), "got: {err}");
    Ok(())
}
