// aurs-aio/src/process.rs
use std::path::Path;
use std::process::{Command, ExitStatus, Output, Stdio};
use std::sync::Arc;

use aurs_common::error::{AursError, Result};
use tracing::{debug, error};

fn build_command(
    command: &str,
    args: &[String],
    cwd: Option<&Path>,
    envs: &[(&str, &str)],
) -> Command {
    let mut cmd = Command::new(command);
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    cmd.envs(envs.iter().copied());
    cmd
}

/// Runs an external command and captures its output.
pub fn run_command_sync(
    command: &str,
    args: &[String],
    cwd: Option<&Path>,
    envs: &[(&str, &str)],
) -> Result<Output> {
    debug!(
        "Running command: {} {:?} (cwd: {:?}, envs: {:?})",
        command,
        args,
        cwd,
        envs.iter().map(|(k, _)| *k).collect::<Vec<_>>()
    );
    let mut cmd = build_command(command, args, cwd, envs);
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.stdin(Stdio::null());

    match cmd.output() {
        Ok(output) => {
            if !output.status.success() {
                debug!("Command failed with status: {}", output.status);
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !stdout.trim().is_empty() {
                    debug!("Stdout:\n{}", stdout.trim());
                }
                if !stderr.trim().is_empty() {
                    debug!("Stderr:\n{}", stderr.trim());
                }
            } else {
                debug!("Command finished successfully.");
            }
            Ok(output)
        }
        Err(e) => {
            error!("Failed to execute command {}: {}", command, e);
            Err(AursError::Io(Arc::new(e)))
        }
    }
}

/// Runs an external command attached to the terminal (builds, installs).
pub fn run_command_inherit(
    command: &str,
    args: &[String],
    cwd: Option<&Path>,
    envs: &[(&str, &str)],
) -> Result<ExitStatus> {
    debug!("Running interactive command: {} {:?} (cwd: {:?})", command, args, cwd);
    let mut cmd = build_command(command, args, cwd, envs);
    cmd.stdin(Stdio::inherit());
    cmd.stdout(Stdio::inherit());
    cmd.stderr(Stdio::inherit());
    cmd.status().map_err(|e| {
        error!("Failed to execute command {}: {}", command, e);
        AursError::CommandExecError(format!("{command}: {e}"))
    })
}

/// Prefixes `command` with a privilege tool such as `sudo`.
pub fn with_privilege(tool: Option<&str>, command: &str, args: &[String]) -> (String, Vec<String>) {
    match tool {
        Some(tool) => {
            let mut wrapped = Vec::with_capacity(args.len() + 1);
            wrapped.push(command.to_string());
            wrapped.extend_from_slice(args);
            (tool.to_string(), wrapped)
        }
        None => (command.to_string(), args.to_vec()),
    }
}

/// Stdout of a successful command as text, or `CommandExecError` with stderr.
pub fn stdout_or_error(command: &str, output: &Output) -> Result<String> {
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        Err(AursError::CommandExecError(format!(
            "{} exited with {}: {}",
            command,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}
