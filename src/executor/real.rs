//! Real command executor implementation.
//!
//! This module provides [`RealCommandExecutor`], which runs rendered command
//! lines through `sh -c`, capturing stdout and stderr separately.

use std::fs::File;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::thread::JoinHandle;

use which::which;

use super::pipe::{StreamType, panic_message, read_pipe};
use super::{CommandExecutor, CommandSpec, ExecutionResult};
use crate::error::BackupError;

/// `sh` exit status for a command that could not be found.
const EXIT_NOT_FOUND: i32 = 127;
/// `sh` exit status for a command that was found but could not be executed.
const EXIT_NOT_EXECUTABLE: i32 = 126;

/// Kills a child process and joins its reader threads.
///
/// Called from error paths in [`RealCommandExecutor::execute()`] so a failed
/// wait or thread spawn never leaks a process.
fn cleanup_child_process<I>(child: &mut Child, handles: I)
where
    I: IntoIterator<Item = JoinHandle<String>>,
{
    let pid = child.id();
    if let Err(e) = child.kill() {
        tracing::debug!(pid = pid, "kill returned error (process may have already exited): {}", e);
    }
    if let Err(e) = child.wait() {
        tracing::warn!(pid = pid, "failed to wait for child process after kill: {}", e);
    }
    for handle in handles {
        if let Err(e) = handle.join() {
            tracing::warn!("reader thread panicked during cleanup: {}", panic_message(&*e));
        }
    }
}

/// Command executor that runs actual system commands.
///
/// When `dry_run` is true, commands are logged but not executed,
/// and `execute()` returns [`ExecutionResult::dry_run()`].
pub struct RealCommandExecutor {
    pub dry_run: bool,
}

impl RealCommandExecutor {
    fn execution_error(spec: &CommandSpec, status: impl Into<String>) -> BackupError {
        BackupError::Execution {
            command: spec.command_line(),
            status: status.into(),
        }
    }
}

impl CommandExecutor for RealCommandExecutor {
    fn execute(&self, spec: &CommandSpec) -> Result<ExecutionResult, BackupError> {
        let command_line = spec.command_line();

        if self.dry_run {
            tracing::info!(action = %spec.action, "dry run: {}", command_line);
            return Ok(ExecutionResult::dry_run());
        }

        let shell = which("sh")
            .map_err(|e| Self::execution_error(spec, format!("sh not found in PATH: {}", e)))?;

        let mut command = Command::new(shell);
        command.arg("-c").arg(&command_line);
        command.stdin(Stdio::null());
        command.stderr(Stdio::piped());

        match spec.stdout_path() {
            Some(path) => {
                let file = File::create(path)
                    .map_err(|e| BackupError::io(format!("failed to create {}", path), e))?;
                command.stdout(Stdio::from(file));
            }
            None => {
                command.stdout(Stdio::piped());
            }
        }

        tracing::debug!(action = %spec.action, "running: {}", command_line);

        let mut child = command
            .spawn()
            .map_err(|e| Self::execution_error(spec, format!("failed to spawn: {}", e)))?;

        tracing::trace!(action = %spec.action, pid = child.id(), "spawned command");

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();

        let stdout_handle = match thread::Builder::new()
            .name("stdout-reader".to_string())
            .spawn(move || read_pipe(stdout_pipe, StreamType::Stdout))
        {
            Ok(handle) => handle,
            Err(e) => {
                cleanup_child_process(&mut child, []);
                return Err(Self::execution_error(
                    spec,
                    format!("failed to spawn stdout reader thread: {}", e),
                ));
            }
        };

        let stderr_handle = match thread::Builder::new()
            .name("stderr-reader".to_string())
            .spawn(move || read_pipe(stderr_pipe, StreamType::Stderr))
        {
            Ok(handle) => handle,
            Err(e) => {
                cleanup_child_process(&mut child, [stdout_handle]);
                return Err(Self::execution_error(
                    spec,
                    format!("failed to spawn stderr reader thread: {}", e),
                ));
            }
        };

        let status = match child.wait() {
            Ok(s) => s,
            Err(e) => {
                cleanup_child_process(&mut child, [stdout_handle, stderr_handle]);
                return Err(Self::execution_error(
                    spec,
                    format!("failed to wait for command: {}", e),
                ));
            }
        };

        let mut captured = Vec::with_capacity(2);
        let mut panicked_streams = Vec::new();
        for (name, handle) in [("stdout", stdout_handle), ("stderr", stderr_handle)] {
            match handle.join() {
                Ok(text) => captured.push(text),
                Err(e) => {
                    let msg = panic_message(&*e);
                    tracing::error!(stream = name, panic = msg, "reader thread panicked");
                    panicked_streams.push(format!("{}: {}", name, msg));
                }
            }
        }

        if !panicked_streams.is_empty() {
            return Err(Self::execution_error(
                spec,
                format!(
                    "reader thread(s) panicked during command execution: {}",
                    panicked_streams.join(", ")
                ),
            ));
        }

        let stderr = captured.pop().unwrap_or_default();
        let stdout = captured.pop().unwrap_or_default();

        match status.code() {
            Some(EXIT_NOT_FOUND) => {
                return Err(Self::execution_error(
                    spec,
                    format!(
                        "utility not found (exit status {}): {}",
                        EXIT_NOT_FOUND,
                        stderr.trim()
                    ),
                ));
            }
            Some(EXIT_NOT_EXECUTABLE) => {
                return Err(Self::execution_error(
                    spec,
                    format!(
                        "utility not executable (exit status {}): {}",
                        EXIT_NOT_EXECUTABLE,
                        stderr.trim()
                    ),
                ));
            }
            _ => {}
        }

        tracing::trace!(action = %spec.action, "executed command: success={}", status.success());

        Ok(ExecutionResult {
            status: Some(status),
            stdout,
            stderr,
        })
    }
}
