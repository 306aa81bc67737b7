//! Command execution abstraction for rsbackup.
//!
//! This module provides:
//! - [`CommandSpec`]: A named action plus the command line to run
//! - [`ExecutionResult`]: Exit status and captured output
//! - [`CommandExecutor`]: Trait for command execution strategies
//! - [`RealCommandExecutor`]: Production implementation running `sh -c`

mod pipe;
mod real;

use std::process::ExitStatus;

use camino::{Utf8Path, Utf8PathBuf};

use crate::command::ToolInvocation;
use crate::error::BackupError;

pub use real::RealCommandExecutor;

/// Specification for a command to be executed
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Name of the action, used in failure messages (e.g., `invoke_save`)
    pub action: String,
    /// The rendered command line
    pub invocation: ToolInvocation,
    /// Redirect stdout into this file instead of capturing it
    pub stdout_file: Option<Utf8PathBuf>,
}

impl CommandSpec {
    /// Creates a new CommandSpec for the given action
    #[must_use]
    pub fn new(action: impl Into<String>, invocation: ToolInvocation) -> Self {
        Self {
            action: action.into(),
            invocation,
            stdout_file: None,
        }
    }

    /// Sends the command's stdout to `path` (created or truncated).
    #[must_use]
    pub fn with_stdout_file(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.stdout_file = Some(path.into());
        self
    }

    /// Returns the command line as it will be run.
    pub fn command_line(&self) -> String {
        self.invocation.command_line()
    }

    pub fn stdout_path(&self) -> Option<&Utf8Path> {
        self.stdout_file.as_deref()
    }
}

/// Result of command execution
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Exit status of the command (None in dry-run mode)
    pub status: Option<ExitStatus>,
    /// Captured stdout (empty when redirected to a file)
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
}

impl ExecutionResult {
    /// Result returned for commands that were only logged.
    #[must_use]
    pub fn dry_run() -> Self {
        Self {
            status: None,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// Builds a result for a process that exited with `code`.
    #[cfg(unix)]
    #[must_use]
    pub fn exited(code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        use std::os::unix::process::ExitStatusExt;
        Self {
            status: Some(ExitStatus::from_raw((code & 0xff) << 8)),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Returns true if the command was not actually run.
    pub fn is_dry_run(&self) -> bool {
        self.status.is_none()
    }

    /// Returns true if the process exited with status 0.
    ///
    /// In dry-run mode (status is None), this always returns true.
    pub fn success(&self) -> bool {
        self.status.is_none_or(|s| s.success())
    }

    /// Returns the exit code if available
    pub fn code(&self) -> Option<i32> {
        self.status.and_then(|s| s.code())
    }

    /// Returns stdout followed by stderr, separated by a newline when both are present.
    pub fn captured_output(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => {
                let sep = if self.stdout.ends_with('\n') { "" } else { "\n" };
                format!("{}{}{}", self.stdout, sep, self.stderr)
            }
        }
    }
}

/// Trait for command execution.
///
/// Implementations must be `Send + Sync` so a single executor can be shared
/// across adapters as `Arc<dyn CommandExecutor>`.
pub trait CommandExecutor: Send + Sync {
    /// Executes a command, blocking until it exits.
    ///
    /// Fails with [`BackupError::Execution`] only when the process could not
    /// be run; a non-zero exit is reported through the returned status.
    fn execute(&self, spec: &CommandSpec) -> Result<ExecutionResult, BackupError>;
}
