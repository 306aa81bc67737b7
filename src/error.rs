//! Domain-specific error types for rsbackup.
//!
//! This module defines `BackupError`, a `thiserror`-based enum that every
//! adapter operation returns. A single error type flows through command
//! construction, execution, outcome classification, bootstrap and delivery,
//! so an aborted `perform()` always carries the offending command, the
//! action name and the captured output.
//!
//! `BackupError` implements `Into<anyhow::Error>`, so the `?` operator
//! converts it automatically in the CLI orchestration that uses `anyhow::Result`.

use std::io;

/// Formats an IO error kind into a human-readable message.
///
/// Provides consistent, user-friendly messages for common IO error kinds
/// (e.g., "I/O error: not found") instead of the OS-level messages
/// (e.g., "No such file or directory (os error 2)"). For unrecognized
/// error kinds, falls back to including the OS-level error message
/// directly (e.g., "I/O error: connection refused").
pub(crate) fn io_error_kind_message(err: &io::Error) -> String {
    match err.kind() {
        io::ErrorKind::NotFound => "I/O error: not found".to_string(),
        io::ErrorKind::PermissionDenied => "I/O error: permission denied".to_string(),
        io::ErrorKind::IsADirectory => "I/O error: is a directory".to_string(),
        _ => format!("I/O error: {}", err),
    }
}

/// Domain-specific error type for rsbackup.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BackupError {
    /// A validation constraint was violated.
    #[error("validation error: {0}")]
    Validation(String),

    /// A configuration file could not be loaded or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// A configuration value cannot be rendered as a literal shell token.
    #[error("cannot construct command: {0}")]
    CommandConstruction(String),

    /// The process could not be run at all (spawn failure, utility missing,
    /// permission denied, reader thread failure).
    #[error("command execution failed: {command}: {status}")]
    Execution {
        /// The command line that was attempted.
        command: String,
        /// Human-readable reason for the failure.
        status: String,
    },

    /// The process ran, but its output carried no recognized success marker.
    #[error("could not {action}\ncommand was: {command}\nresponse was: {output}")]
    ToolReportedFailure {
        /// Name of the attempted action (e.g., `invoke_save`).
        action: String,
        /// The exact command line that was run.
        command: String,
        /// Full captured output of the command.
        output: String,
    },

    /// The artifact expected after the backup steps does not exist.
    #[error("artifact not found: {path}")]
    ArtifactNotFound {
        /// Path where the artifact was expected.
        path: String,
    },

    /// The bootstrap probe failed in an unrecognized way; the target is
    /// neither known to be initialized nor known to be empty.
    #[error(
        "cannot determine whether {target} is initialized\n\
         command was: {command}\n\
         response was: {output}"
    )]
    BootstrapAmbiguous {
        /// The probed target.
        target: String,
        /// The probe command line.
        command: String,
        /// Full captured output of the probe.
        output: String,
    },

    /// An I/O operation failed with contextual information.
    #[error("{context}: {message}")]
    Io {
        /// What was being done when the error occurred.
        context: String,
        /// Human-readable description derived from [`io_error_kind_message`].
        message: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl BackupError {
    /// Creates an `Io` variant with the `message` field automatically derived
    /// from the `source` via [`io_error_kind_message`].
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            message: io_error_kind_message(&source),
            source,
        }
    }

    /// Returns the command line attached to this error, if any.
    pub fn command(&self) -> Option<&str> {
        match self {
            Self::Execution { command, .. }
            | Self::ToolReportedFailure { command, .. }
            | Self::BootstrapAmbiguous { command, .. } => Some(command),
            _ => None,
        }
    }
}
