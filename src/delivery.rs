//! Delivery of backup artifacts into the dump directory.
//!
//! The artifact is either copied byte for byte or streamed through a
//! compression command. Both paths write into a temporary file beside the
//! destination and rename it into place once complete, so a failed delivery
//! never leaves a truncated destination behind.

use std::fs::{self, File};
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::command::{ArgGroup, CommandBuilder, Quoting, Utilities};
use crate::error::BackupError;
use crate::executor::{CommandExecutor, CommandSpec};
use crate::outcome::{OutcomePattern, ensure_success};

/// A pass-through compression transform.
///
/// `command` is run as `<command> -c '<source>'` and must write the
/// compressed stream to stdout. `extension` is appended to the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compression {
    pub command: String,
    pub extension: String,
}

impl Compression {
    pub fn new(command: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            extension: extension.into(),
        }
    }

    /// Builds `<command> -c '<source>'`.
    ///
    /// The first word of `command` is resolved as a utility; remaining words
    /// are passed as individual arguments.
    pub fn invocation(
        &self,
        utilities: &Utilities,
        source: &Utf8Path,
    ) -> Result<CommandSpec, BackupError> {
        let mut words = self.command.split_whitespace();
        let utility = words.next().ok_or_else(|| {
            BackupError::CommandConstruction("compression command must not be empty".to_string())
        })?;

        let mut builder = CommandBuilder::for_utility(utilities, utility)?;
        for word in words {
            builder.push_value(ArgGroup::Extra, word, Quoting::IfNeeded);
        }
        builder.push_literal(ArgGroup::Extra, "-c");
        builder.push_value(ArgGroup::Positional, source.as_str(), Quoting::Always);

        Ok(CommandSpec::new("compress", builder.build()?))
    }
}

/// What to deliver and where.
#[derive(Debug, Clone)]
pub struct ArtifactSpec {
    pub source_path: Utf8PathBuf,
    pub destination_path: Utf8PathBuf,
    pub compression: Option<Compression>,
}

impl ArtifactSpec {
    /// The path the delivered artifact ends up at.
    pub fn final_path(&self) -> Utf8PathBuf {
        match &self.compression {
            Some(compression) => {
                Utf8PathBuf::from(format!("{}{}", self.destination_path, compression.extension))
            }
            None => self.destination_path.clone(),
        }
    }
}

/// Checks that the artifact exists and is a readable regular file.
pub fn verify_source(source: &Utf8Path) -> Result<(), BackupError> {
    let metadata = match fs::metadata(source) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(BackupError::ArtifactNotFound {
                path: source.to_string(),
            });
        }
        Err(e) => return Err(BackupError::io(format!("failed to read metadata: {}", source), e)),
    };
    if !metadata.is_file() {
        return Err(BackupError::ArtifactNotFound {
            path: source.to_string(),
        });
    }
    File::open(source).map_err(|e| BackupError::io(format!("failed to open {}", source), e))?;
    Ok(())
}

fn staging_file(destination: &Utf8Path) -> Result<(NamedTempFile, Utf8PathBuf), BackupError> {
    let dir = match destination.parent() {
        Some(p) if !p.as_str().is_empty() => p,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(dir)
        .map_err(|e| BackupError::io(format!("failed to create directory: {}", dir), e))?;

    let tmp = tempfile::Builder::new()
        .prefix(".rsbackup-")
        .tempfile_in(dir)
        .map_err(|e| BackupError::io(format!("failed to create temporary file in {}", dir), e))?;
    let tmp_path = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).map_err(|p| {
        BackupError::Validation(format!("temporary path is not valid UTF-8: {}", p.display()))
    })?;
    Ok((tmp, tmp_path))
}

fn persist(tmp: NamedTempFile, destination: &Utf8Path) -> Result<(), BackupError> {
    tmp.persist(destination).map_err(|e| {
        BackupError::io(format!("failed to move artifact into place: {}", destination), e.error)
    })?;
    Ok(())
}

/// Delivers the artifact described by `spec` and returns its final path.
#[tracing::instrument(skip_all, fields(source = %spec.source_path))]
pub fn deliver(
    spec: &ArtifactSpec,
    executor: &dyn CommandExecutor,
    utilities: &Utilities,
) -> Result<Utf8PathBuf, BackupError> {
    verify_source(&spec.source_path)?;

    let final_path = spec.final_path();
    let (mut tmp, tmp_path) = staging_file(&final_path)?;

    match &spec.compression {
        Some(compression) => {
            let command = compression
                .invocation(utilities, &spec.source_path)?
                .with_stdout_file(tmp_path.clone());
            let result = executor.execute(&command)?;
            if result.is_dry_run() {
                return Ok(final_path);
            }
            ensure_success(&command, &result, &OutcomePattern::silent())?;
            if !result.success() {
                return Err(BackupError::ToolReportedFailure {
                    action: command.action.clone(),
                    command: command.command_line(),
                    output: format!("exit status {:?}", result.code()),
                });
            }
        }
        None => {
            let mut source = File::open(&spec.source_path)
                .map_err(|e| BackupError::io(format!("failed to open {}", spec.source_path), e))?;
            let copied = io::copy(&mut source, tmp.as_file_mut())
                .map_err(|e| BackupError::io(format!("failed to copy {}", spec.source_path), e))?;
            debug!(bytes = copied, "copied artifact");
        }
    }

    tmp.as_file()
        .sync_all()
        .map_err(|e| BackupError::io(format!("failed to sync {}", tmp_path), e))?;
    persist(tmp, &final_path)?;

    info!("delivered artifact to {}", final_path);
    Ok(final_path)
}
