//! One-time initialization of backup destinations.
//!
//! A [`BootstrapTarget`] describes how to probe a destination and how to
//! initialize it. [`ensure_initialized`] probes once and runs the
//! initialization sequence only when the probe output proves the target is
//! uninitialized. A probe that fails in an unrecognized way is never taken as
//! a reason to initialize: re-initializing a populated target can destroy it.

use strum::Display;
use tracing::{debug, info};

use crate::error::BackupError;
use crate::executor::{CommandExecutor, CommandSpec, ExecutionResult};
use crate::outcome::{OutcomePattern, ensure_success};

/// State of a target, derived from a probe. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum BootstrapState {
    /// The probe reported the target as not yet initialized.
    Uninitialized,
    /// The probe succeeded without error output.
    Initialized,
    /// The probe failed in an unrecognized way.
    Unknown,
}

/// A single initialization command and the rule deciding its success.
#[derive(Debug, Clone)]
pub struct InitStep {
    pub spec: CommandSpec,
    pub pattern: OutcomePattern,
}

impl InitStep {
    pub fn new(spec: CommandSpec, pattern: OutcomePattern) -> Self {
        Self { spec, pattern }
    }
}

/// A destination that must be initialized before incremental syncs.
pub trait BootstrapTarget {
    /// Human-readable target description (usually its path).
    fn target(&self) -> String;

    /// Builds the cheap status-style command run against the target.
    fn probe(&self) -> Result<CommandSpec, BackupError>;

    /// Pattern whose presence in the probe output means "not initialized".
    fn uninitialized_pattern(&self) -> &OutcomePattern;

    /// Builds the ordered initialization sequence.
    fn initialization_sequence(&self) -> Result<Vec<InitStep>, BackupError>;
}

/// Interprets a probe result.
///
/// The probe's stderr carries the error text of interest; stdout is
/// consulted as well because some tools report everything on one stream.
pub fn interpret_probe(result: &ExecutionResult, uninitialized: &OutcomePattern) -> BootstrapState {
    if uninitialized.matches(&result.stderr) || uninitialized.matches(&result.stdout) {
        BootstrapState::Uninitialized
    } else if result.success() && result.stderr.trim().is_empty() {
        BootstrapState::Initialized
    } else {
        BootstrapState::Unknown
    }
}

/// Probes `target` and initializes it if, and only if, it is uninitialized.
///
/// Returns the state observed by the probe. Initialization steps run in
/// order; the first failing step aborts the sequence. In dry-run mode the
/// probe is only logged and the target is assumed initialized.
#[tracing::instrument(skip_all, fields(target = %target.target()))]
pub fn ensure_initialized(
    target: &dyn BootstrapTarget,
    executor: &dyn CommandExecutor,
) -> Result<BootstrapState, BackupError> {
    let probe = target.probe()?;
    let result = executor.execute(&probe)?;

    if result.is_dry_run() {
        info!("dry run: assuming {} is initialized", target.target());
        return Ok(BootstrapState::Initialized);
    }

    let state = interpret_probe(&result, target.uninitialized_pattern());
    debug!(state = %state, "probed bootstrap target");

    match state {
        BootstrapState::Initialized => Ok(state),
        BootstrapState::Uninitialized => {
            info!("Initializing repo");
            for step in target.initialization_sequence()? {
                let step_result = executor.execute(&step.spec)?;
                ensure_success(&step.spec, &step_result, &step.pattern)?;
            }
            info!("initialized {}", target.target());
            Ok(state)
        }
        BootstrapState::Unknown => Err(BackupError::BootstrapAmbiguous {
            target: target.target(),
            command: probe.command_line(),
            output: result.captured_output(),
        }),
    }
}
