//! Backup adapters.
//!
//! Each adapter backs up one kind of source by driving that source's own
//! utilities. Adapters are configuration structs implementing [`Adapter`];
//! [`AdapterConfig`] selects the variant from the profile's `type` field.
//!
//! Adding a new adapter requires:
//! 1. Creating a config struct implementing [`Adapter`]
//! 2. Adding a variant to [`AdapterConfig`] and a field to [`AdapterDefaults`]
//! 3. Implementing the match arms on `AdapterConfig`

mod config;
pub mod redis;
pub mod svnsync;

use camino::Utf8Path;
use tracing::info;

use crate::command::{ToolInvocation, Utilities};
use crate::delivery::Compression;
use crate::error::BackupError;
use crate::executor::{CommandExecutor, CommandSpec, ExecutionResult};
use crate::outcome::{OutcomePattern, ensure_success};

pub use config::{AdapterConfig, AdapterDefaults};
pub use redis::RedisConfig;
pub use svnsync::SvnSyncConfig;

/// Everything an adapter needs from the surrounding run.
pub struct AdapterContext<'a> {
    pub executor: &'a dyn CommandExecutor,
    pub utilities: &'a Utilities,
    /// Root directory for snapshot artifacts.
    pub dump_dir: &'a Utf8Path,
    pub compression: Option<&'a Compression>,
    /// When set, commands are only logged and no files are written.
    pub dry_run: bool,
}

/// A unit that backs up one source.
pub trait Adapter {
    /// Label used in log events and artifact names (e.g., `Redis-cache`).
    fn label(&self) -> String;

    /// Checks the configuration after defaults have been layered in.
    fn validate(&self) -> Result<(), BackupError>;

    /// Runs the backup. Any error aborts the adapter immediately.
    fn perform(&self, ctx: &AdapterContext<'_>) -> Result<(), BackupError>;
}

/// Runs `adapter`, emitting `started` and `finished` lifecycle events.
pub fn perform_logged(adapter: &dyn Adapter, ctx: &AdapterContext<'_>) -> Result<(), BackupError> {
    let label = adapter.label();
    info!(phase = "started", adapter = %label, "{} started", label);
    adapter.perform(ctx)?;
    info!(phase = "finished", adapter = %label, "{} finished", label);
    Ok(())
}

/// Executes one command and classifies its output.
pub(crate) fn run_step(
    ctx: &AdapterContext<'_>,
    action: &str,
    invocation: ToolInvocation,
    pattern: &OutcomePattern,
) -> Result<ExecutionResult, BackupError> {
    let spec = CommandSpec::new(action, invocation);
    let result = ctx.executor.execute(&spec)?;
    ensure_success(&spec, &result, pattern)?;
    Ok(result)
}

/// Fills `value` from `default` when the instance left it unset.
pub(crate) fn layer<T: Clone>(value: &mut Option<T>, default: &Option<T>) {
    if value.is_none() {
        value.clone_from(default);
    }
}

/// Resolves a relative path against `base_dir`.
pub(crate) fn resolve_path(path: &mut Option<camino::Utf8PathBuf>, base_dir: &Utf8Path) {
    if let Some(p) = path
        && p.is_relative()
    {
        *p = base_dir.join(&*p);
    }
}

/// Returns the label `<kind>` or `<kind>-<id>`.
pub(crate) fn label_with_id(kind: &str, id: Option<&str>) -> String {
    match id.filter(|id| !id.is_empty()) {
        Some(id) => format!("{}-{}", kind, id),
        None => kind.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    #[test]
    fn layer_keeps_explicit_value() {
        let mut value = Some("explicit".to_string());
        layer(&mut value, &Some("default".to_string()));
        assert_eq!(value.as_deref(), Some("explicit"));
    }

    #[test]
    fn layer_fills_missing_value() {
        let mut value: Option<u16> = None;
        layer(&mut value, &Some(6379));
        assert_eq!(value, Some(6379));
    }

    #[test]
    fn resolve_path_only_touches_relative_paths() {
        let base = Utf8Path::new("/etc/rsbackup");
        let mut relative = Some(Utf8PathBuf::from("data"));
        let mut absolute = Some(Utf8PathBuf::from("/var/lib/redis"));
        resolve_path(&mut relative, base);
        resolve_path(&mut absolute, base);
        assert_eq!(relative.unwrap(), "/etc/rsbackup/data");
        assert_eq!(absolute.unwrap(), "/var/lib/redis");
    }

    #[test]
    fn label_with_optional_id() {
        assert_eq!(label_with_id("Redis", None), "Redis");
        assert_eq!(label_with_id("Redis", Some("")), "Redis");
        assert_eq!(label_with_id("Redis", Some("cache")), "Redis-cache");
    }
}
