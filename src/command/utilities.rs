//! Utility-name resolution.

use std::collections::BTreeMap;

use camino::Utf8PathBuf;
use which::which;

use crate::error::BackupError;

/// Read-only mapping from utility names (e.g., `redis-cli`) to executables.
///
/// Explicit overrides always win. Otherwise the name is looked up in `PATH`,
/// unless the resolver was built with [`Utilities::passthrough`], in which case
/// the bare name is used as-is.
#[derive(Debug, Clone)]
pub struct Utilities {
    overrides: BTreeMap<String, Utf8PathBuf>,
    search_path: bool,
}

impl Utilities {
    /// Creates a resolver that searches `PATH` for names without an override.
    #[must_use]
    pub fn new(overrides: BTreeMap<String, Utf8PathBuf>) -> Self {
        Self {
            overrides,
            search_path: true,
        }
    }

    /// Creates a resolver that never touches `PATH`.
    #[must_use]
    pub fn passthrough(overrides: BTreeMap<String, Utf8PathBuf>) -> Self {
        Self {
            overrides,
            search_path: false,
        }
    }

    /// Resolves `name` to the executable that should be invoked.
    pub fn resolve(&self, name: &str) -> Result<String, BackupError> {
        if let Some(path) = self.overrides.get(name) {
            tracing::trace!(utility = name, path = %path, "using utility override");
            return Ok(path.to_string());
        }

        if !self.search_path {
            return Ok(name.to_string());
        }

        let found = which(name).map_err(|e| BackupError::Execution {
            command: name.to_string(),
            status: format!("not found in PATH: {}", e),
        })?;
        tracing::trace!(utility = name, path = %found.display(), "utility found");
        Ok(found.to_string_lossy().into_owned())
    }
}
