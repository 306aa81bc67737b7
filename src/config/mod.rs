//! Profile loading and validation.

mod migrate;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use strum::Display;

use crate::adapter::{AdapterConfig, AdapterDefaults};
use crate::command::Utilities;
use crate::delivery::Compression;
use crate::error::BackupError;

pub use migrate::migrate;

/// Compression transform applied to snapshot artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Display)]
#[serde(tag = "type", rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CompressionConfig {
    Gzip,
    Bzip2,
    Xz,
    Zstd,
    /// Any command that compresses `-c <file>` to stdout.
    Custom { command: String, extension: String },
}

impl CompressionConfig {
    pub fn to_compression(&self) -> Compression {
        match self {
            Self::Gzip => Compression::new("gzip", ".gz"),
            Self::Bzip2 => Compression::new("bzip2", ".bz2"),
            Self::Xz => Compression::new("xz", ".xz"),
            Self::Zstd => Compression::new("zstd", ".zst"),
            Self::Custom { command, extension } => Compression::new(command, extension),
        }
    }
}

/// A backup profile.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Profile {
    /// Root directory for snapshot artifacts.
    pub dump_dir: Utf8PathBuf,
    /// Utility-name overrides, e.g. `redis-cli: /opt/redis/bin/redis-cli`.
    #[serde(default)]
    pub utilities: BTreeMap<String, Utf8PathBuf>,
    #[serde(default)]
    pub compression: Option<CompressionConfig>,
    #[serde(default)]
    pub defaults: AdapterDefaults,
    #[serde(default)]
    pub adapters: Vec<AdapterConfig>,
}

impl Profile {
    /// Layers defaults beneath every adapter and resolves relative paths.
    fn finalize(&mut self, base_dir: &Utf8Path) {
        if self.dump_dir.is_relative() {
            self.dump_dir = base_dir.join(&self.dump_dir);
        }
        for adapter in &mut self.adapters {
            adapter.apply_defaults(&self.defaults);
            adapter.resolve_paths(base_dir);
        }
    }

    /// Validates the profile after defaults have been applied.
    pub fn validate(&self) -> Result<(), BackupError> {
        if self.adapters.is_empty() {
            return Err(BackupError::Validation("profile defines no adapters".to_string()));
        }

        if let Some(CompressionConfig::Custom { command, extension }) = &self.compression {
            if command.trim().is_empty() {
                return Err(BackupError::Validation(
                    "custom compression command must not be empty".to_string(),
                ));
            }
            if extension.is_empty() {
                return Err(BackupError::Validation(
                    "custom compression extension must not be empty".to_string(),
                ));
            }
        }

        let mut labels = BTreeSet::new();
        for (index, adapter) in self.adapters.iter().enumerate() {
            let adapter = adapter.as_adapter();
            adapter.validate().map_err(|e| match e {
                BackupError::Validation(msg) => BackupError::Validation(format!(
                    "adapter {} validation failed: {}",
                    index + 1,
                    msg
                )),
                other => other,
            })?;
            let label = adapter.label();
            if !labels.insert(label.clone()) {
                return Err(BackupError::Validation(format!(
                    "duplicate adapter label {:?}; set a distinct `id`",
                    label
                )));
            }
        }

        Ok(())
    }

    pub fn compression(&self) -> Option<Compression> {
        self.compression.as_ref().map(CompressionConfig::to_compression)
    }

    /// Builds the utility resolver for this profile.
    pub fn utilities(&self, search_path: bool) -> Utilities {
        if search_path {
            Utilities::new(self.utilities.clone())
        } else {
            Utilities::passthrough(self.utilities.clone())
        }
    }
}

/// Parses a profile from YAML text.
///
/// Relative paths are resolved against `base_dir`.
pub fn parse_profile(yaml: &str, base_dir: &Utf8Path) -> Result<Profile, BackupError> {
    let mut document: serde_yaml::Value = serde_yaml::from_str(yaml)
        .map_err(|e| BackupError::Config(format!("failed to parse yaml: {}", e)))?;

    let migrated = migrate(&mut document);
    if migrated > 0 {
        tracing::debug!(migrated, "migrated deprecated profile fields");
    }

    let mut profile: Profile = serde_yaml::from_value(document)
        .map_err(|e| BackupError::Config(format!("invalid profile: {}", e)))?;
    profile.finalize(base_dir);
    Ok(profile)
}

/// Loads a profile from a YAML file.
pub fn load_profile(path: &Utf8Path) -> Result<Profile, BackupError> {
    let yaml = fs::read_to_string(path)
        .map_err(|e| BackupError::io(format!("failed to load file: {}", path), e))?;
    let base_dir = match path.parent() {
        Some(p) if !p.as_str().is_empty() => p,
        _ => Utf8Path::new("."),
    };
    parse_profile(&yaml, base_dir).map_err(|e| match e {
        BackupError::Config(msg) => BackupError::Config(format!("{}: {}", path, msg)),
        other => other,
    })
}
