//! Adapter configuration enum.

use camino::Utf8Path;
use serde::Deserialize;

use super::Adapter;
use super::redis::RedisConfig;
use super::svnsync::SvnSyncConfig;

/// Adapter configuration.
///
/// The `type` field in YAML determines which variant is used.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AdapterConfig {
    /// Redis dump-file snapshot
    Redis(RedisConfig),
    /// Subversion mirror via svnsync
    Svnsync(SvnSyncConfig),
}

/// Per-type defaults layered beneath every adapter instance.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdapterDefaults {
    pub redis: RedisConfig,
    pub svnsync: SvnSyncConfig,
}

impl AdapterConfig {
    /// Returns a reference to the underlying adapter as a trait object.
    pub fn as_adapter(&self) -> &dyn Adapter {
        match self {
            AdapterConfig::Redis(cfg) => cfg,
            AdapterConfig::Svnsync(cfg) => cfg,
        }
    }

    /// Fills fields the instance left unset from the matching defaults.
    pub fn apply_defaults(&mut self, defaults: &AdapterDefaults) {
        match self {
            AdapterConfig::Redis(cfg) => cfg.apply_defaults(&defaults.redis),
            AdapterConfig::Svnsync(cfg) => cfg.apply_defaults(&defaults.svnsync),
        }
    }

    /// Resolves relative paths against the profile's directory.
    pub fn resolve_paths(&mut self, base_dir: &Utf8Path) {
        match self {
            AdapterConfig::Redis(cfg) => cfg.resolve_paths(base_dir),
            AdapterConfig::Svnsync(cfg) => cfg.resolve_paths(base_dir),
        }
    }
}
