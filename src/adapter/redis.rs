//! Redis snapshot adapter.
//!
//! Optionally asks the server to `SAVE` (or streams a remote snapshot with
//! `--rdb`), then copies the dump file into the dump directory:
//!
//! ```text
//! <dump_dir>/Redis[-<id>].rdb[<compression ext>]
//! ```

use std::sync::LazyLock;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use tracing::info;

use super::{Adapter, AdapterContext, label_with_id, layer, resolve_path, run_step};
use crate::command::{ArgGroup, CommandBuilder, Quoting, ToolInvocation, Utilities};
use crate::delivery::{ArtifactSpec, deliver};
use crate::error::BackupError;
use crate::outcome::OutcomePattern;

const UTILITY: &str = "redis-cli";
const LABEL: &str = "Redis";
const DEFAULT_NAME: &str = "dump";
const DUMP_EXTENSION: &str = ".rdb";

#[allow(clippy::expect_used)]
static SAVE_SUCCESS: LazyLock<OutcomePattern> =
    LazyLock::new(|| OutcomePattern::new(r"(?m)OK\s*$").expect("constant regex pattern is valid"));

#[allow(clippy::expect_used)]
static SYNC_REMOTE_SUCCESS: LazyLock<OutcomePattern> = LazyLock::new(|| {
    OutcomePattern::new(r"(?m)Transfer finished with success\.\s*$")
        .expect("constant regex pattern is valid")
});

/// Per-action overrides of the built-in success patterns.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedisPatterns {
    /// Pattern for `SAVE` output (default: a line ending in `OK`).
    pub save: Option<OutcomePattern>,
    /// Pattern for `--rdb` output (default: `Transfer finished with success.`).
    pub sync_remote: Option<OutcomePattern>,
}

/// Configuration for the Redis adapter.
///
/// Every field may be left unset and filled from `defaults.redis`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedisConfig {
    /// Distinguishes several Redis adapters in one profile.
    pub id: Option<String>,
    /// `dbfilename` from `redis.conf` without the `.rdb` extension (default `dump`).
    pub name: Option<String>,
    /// `dir` from `redis.conf`: the directory holding the dump file.
    pub path: Option<Utf8PathBuf>,
    /// Password passed to `redis-cli -a`.
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Unix socket; when set, `host` and `port` are ignored.
    pub socket: Option<Utf8PathBuf>,
    /// Extra `redis-cli` arguments, one per entry.
    pub additional_options: Option<Vec<String>>,
    /// Run `SAVE` before copying the dump file.
    pub invoke_save: Option<bool>,
    /// Stream the remote dump with `--rdb` before copying.
    pub sync_remote: Option<bool>,
    #[serde(default)]
    pub patterns: RedisPatterns,
}

impl RedisConfig {
    /// Fills unset fields from `defaults`. `id` is never inherited.
    ///
    /// `socket`, `host` and `port` are inherited together, and only when the
    /// instance names none of them.
    pub fn apply_defaults(&mut self, defaults: &RedisConfig) {
        layer(&mut self.name, &defaults.name);
        layer(&mut self.path, &defaults.path);
        layer(&mut self.password, &defaults.password);
        if self.socket.is_none() && self.host.is_none() && self.port.is_none() {
            layer(&mut self.socket, &defaults.socket);
            layer(&mut self.host, &defaults.host);
            layer(&mut self.port, &defaults.port);
        }
        layer(&mut self.additional_options, &defaults.additional_options);
        layer(&mut self.invoke_save, &defaults.invoke_save);
        layer(&mut self.sync_remote, &defaults.sync_remote);
        layer(&mut self.patterns.save, &defaults.patterns.save);
        layer(&mut self.patterns.sync_remote, &defaults.patterns.sync_remote);
    }

    pub fn resolve_paths(&mut self, base_dir: &Utf8Path) {
        resolve_path(&mut self.path, base_dir);
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_NAME)
    }

    fn path(&self) -> Result<&Utf8Path, BackupError> {
        self.path
            .as_deref()
            .ok_or_else(|| BackupError::Validation(format!("{}: path is required", self.label())))
    }

    /// Location of the dump file written by the server.
    pub fn dump_file(&self) -> Result<Utf8PathBuf, BackupError> {
        Ok(self.path()?.join(format!("{}{}", self.name(), DUMP_EXTENSION)))
    }

    fn socket(&self) -> Option<&str> {
        self.socket.as_deref().map(Utf8Path::as_str).filter(|s| !s.is_empty())
    }

    /// `redis-cli [-a pw] [-s socket | -h host -p port] [extra...]`
    fn base_command(&self, utilities: &Utilities) -> Result<CommandBuilder, BackupError> {
        let mut builder = CommandBuilder::for_utility(utilities, UTILITY)?;

        let password = self.password.as_deref();
        builder.push_flag_value(ArgGroup::Credential, "-a", password, Quoting::Always);

        // A socket and host/port are mutually exclusive for redis-cli.
        if let Some(socket) = self.socket() {
            builder.push_flag_value(ArgGroup::Connectivity, "-s", Some(socket), Quoting::Always);
        } else {
            let port = self.port.map(|p| p.to_string());
            let host = self.host.as_deref();
            builder.push_flag_value(ArgGroup::Connectivity, "-h", host, Quoting::Always);
            builder.push_flag_value(ArgGroup::Connectivity, "-p", port.as_deref(), Quoting::Always);
        }

        if let Some(options) = &self.additional_options {
            builder.push_values(ArgGroup::Extra, options, Quoting::IfNeeded);
        }

        Ok(builder)
    }

    /// Builds `redis-cli ... SAVE`.
    pub fn save_command(&self, utilities: &Utilities) -> Result<ToolInvocation, BackupError> {
        let mut builder = self.base_command(utilities)?;
        builder.push_literal(ArgGroup::Positional, "SAVE");
        builder.build()
    }

    /// Builds `redis-cli ... --rdb '<path>/<name>.rdb'`.
    pub fn sync_remote_command(
        &self,
        utilities: &Utilities,
    ) -> Result<ToolInvocation, BackupError> {
        let mut builder = self.base_command(utilities)?;
        builder.push_literal(ArgGroup::Positional, "--rdb");
        builder.push_value(ArgGroup::Positional, self.dump_file()?.into_string(), Quoting::Always);
        builder.build()
    }

    fn save_pattern(&self) -> &OutcomePattern {
        self.patterns.save.as_ref().unwrap_or(&*SAVE_SUCCESS)
    }

    fn sync_remote_pattern(&self) -> &OutcomePattern {
        self.patterns.sync_remote.as_ref().unwrap_or(&*SYNC_REMOTE_SUCCESS)
    }

    /// Destination of the artifact, before any compression extension.
    pub fn destination(&self, dump_dir: &Utf8Path) -> Utf8PathBuf {
        dump_dir.join(format!("{}{}", self.label(), DUMP_EXTENSION))
    }
}

impl Adapter for RedisConfig {
    fn label(&self) -> String {
        label_with_id(LABEL, self.id.as_deref())
    }

    fn validate(&self) -> Result<(), BackupError> {
        self.path()?;
        let name = self.name();
        if name.is_empty() || name.contains('/') {
            return Err(BackupError::Validation(format!(
                "{}: name must be a file name without directories, got {:?}",
                self.label(),
                name
            )));
        }
        if self.socket().is_some() && (self.host.is_some() || self.port.is_some()) {
            tracing::warn!(adapter = %self.label(), "socket is set; host and port are ignored");
        }
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(adapter = %self.label()))]
    fn perform(&self, ctx: &AdapterContext<'_>) -> Result<(), BackupError> {
        if self.sync_remote.unwrap_or(false) {
            let invocation = self.sync_remote_command(ctx.utilities)?;
            run_step(ctx, "sync_remote", invocation, self.sync_remote_pattern())?;
        }

        if self.invoke_save.unwrap_or(false) {
            run_step(ctx, "invoke_save", self.save_command(ctx.utilities)?, self.save_pattern())?;
        }

        let artifact = ArtifactSpec {
            source_path: self.dump_file()?,
            destination_path: self.destination(ctx.dump_dir),
            compression: ctx.compression.cloned(),
        };

        if ctx.dry_run {
            info!("dry run: would deliver {} to {}", artifact.source_path, artifact.final_path());
            return Ok(());
        }

        deliver(&artifact, ctx.executor, ctx.utilities)?;
        Ok(())
    }
}
