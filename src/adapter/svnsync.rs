//! Subversion mirror adapter.
//!
//! Keeps a local mirror repository in step with a remote one using
//! `svnsync`. The mirror is created and bound to the remote on first use.

use std::fs;
use std::sync::LazyLock;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use tracing::info;
use url::Url;

use super::{Adapter, AdapterContext, label_with_id, layer, resolve_path, run_step};
use crate::bootstrap::{BootstrapTarget, InitStep, ensure_initialized};
use crate::command::{ArgGroup, CommandBuilder, Quoting, ToolInvocation, Utilities};
use crate::error::BackupError;
use crate::executor::CommandSpec;
use crate::outcome::OutcomePattern;

const LABEL: &str = "SVNSync";
const DEFAULT_PROTOCOL: &str = "http";
const DEFAULT_PORT: u16 = 80;
const REVPROP_HOOK: &str = "hooks/pre-revprop-change";

// `svnlook` reports a missing repository by failing to open its `format`
// file. `svn status` reports one as not a working copy.
#[allow(clippy::expect_used)]
static NOT_INITIALIZED: LazyLock<OutcomePattern> = LazyLock::new(|| {
    OutcomePattern::new(
        r"is not a working copy|Can't open file '[^']*/format': No such file or directory",
    )
    .expect("constant regex pattern is valid")
});

#[allow(clippy::expect_used)]
static INIT_SUCCESS: LazyLock<OutcomePattern> = LazyLock::new(|| {
    OutcomePattern::new(r"(?m)^Copied properties for revision 0\.\s*$")
        .expect("constant regex pattern is valid")
});

// An up-to-date mirror makes svnsync print nothing at all.
#[allow(clippy::expect_used)]
static SYNC_SUCCESS: LazyLock<OutcomePattern> = LazyLock::new(|| {
    OutcomePattern::new(
        r"(?m)^(Committed revision \d+\.|Copied properties for revision \d+\.)\s*$|\A\s*\z",
    )
    .and_then(|p| p.with_failure(r"(?m)^svn(sync)?: E\d+:"))
    .map(OutcomePattern::requiring_zero_exit)
    .expect("constant regex pattern is valid")
});

/// Per-action overrides of the built-in patterns.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SvnSyncPatterns {
    /// Probe output meaning the mirror does not exist yet.
    pub not_initialized: Option<OutcomePattern>,
    /// Success pattern for `svnsync init`.
    pub init: Option<OutcomePattern>,
    /// Success pattern for `svnsync sync`.
    pub sync: Option<OutcomePattern>,
}

/// Configuration for the svnsync adapter.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SvnSyncConfig {
    pub id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// URL scheme of the remote repository (default `http`).
    pub protocol: Option<String>,
    pub host: Option<String>,
    /// Remote port (default 80).
    pub port: Option<u16>,
    /// Path of the repository on the remote host.
    pub repo_path: Option<String>,
    /// Local mirror repository.
    pub path: Option<Utf8PathBuf>,
    #[serde(default)]
    pub patterns: SvnSyncPatterns,
}

impl SvnSyncConfig {
    /// Fills unset fields from `defaults`. `id` is never inherited.
    pub fn apply_defaults(&mut self, defaults: &SvnSyncConfig) {
        layer(&mut self.username, &defaults.username);
        layer(&mut self.password, &defaults.password);
        layer(&mut self.protocol, &defaults.protocol);
        layer(&mut self.host, &defaults.host);
        layer(&mut self.port, &defaults.port);
        layer(&mut self.repo_path, &defaults.repo_path);
        layer(&mut self.path, &defaults.path);
        layer(&mut self.patterns.not_initialized, &defaults.patterns.not_initialized);
        layer(&mut self.patterns.init, &defaults.patterns.init);
        layer(&mut self.patterns.sync, &defaults.patterns.sync);
    }

    pub fn resolve_paths(&mut self, base_dir: &Utf8Path) {
        resolve_path(&mut self.path, base_dir);
    }

    fn required<'a>(&self, field: &str, value: Option<&'a str>) -> Result<&'a str, BackupError> {
        value
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                BackupError::Validation(format!("{}: {} is required", self.label(), field))
            })
    }

    fn path(&self) -> Result<&Utf8Path, BackupError> {
        self.required("path", self.path.as_deref().map(Utf8Path::as_str))
            .map(Utf8Path::new)
    }

    /// Remote repository URL: `<protocol>://<host>:<port><repo_path>`.
    pub fn url(&self) -> Result<String, BackupError> {
        let host = self.required("host", self.host.as_deref())?;
        let repo_path = self.required("repo_path", self.repo_path.as_deref())?;
        let protocol = self.protocol.as_deref().unwrap_or(DEFAULT_PROTOCOL);
        let port = self.port.unwrap_or(DEFAULT_PORT);
        let separator = if repo_path.starts_with('/') { "" } else { "/" };

        let url = format!("{}://{}:{}{}{}", protocol, host, port, separator, repo_path);
        Url::parse(&url).map_err(|e| {
            BackupError::Validation(format!(
                "{}: invalid repository URL {:?}: {}",
                self.label(),
                url,
                e
            ))
        })?;
        Ok(url)
    }

    /// `file://` URL of the local mirror.
    pub fn local_url(&self) -> Result<String, BackupError> {
        Ok(format!("file://{}", self.path()?))
    }

    fn push_source_credentials(&self, builder: &mut CommandBuilder) {
        builder.push_flag_value(
            ArgGroup::Credential,
            "--source-username",
            self.username.as_deref(),
            Quoting::IfNeeded,
        );
        builder.push_flag_value(
            ArgGroup::Credential,
            "--source-password",
            self.password.as_deref(),
            Quoting::IfNeeded,
        );
    }

    /// Builds `svnsync sync file://<path> <credentials> --non-interactive`.
    pub fn sync_command(&self, utilities: &Utilities) -> Result<ToolInvocation, BackupError> {
        let mut builder = CommandBuilder::for_utility(utilities, "svnsync")?;
        builder.push_literal(ArgGroup::Positional, "sync");
        builder.push_value(ArgGroup::Positional, self.local_url()?, Quoting::IfNeeded);
        self.push_source_credentials(&mut builder);
        builder.push_literal(ArgGroup::Extra, "--non-interactive");
        builder.build()
    }

    fn sync_pattern(&self) -> &OutcomePattern {
        self.patterns.sync.as_ref().unwrap_or(&*SYNC_SUCCESS)
    }

    /// The local mirror as a bootstrap target.
    pub fn mirror<'a>(&'a self, utilities: &'a Utilities) -> SvnMirror<'a> {
        SvnMirror {
            config: self,
            utilities,
        }
    }
}

impl Adapter for SvnSyncConfig {
    fn label(&self) -> String {
        label_with_id(LABEL, self.id.as_deref())
    }

    fn validate(&self) -> Result<(), BackupError> {
        self.path()?;
        self.url()?;
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(adapter = %self.label()))]
    fn perform(&self, ctx: &AdapterContext<'_>) -> Result<(), BackupError> {
        let path = self.path()?;
        let url = self.url()?;

        if !ctx.dry_run {
            fs::create_dir_all(path)
                .map_err(|e| BackupError::io(format!("failed to create directory: {}", path), e))?;
        }

        info!("syncing '{}' into '{}'", url, path);

        ensure_initialized(&self.mirror(ctx.utilities), ctx.executor)?;
        run_step(ctx, "sync", self.sync_command(ctx.utilities)?, self.sync_pattern())?;
        Ok(())
    }
}

/// The local mirror repository of an [`SvnSyncConfig`].
pub struct SvnMirror<'a> {
    config: &'a SvnSyncConfig,
    utilities: &'a Utilities,
}

impl SvnMirror<'_> {
    fn hook_path(&self) -> Result<Utf8PathBuf, BackupError> {
        Ok(self.config.path()?.join(REVPROP_HOOK))
    }

    fn create_command(&self) -> Result<ToolInvocation, BackupError> {
        let mut builder = CommandBuilder::for_utility(self.utilities, "svnadmin")?;
        builder.push_literal(ArgGroup::Positional, "create");
        builder.push_value(ArgGroup::Positional, self.config.path()?.as_str(), Quoting::Always);
        builder.build()
    }

    // svnsync needs a pre-revprop-change hook that accepts every change.
    fn write_hook_command(&self) -> Result<ToolInvocation, BackupError> {
        let mut builder = CommandBuilder::new("echo");
        builder.push_value(ArgGroup::Positional, "#!/bin/sh", Quoting::Always);
        builder.push_literal(ArgGroup::Positional, ">");
        builder.push_value(ArgGroup::Positional, self.hook_path()?.into_string(), Quoting::Always);
        builder.build()
    }

    fn chmod_hook_command(&self) -> Result<ToolInvocation, BackupError> {
        let mut builder = CommandBuilder::for_utility(self.utilities, "chmod")?;
        builder.push_literal(ArgGroup::Positional, "+x");
        builder.push_value(ArgGroup::Positional, self.hook_path()?.into_string(), Quoting::Always);
        builder.build()
    }

    fn init_command(&self) -> Result<ToolInvocation, BackupError> {
        let mut builder = CommandBuilder::for_utility(self.utilities, "svnsync")?;
        builder.push_literal(ArgGroup::Positional, "init");
        builder.push_value(ArgGroup::Positional, self.config.local_url()?, Quoting::IfNeeded);
        builder.push_value(ArgGroup::Positional, self.config.url()?, Quoting::IfNeeded);
        self.config.push_source_credentials(&mut builder);
        builder.build()
    }
}

impl BootstrapTarget for SvnMirror<'_> {
    fn target(&self) -> String {
        self.config
            .path
            .as_ref()
            .map(|p| p.to_string())
            .unwrap_or_default()
    }

    fn probe(&self) -> Result<CommandSpec, BackupError> {
        let mut builder = CommandBuilder::for_utility(self.utilities, "svnlook")?;
        builder.push_literal(ArgGroup::Positional, "uuid");
        builder.push_value(ArgGroup::Positional, self.config.path()?.as_str(), Quoting::Always);
        Ok(CommandSpec::new("probe", builder.build()?))
    }

    fn uninitialized_pattern(&self) -> &OutcomePattern {
        self.config
            .patterns
            .not_initialized
            .as_ref()
            .unwrap_or(&*NOT_INITIALIZED)
    }

    fn initialization_sequence(&self) -> Result<Vec<InitStep>, BackupError> {
        let init_pattern = self.config.patterns.init.as_ref().unwrap_or(&*INIT_SUCCESS);
        Ok(vec![
            InitStep::new(
                CommandSpec::new("create", self.create_command()?),
                OutcomePattern::silent(),
            ),
            InitStep::new(
                CommandSpec::new("write_hook", self.write_hook_command()?),
                OutcomePattern::silent(),
            ),
            InitStep::new(
                CommandSpec::new("chmod_hook", self.chmod_hook_command()?),
                OutcomePattern::silent(),
            ),
            InitStep::new(
                CommandSpec::new("remote_init", self.init_command()?),
                init_pattern.clone(),
            ),
        ])
    }
}
