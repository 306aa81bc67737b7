pub mod adapter;
pub mod bootstrap;
pub mod cli;
pub mod command;
pub mod config;
pub mod delivery;
pub mod error;
pub mod executor;
pub mod outcome;

pub use error::BackupError;

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{FmtSubscriber, filter::LevelFilter};

use crate::adapter::{AdapterConfig, AdapterContext, perform_logged};
use crate::executor::CommandExecutor;

pub fn init_logging(log_level: cli::LogLevel) -> Result<()> {
    let filter = match log_level {
        cli::LogLevel::Trace => LevelFilter::TRACE,
        cli::LogLevel::Debug => LevelFilter::DEBUG,
        cli::LogLevel::Info => LevelFilter::INFO,
        cli::LogLevel::Warn => LevelFilter::WARN,
        cli::LogLevel::Error => LevelFilter::ERROR,
    };

    tracing::subscriber::set_global_default(
        FmtSubscriber::builder().with_max_level(filter).finish(),
    )
    .context("failed to set global default tracing subscriber")
}

/// Picks the adapters named by `--only`, or all of them when none are named.
fn select_adapters<'a>(
    adapters: &'a [AdapterConfig],
    only: &[String],
) -> Result<Vec<&'a AdapterConfig>> {
    if only.is_empty() {
        return Ok(adapters.iter().collect());
    }

    for label in only {
        if !adapters.iter().any(|a| a.as_adapter().label() == *label) {
            anyhow::bail!("no adapter labelled {:?} in profile", label);
        }
    }

    Ok(adapters
        .iter()
        .filter(|a| only.contains(&a.as_adapter().label()))
        .collect())
}

pub fn run_perform(opts: &cli::PerformArgs, executor: Arc<dyn CommandExecutor>) -> Result<()> {
    let file = &opts.common.file;
    let profile = config::load_profile(file)
        .with_context(|| format!("failed to load profile from {}", file))?;
    profile.validate().context("profile validation failed")?;

    // Without a real run there is nothing to find on PATH.
    let utilities = profile.utilities(!opts.dry_run);
    let compression = profile.compression();

    if !opts.dry_run && !profile.dump_dir.exists() {
        fs::create_dir_all(&profile.dump_dir)
            .with_context(|| format!("failed to create directory: {}", profile.dump_dir))?;
    }

    let selected = select_adapters(&profile.adapters, &opts.only)?;
    let ctx = AdapterContext {
        executor: executor.as_ref(),
        utilities: &utilities,
        dump_dir: &profile.dump_dir,
        compression: compression.as_ref(),
        dry_run: opts.dry_run,
    };

    let total = selected.len();
    let mut failed = 0;
    for (index, config) in selected.into_iter().enumerate() {
        let adapter = config.as_adapter();
        info!("running adapter {}/{}", index + 1, total);
        if let Err(e) = perform_logged(adapter, &ctx) {
            failed += 1;
            error!(adapter = %adapter.label(), "{} failed: {}", adapter.label(), e);
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} adapters failed", failed, total);
    }

    info!("all {} adapter(s) completed successfully", total);
    Ok(())
}

pub fn run_validate(opts: &cli::ValidateArgs) -> Result<()> {
    let file = &opts.common.file;
    let profile = config::load_profile(file)
        .with_context(|| format!("failed to load profile from {}", file))?;
    profile.validate().context("profile validation failed")?;
    info!("validation successful:\n{:#?}", profile);
    Ok(())
}
