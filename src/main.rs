use std::io;
use std::sync::Arc;

use anyhow::Result;
use clap::CommandFactory;
use rsbackup::cli::{self, Cli, Commands};
use rsbackup::executor::{CommandExecutor, RealCommandExecutor};

fn main() -> Result<()> {
    let args = cli::parse_args()?;

    if let Some(log_level) = args.command.log_level() {
        rsbackup::init_logging(log_level)?;
    }

    match &args.command {
        Commands::Perform(opts) => {
            let executor: Arc<dyn CommandExecutor> = Arc::new(RealCommandExecutor {
                dry_run: opts.dry_run,
            });
            rsbackup::run_perform(opts, executor)
        }
        Commands::Validate(opts) => rsbackup::run_validate(opts),
        Commands::Completions(opts) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(opts.shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
    }
}
