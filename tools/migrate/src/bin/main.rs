use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use chain_migrate::cli::{Cli, Command};
use chain_migrate::MigrateError;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(cli: &Cli) -> Result<(), MigrateError> {
    match &cli.command {
        Command::Probe(cmd) => cmd.run(),
        Command::Migrate(cmd) => cmd.run(),
        Command::RebuildCanonical(cmd) => cmd.run(),
        Command::ReplayConsensus(cmd) => cmd.run(),
        Command::SetHead(cmd) => cmd.run(),
        Command::Verify(cmd) => cmd.run(),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "chain-migrate failed");
            ExitCode::from(e.exit_code())
        }
    }
}
