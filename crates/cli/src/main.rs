//! `hoard`: the composition root. Owns the one [`Registry`] for the process.

mod args;
mod commands;
mod error;

use clap::Parser;
use exn::ResultExt;
use hoard_config::Config;
use hoard_import::Importers;
use hoard_registry::Registry;
use hoard_store::Store;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::args::Cli;
use crate::error::{ErrorKind, Result};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:?}");
            ExitCode::FAILURE
        },
    }
}

fn init_tracing(verbose: u8, quiet: u8) {
    let filter = match (verbose, quiet) {
        (0, 0) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        (0, 1) => EnvFilter::new("error"),
        (0, _) => EnvFilter::new("off"),
        (1, _) => EnvFilter::new("info"),
        (2, _) => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    if let Some(database) = cli.database {
        config.database = database;
    }
    tracing::debug!(database = %config.database.display(), "configuration loaded");
    let registry = Registry::new(Store::open(&config.database), Importers::new(config.import), config.defaults);
    registry.initialize().await.or_raise(|| ErrorKind::Registry)?;
    let result = commands::run(&registry, cli.command).await;
    registry.close().await;
    result
}
