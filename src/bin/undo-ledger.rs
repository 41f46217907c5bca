use std::fs::File;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use undo_ledger::{
    bin_utils::Service, command::TransactionId, config::Config,
    processor::TransactionProcessError,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let accounts_file = args
        .next()
        .context("Expected an accounts file name as the first argument")?;
    let transactions_file = args
        .next()
        .context("Expected a transactions file name as the second argument")?;
    let undo_from = args
        .next()
        .map(|id| id.parse::<TransactionId>())
        .transpose()
        .context("Expected a transaction id as the third argument")?;

    let accounts = File::open(&accounts_file)
        .with_context(|| format!("Failed to open `{accounts_file}`"))?;
    let transactions = File::open(&transactions_file)
        .with_context(|| format!("Failed to open `{transactions_file}`"))?;
    let config = Config::from_env()?;
    info!(?config, "starting");

    let service = Service {
        accounts,
        transactions,
        output: &mut std::io::stdout(),
        undo_from,
        config,
        error_printer: Box::new(|line, err| match err {
            // aborted by the engine and already rolled back
            TransactionProcessError::AccountErr(err) => info!(line, %err, "transaction aborted"),
            err => warn!(line, %err, "rejected"),
        }),
    };
    service.run()
}
