//! CSV driver around the engine. It could live in its own crate next to the binary,
//! but the integration tests drive it directly, so it stays here.

use std::io::{Read, Write};
use std::sync::Arc;

use crate::{
    command::{Transaction, TransactionId},
    config::Config,
    processor::{
        TransactionProcessError, TransactionProcessor, checkpoint::Checkpointer,
        engine::TransactionEngine,
    },
};
use anyhow::{Context, Result};
use csv::Writer;
use csv_parser::{AccountRow, CsvParser, TransactionRow};
use csv_printer::{Stage, print_balances};
use tracing::info;

pub mod csv_parser;
pub mod csv_printer;

/// Loads accounts, runs a batch of transactions concurrently while the
/// checkpointer compacts the undo log, and prints the resulting balances.
///
/// The checkpointer keeps running while the optional range undo executes,
/// so the undo only reaches records it has not dropped yet. With an interval
/// shorter than the run, older transactions may no longer be undoable.
pub struct Service<'w, A, T, W: 'w> {
    pub accounts: A,
    pub transactions: T,
    pub output: &'w mut W,
    /// When set, balances are printed a second time after undoing every
    /// transaction from this id onward.
    pub undo_from: Option<TransactionId>,
    pub config: Config,
    pub error_printer: Box<dyn FnMut(u64, TransactionProcessError)>,
}

impl<'w, A, T, W> Service<'w, A, T, W>
where
    A: Read,
    T: Read,
    W: Write + 'w,
{
    pub fn run(mut self) -> Result<()> {
        let engine = Arc::new(TransactionEngine::new());

        for (line, row) in CsvParser::<_, AccountRow>::new(self.accounts) {
            let row = row.with_context(|| format!("Failed to parse account at line {line}"))?;
            if let Err(err) = engine.add_account(row.id, row.name, row.balance) {
                (self.error_printer)(line, err);
            }
        }

        info!(accounts = engine.account_count(), "accounts loaded");

        let mut batch = Vec::new();
        for (line, row) in CsvParser::<_, TransactionRow>::new(self.transactions) {
            let row =
                row.with_context(|| format!("Failed to parse transaction at line {line}"))?;
            match Transaction::new(row.tx, row.from, row.to, row.amount) {
                Ok(tx) => batch.push((line, tx)),
                Err(err) => (self.error_printer)(line, err.into()),
            }
        }

        let checkpointer = Checkpointer::new(engine.clone())
            .spawn(self.config.checkpoint_interval())
            .context("Failed to start checkpointer")?;

        let outcome = engine.execute_batch(batch.iter().map(|(_, tx)| *tx));
        for ((line, _), (_, result)) in batch.iter().zip(outcome) {
            if let Err(err) = result {
                (self.error_printer)(*line, err);
            }
        }
        info!(
            submitted = batch.len(),
            active = engine.active_transactions(),
            "batch finished"
        );

        let report = write_report(engine.as_ref(), self.output, self.undo_from);
        checkpointer.stop().context("Failed to stop checkpointer")?;
        report
    }
}

fn write_report<W>(
    engine: &TransactionEngine,
    output: &mut W,
    undo_from: Option<TransactionId>,
) -> Result<()>
where
    W: Write,
{
    let mut writer = Writer::from_writer(output);
    print_balances(&mut writer, Stage::Executed, &engine.balances())?;

    if let Some(from) = undo_from {
        TransactionProcessor::undo_from(engine, from)
            .with_context(|| format!("Failed to undo transactions from {from}"))?;
        print_balances(&mut writer, Stage::Undone, &engine.balances())?;
    }

    // Ensure all data is flushed to the output
    if let Err(err) = writer.flush() {
        anyhow::bail!("Failed to flush CSV writer: {err}")
    }
    Ok(())
}
