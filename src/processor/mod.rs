use thiserror::Error;

use crate::{
    account::AccountError,
    command::{Transaction, TransactionCommandError, TransactionId},
    ledger::LedgerError,
};

pub mod checkpoint;
pub mod engine;
pub mod range_undo;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransactionProcessError {
    #[error(transparent)]
    CommandErr(#[from] TransactionCommandError),
    #[error(transparent)]
    LedgerErr(#[from] LedgerError),
    #[error(transparent)]
    AccountErr(#[from] AccountError),
    #[error("Transaction {0} is already in progress")]
    AlreadyActive(TransactionId),
}

pub trait TransactionProcessor {
    fn process_transaction(&self, tx: Transaction) -> Result<(), TransactionProcessError>;

    /// Reverts every recorded change made by transactions with id `>= from`.
    /// Returns how many balance restores were applied.
    fn undo_from(&self, from: TransactionId) -> Result<usize, TransactionProcessError>;
}
