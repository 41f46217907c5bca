/// Accounts and their balances. Each balance sits behind its own lock.
pub mod account;

/// Validated transfer commands that are later executed by [`processor`].
pub mod command;

/// Runtime settings, defaults plus environment overrides.
pub mod config;

/// Account directory and the ordered multi-account locking helper.
pub mod ledger;

/// Transaction processor interface, plus the concurrent engine that
/// implements it: transfers, rollback, range undo and checkpointing.
///
/// The trait has a single implementation today; it marks where a
/// persistent engine would plug in.
pub mod processor;

/// Undo log records and the log itself.
pub mod undo_log;

/// CSV loading and printing used by the binary. Kept in the library so the
/// integration tests can run the whole pipeline.
pub mod bin_utils;
