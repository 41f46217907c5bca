use std::collections::{HashMap, HashSet, hash_map::Entry};
use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, warn};

use crate::{
    account::{Account, AccountId, AccountSnapshot, Balance},
    command::{Transaction, TransactionId},
    ledger::{AccountLocks, Ledger, LedgerError},
    undo_log::{Record, Restore, UndoLog},
};

use super::{TransactionProcessError, TransactionProcessor};

/// Everything guarded by the structural lock.
#[derive(Debug, Default)]
pub(super) struct EngineState {
    pub(super) ledger: Ledger,
    pub(super) active: HashMap<TransactionId, Transaction>,
    pub(super) undo_log: UndoLog,
}

/// Executes transfers concurrently over a shared [`Ledger`], protected by an
/// [`UndoLog`].
///
/// Lock order is account locks (ascending id, see [`AccountLocks`]) first,
/// then the structural lock. Nothing acquires an account lock while holding
/// the structural lock.
#[derive(Debug, Default)]
pub struct TransactionEngine {
    pub(super) state: RwLock<EngineState>,
    completed: Mutex<u64>,
    drained: Condvar,
}

pub type BatchOutcome = Vec<(TransactionId, Result<(), TransactionProcessError>)>;

impl TransactionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_account(
        &self,
        id: AccountId,
        name: impl Into<String>,
        balance: Balance,
    ) -> Result<(), TransactionProcessError> {
        self.state
            .write()
            .ledger
            .add_account(Account::new(id, name, balance))?;
        debug!(account = id, balance, "account added");
        Ok(())
    }

    /// Applies `tx`, rolling it back if the source account ends up negative.
    ///
    /// The transaction is registered as active for the whole call and is
    /// deregistered on every exit path.
    pub fn execute_transaction(&self, tx: Transaction) -> Result<(), TransactionProcessError> {
        self.register(tx)?;
        let result = self.apply(&tx);
        self.deregister(tx.id());

        match &result {
            Ok(()) => debug!(tx_id = tx.id(), "transaction committed"),
            Err(err) => warn!(tx_id = tx.id(), %err, "transaction aborted"),
        }
        result
    }

    /// Runs every transaction on its own thread and waits for all of them.
    /// Results come back in submission order.
    pub fn execute_batch(&self, txs: impl IntoIterator<Item = Transaction>) -> BatchOutcome {
        thread::scope(|s| {
            let handles: Vec<_> = txs
                .into_iter()
                .map(|tx| (tx.id(), s.spawn(move || self.execute_transaction(tx))))
                .collect();
            handles
                .into_iter()
                .map(|(id, handle)| {
                    let result = handle
                        .join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
                    (id, result)
                })
                .collect()
        })
    }

    /// Restores the balances a single transaction changed, scanning the log
    /// back to that transaction's `Start` record.
    pub fn rollback(&self, tx_id: TransactionId) -> Result<usize, TransactionProcessError> {
        let restored = self.restore_from_log(|log| log.transaction_restores(tx_id))?;
        debug!(tx_id, restored, "transaction rolled back");
        Ok(restored)
    }

    /// Sorted by account id.
    pub fn balances(&self) -> Vec<AccountSnapshot> {
        let accounts: Vec<_> = self.state.read().ledger.accounts().cloned().collect();
        Ledger::snapshots(&accounts)
    }

    pub fn balance(&self, id: AccountId) -> Option<Balance> {
        let account = self.state.read().ledger.get(id).ok()?;
        Some(account.balance())
    }

    /// Sum over all accounts, saturating at the `Balance` bounds. Only
    /// consistent while no transaction runs.
    pub fn total_balance(&self) -> Balance {
        self.balances()
            .iter()
            .fold(0, |total: Balance, snapshot| total.saturating_add(snapshot.balance))
    }

    pub fn account_count(&self) -> usize {
        self.state.read().ledger.len()
    }

    pub fn active_transactions(&self) -> usize {
        self.state.read().active.len()
    }

    pub fn undo_log_len(&self) -> usize {
        self.state.read().undo_log.len()
    }

    pub fn undo_log_snapshot(&self) -> Vec<Record> {
        self.state.read().undo_log.records().copied().collect()
    }

    fn register(&self, tx: Transaction) -> Result<(), TransactionProcessError> {
        let mut state = self.state.write();
        match state.active.entry(tx.id()) {
            Entry::Occupied(_) => Err(TransactionProcessError::AlreadyActive(tx.id())),
            Entry::Vacant(entry) => {
                entry.insert(tx);
                Ok(())
            }
        }
    }

    pub(super) fn deregister(&self, tx_id: TransactionId) {
        self.state.write().active.remove(&tx_id);
        let mut completed = self.completed.lock();
        *completed += 1;
        self.drained.notify_all();
    }

    fn apply(&self, tx: &Transaction) -> Result<(), TransactionProcessError> {
        let (from, to) = self.state.read().ledger.lookup_pair(tx)?;
        // held from logging until the mutation is either kept or undone
        let mut locks = AccountLocks::acquire([from.as_ref(), to.as_ref()]);

        let from_before = locks.balance(from.id())?;
        let to_before = locks.balance(to.id())?;
        // checked before anything is logged or changed
        let from_after = Account::checked_debit(from.id(), from_before, tx.amount())?;
        let to_after = Account::checked_credit(to.id(), to_before, tx.amount())?;

        let before = [
            Restore {
                account_id: from.id(),
                balance: from_before,
            },
            Restore {
                account_id: to.id(),
                balance: to_before,
            },
        ];
        self.state
            .write()
            .undo_log
            .append_transaction(tx.id(), before);

        *locks.balance_mut(from.id())? = from_after;
        *locks.balance_mut(to.id())? = to_after;

        let remaining = locks.balance(from.id())?;
        if let Err(err) = Account::ensure_covered(from.id(), remaining) {
            let state = self.state.write();
            let restores = state.undo_log.transaction_restores(tx.id());
            Self::restore_all(&mut locks, &restores)?;
            return Err(err.into());
        }
        Ok(())
    }

    fn restore_all(locks: &mut AccountLocks<'_>, restores: &[Restore]) -> Result<usize, LedgerError> {
        for restore in restores {
            *locks.balance_mut(restore.account_id)? = restore.balance;
        }
        Ok(restores.len())
    }

    /// Applies the restores `select` picks from the log, in the order given.
    ///
    /// The touched accounts are discovered under the read lock, locked in id
    /// order, then the selection is repeated under the write lock. If the log
    /// grew to reference an account that is not locked yet, the whole round
    /// starts over.
    pub(super) fn restore_from_log<F>(&self, select: F) -> Result<usize, TransactionProcessError>
    where
        F: Fn(&UndoLog) -> Vec<Restore>,
    {
        loop {
            let accounts = {
                let state = self.state.read();
                let mut ids: Vec<_> = select(&state.undo_log)
                    .iter()
                    .map(|restore| restore.account_id)
                    .collect();
                ids.sort_unstable();
                ids.dedup();
                state.ledger.lookup_many(ids)?
            };
            let mut locks = AccountLocks::acquire(accounts.iter().map(Arc::as_ref));
            let state = self.state.write();
            let restores = select(&state.undo_log);
            if restores.iter().all(|restore| locks.holds(restore.account_id)) {
                return Ok(Self::restore_all(&mut locks, &restores)?);
            }
            debug!("undo log reached new accounts while locking, retrying");
        }
    }

    /// Blocks until none of `pending` is active anymore.
    ///
    /// Matches by transaction id. Woken by every deregistration.
    pub(super) fn wait_for_completion(&self, pending: &HashSet<TransactionId>) {
        let mut completed = self.completed.lock();
        while self.any_active(pending) {
            self.drained.wait(&mut completed);
        }
        debug!(
            waited_for = pending.len(),
            completed = *completed,
            "checkpointed transactions drained"
        );
    }

    fn any_active(&self, ids: &HashSet<TransactionId>) -> bool {
        let state = self.state.read();
        ids.iter().any(|id| state.active.contains_key(id))
    }
}

impl TransactionProcessor for TransactionEngine {
    fn process_transaction(&self, tx: Transaction) -> Result<(), TransactionProcessError> {
        self.execute_transaction(tx)
    }

    fn undo_from(&self, from: TransactionId) -> Result<usize, TransactionProcessError> {
        TransactionEngine::undo_from(self, from)
    }
}
