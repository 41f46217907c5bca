use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::MutexGuard;
use thiserror::Error;

use crate::account::{Account, AccountId, AccountSnapshot, Balance};
use crate::command::Transaction;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Account {0} already exists")]
    DuplicateIdentifier(AccountId),
    #[error("Account {0} not found")]
    AccountNotFound(AccountId),
}

/// Account directory. Accounts are shared through `Arc` so a transaction can
/// keep working on them after the directory lock is released.
#[derive(Debug, Default)]
pub struct Ledger {
    accounts: HashMap<AccountId, Arc<Account>>,
}

impl Ledger {
    pub fn add_account(&mut self, account: Account) -> Result<(), LedgerError> {
        let id = account.id();
        if self.accounts.contains_key(&id) {
            return Err(LedgerError::DuplicateIdentifier(id));
        }
        self.accounts.insert(id, Arc::new(account));
        Ok(())
    }

    pub fn get(&self, id: AccountId) -> Result<Arc<Account>, LedgerError> {
        self.accounts
            .get(&id)
            .cloned()
            .ok_or(LedgerError::AccountNotFound(id))
    }

    /// Source and destination accounts of `tx`, in that order.
    pub fn lookup_pair(
        &self,
        tx: &Transaction,
    ) -> Result<(Arc<Account>, Arc<Account>), LedgerError> {
        Ok((self.get(tx.from())?, self.get(tx.to())?))
    }

    pub fn lookup_many(
        &self,
        ids: impl IntoIterator<Item = AccountId>,
    ) -> Result<Vec<Arc<Account>>, LedgerError> {
        ids.into_iter().map(|id| self.get(id)).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Arc<Account>> {
        self.accounts.values()
    }

    /// Snapshots sorted by id. Takes each account lock in turn, never two at
    /// once.
    pub fn snapshots(accounts: &[Arc<Account>]) -> Vec<AccountSnapshot> {
        let mut snapshots: Vec<_> = accounts
            .iter()
            .map(|acc| AccountSnapshot::from(acc.as_ref()))
            .collect();
        snapshots.sort_by_key(|snapshot| snapshot.id);
        snapshots
    }
}

/// Exclusive locks over a set of accounts.
///
/// Locks are always taken in ascending account id order, whatever order the
/// caller lists the accounts in, and released in the reverse order on drop.
/// Every path that changes more than one balance goes through here, which
/// keeps concurrent transfers over overlapping accounts free of cyclic waits.
pub struct AccountLocks<'a> {
    guards: Vec<(AccountId, MutexGuard<'a, Balance>)>,
}

impl<'a> AccountLocks<'a> {
    pub fn acquire(accounts: impl IntoIterator<Item = &'a Account>) -> Self {
        let mut accounts: Vec<&Account> = accounts.into_iter().collect();
        accounts.sort_by_key(|acc| acc.id());
        accounts.dedup_by_key(|acc| acc.id());
        let guards = accounts
            .into_iter()
            .map(|acc| (acc.id(), acc.lock()))
            .collect();
        Self { guards }
    }

    pub fn holds(&self, id: AccountId) -> bool {
        self.position(id).is_ok()
    }

    pub fn ids(&self) -> impl Iterator<Item = AccountId> + '_ {
        self.guards.iter().map(|(id, _)| *id)
    }

    pub fn balance(&self, id: AccountId) -> Result<Balance, LedgerError> {
        let idx = self.position(id)?;
        Ok(*self.guards[idx].1)
    }

    pub fn balance_mut(&mut self, id: AccountId) -> Result<&mut Balance, LedgerError> {
        let idx = self.position(id)?;
        Ok(&mut *self.guards[idx].1)
    }

    fn position(&self, id: AccountId) -> Result<usize, LedgerError> {
        self.guards
            .binary_search_by_key(&id, |(held, _)| *held)
            .map_err(|_| LedgerError::AccountNotFound(id))
    }
}

impl Drop for AccountLocks<'_> {
    fn drop(&mut self) {
        while self.guards.pop().is_some() {}
    }
}
