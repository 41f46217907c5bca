use parking_lot::{Mutex, MutexGuard};
use thiserror::Error;

pub type AccountId = u32;

/// Integer balance. May dip below zero only inside an in-flight
/// transaction that is about to be rolled back.
pub type Balance = i64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccountError {
    #[error("Insufficient funds on account {account}: short by {shortfall}")]
    InsufficientFunds {
        account: AccountId,
        shortfall: Balance,
    },
    #[error("Balance of account {account} would overflow")]
    BalanceOverflow { account: AccountId },
}

#[derive(Debug)]
pub struct Account {
    id: AccountId,
    name: String,
    balance: Mutex<Balance>,
}

impl Account {
    pub fn new(id: AccountId, name: impl Into<String>, balance: Balance) -> Self {
        Self {
            id,
            name: name.into(),
            balance: Mutex::new(balance),
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reads the balance, briefly taking the account lock.
    pub fn balance(&self) -> Balance {
        *self.balance.lock()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Balance> {
        self.balance.lock()
    }

    /// Fails when a withdrawal drove `balance` below zero.
    pub fn ensure_covered(id: AccountId, balance: Balance) -> Result<(), AccountError> {
        if balance < 0 {
            Err(AccountError::InsufficientFunds {
                account: id,
                shortfall: balance.saturating_neg(),
            })
        } else {
            Ok(())
        }
    }

    /// `balance - amount`, failing instead of wrapping.
    pub fn checked_debit(
        id: AccountId,
        balance: Balance,
        amount: Balance,
    ) -> Result<Balance, AccountError> {
        balance
            .checked_sub(amount)
            .ok_or(AccountError::BalanceOverflow { account: id })
    }

    /// `balance + amount`, failing instead of wrapping.
    pub fn checked_credit(
        id: AccountId,
        balance: Balance,
        amount: Balance,
    ) -> Result<Balance, AccountError> {
        balance
            .checked_add(amount)
            .ok_or(AccountError::BalanceOverflow { account: id })
    }
}

/// Point-in-time copy of an account, used for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub id: AccountId,
    pub name: String,
    pub balance: Balance,
}

impl From<&Account> for AccountSnapshot {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            name: account.name.clone(),
            balance: account.balance(),
        }
    }
}
