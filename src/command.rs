use thiserror::Error;

use crate::account::{AccountId, Balance};

pub type TransactionId = u32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransactionCommandError {
    #[error("Amount must be positive, got {amount}")]
    NonPositiveAmount { amount: Balance },
    #[error("Source and destination must differ, both are {account}")]
    SelfTransfer { account: AccountId },
}

/// Validated transfer of `amount` from one account to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transaction {
    id: TransactionId,
    from: AccountId,
    to: AccountId,
    amount: Balance,
}

impl Transaction {
    pub fn new(
        id: TransactionId,
        from: AccountId,
        to: AccountId,
        amount: Balance,
    ) -> Result<Self, TransactionCommandError> {
        if amount <= 0 {
            return Err(TransactionCommandError::NonPositiveAmount { amount });
        }
        if from == to {
            return Err(TransactionCommandError::SelfTransfer { account: from });
        }
        Ok(Self {
            id,
            from,
            to,
            amount,
        })
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn from(&self) -> AccountId {
        self.from
    }

    pub fn to(&self) -> AccountId {
        self.to
    }

    pub fn amount(&self) -> Balance {
        self.amount
    }
}
