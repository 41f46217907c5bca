use std::collections::VecDeque;

use crate::account::{AccountId, Balance};
use crate::command::TransactionId;

/// Single entry of the undo log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
    /// Left boundary of a transaction's undo-protected region.
    Start { tx_id: TransactionId },
    /// Balance of `account_id` right before `tx_id` changed it.
    Update {
        tx_id: TransactionId,
        account_id: AccountId,
        before: Balance,
    },
    StartCheckpoint,
    EndCheckpoint,
}

/// Restore point extracted from an [`Record::Update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Restore {
    pub account_id: AccountId,
    pub balance: Balance,
}

/// Append-only sequence of [`Record`]s, truncatable only from the front.
#[derive(Debug, Default)]
pub struct UndoLog {
    records: VecDeque<Record>,
}

impl UndoLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl DoubleEndedIterator<Item = &Record> {
        self.records.iter()
    }

    pub fn append(&mut self, record: Record) {
        self.records.push_back(record);
    }

    /// Writes the `Start` marker followed by one `Update` per touched account.
    pub fn append_transaction(
        &mut self,
        tx_id: TransactionId,
        before: impl IntoIterator<Item = Restore>,
    ) {
        self.append(Record::Start { tx_id });
        for Restore {
            account_id,
            balance,
        } in before
        {
            self.append(Record::Update {
                tx_id,
                account_id,
                before: balance,
            });
        }
    }

    /// Restore points of a single transaction, newest first.
    ///
    /// The scan walks from the tail and stops at the transaction's own
    /// `Start` record, so updates of an older transaction that reused the
    /// same id are never reached.
    pub fn transaction_restores(&self, tx_id: TransactionId) -> Vec<Restore> {
        let mut restores = Vec::new();
        for record in self.records.iter().rev() {
            match *record {
                Record::Start { tx_id: id } if id == tx_id => break,
                Record::Update {
                    tx_id: id,
                    account_id,
                    before,
                } if id == tx_id => restores.push(Restore {
                    account_id,
                    balance: before,
                }),
                _ => {}
            }
        }
        restores
    }

    /// Restore points of every transaction with id `>= from`, newest first,
    /// across the whole log.
    ///
    /// Applying them in order leaves each account at the oldest recorded
    /// value among the qualifying records.
    pub fn restores_from(&self, from: TransactionId) -> Vec<Restore> {
        self.records
            .iter()
            .rev()
            .filter_map(|record| match *record {
                Record::Update {
                    tx_id,
                    account_id,
                    before,
                } if tx_id >= from => Some(Restore {
                    account_id,
                    balance: before,
                }),
                _ => None,
            })
            .collect()
    }

    /// Position of the `StartCheckpoint` closest before the last
    /// `EndCheckpoint`, if a complete checkpoint exists.
    pub fn compaction_point(&self) -> Option<usize> {
        let end = self
            .records
            .iter()
            .rposition(|record| *record == Record::EndCheckpoint)?;
        self.records
            .range(..end)
            .rposition(|record| *record == Record::StartCheckpoint)
    }

    /// Drops every record before the last complete checkpoint, which becomes
    /// the new head. Returns the number of dropped records.
    pub fn truncate_to_checkpoint(&mut self) -> usize {
        match self.compaction_point() {
            Some(start) => self.records.drain(..start).count(),
            None => 0,
        }
    }
}

impl FromIterator<Record> for UndoLog {
    fn from_iter<T: IntoIterator<Item = Record>>(iter: T) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn update(tx_id: TransactionId, account_id: AccountId, before: Balance) -> Record {
        Record::Update {
            tx_id,
            account_id,
            before,
        }
    }

    /// Two interleaved transactions touching four accounts.
    pub(crate) fn interleaved_records() -> Vec<Record> {
        vec![
            Record::Start { tx_id: 1 },
            update(1, 1, 15),
            Record::Start { tx_id: 2 },
            update(2, 3, 30),
            update(1, 2, 15),
            update(2, 4, 35),
        ]
    }

    /// Two interleaved cycles separated by a complete checkpoint.
    pub(crate) fn checkpointed_records() -> Vec<Record> {
        let mut records = interleaved_records();
        records.push(Record::StartCheckpoint);
        records.extend([
            Record::Start { tx_id: 3 },
            update(3, 1, 15),
            Record::Start { tx_id: 4 },
            update(4, 3, 30),
            update(3, 2, 15),
            update(4, 4, 35),
        ]);
        records.push(Record::EndCheckpoint);
        records
    }

    #[test]
    fn append_transaction_writes_start_first() {
        let mut log = UndoLog::new();
        log.append_transaction(
            7,
            [
                Restore {
                    account_id: 1,
                    balance: 10,
                },
                Restore {
                    account_id: 2,
                    balance: 20,
                },
            ],
        );
        let records: Vec<_> = log.records().copied().collect();
        assert_eq!(
            records,
            vec![Record::Start { tx_id: 7 }, update(7, 1, 10), update(7, 2, 20)]
        );
    }

    #[test]
    fn transaction_restores_stop_at_own_start() {
        let mut records = interleaved_records();
        // id 1 reused after the first one finished
        records.extend([Record::Start { tx_id: 1 }, update(1, 4, 99)]);
        let log: UndoLog = records.into_iter().collect();

        let restores = log.transaction_restores(1);
        assert_eq!(
            restores,
            vec![Restore {
                account_id: 4,
                balance: 99
            }]
        );

        let restores = log.transaction_restores(2);
        assert_eq!(
            restores,
            vec![
                Restore {
                    account_id: 4,
                    balance: 35
                },
                Restore {
                    account_id: 3,
                    balance: 30
                },
            ]
        );
    }

    #[test]
    fn restores_from_ignores_start_boundaries() {
        let log: UndoLog = interleaved_records().into_iter().collect();
        let accounts: Vec<_> = log.restores_from(1).iter().map(|r| r.account_id).collect();
        assert_eq!(accounts, vec![4, 2, 3, 1]);
        let accounts: Vec<_> = log.restores_from(2).iter().map(|r| r.account_id).collect();
        assert_eq!(accounts, vec![4, 3]);
        assert!(log.restores_from(3).is_empty());
    }

    #[test]
    fn truncate_requires_complete_checkpoint() {
        let mut records = interleaved_records();
        records.push(Record::StartCheckpoint);
        let mut log: UndoLog = records.into_iter().collect();
        assert_eq!(log.compaction_point(), None);
        assert_eq!(log.truncate_to_checkpoint(), 0);
        assert_eq!(log.len(), 7);
    }

    #[test]
    fn truncate_keeps_checkpoint_start_as_head() {
        let mut log: UndoLog = checkpointed_records().into_iter().collect();
        assert_eq!(log.len(), 14);
        assert_eq!(log.truncate_to_checkpoint(), 6);
        assert_eq!(log.len(), 8);
        assert_eq!(log.records().next(), Some(&Record::StartCheckpoint));

        // nothing more to drop until another checkpoint completes
        assert_eq!(log.truncate_to_checkpoint(), 0);
    }

    #[test]
    fn truncate_uses_latest_complete_checkpoint() {
        let mut records = checkpointed_records();
        records.push(Record::StartCheckpoint);
        records.push(Record::EndCheckpoint);
        // unmatched start after the last end must survive
        records.push(Record::StartCheckpoint);
        records.push(Record::Start { tx_id: 5 });
        let mut log: UndoLog = records.into_iter().collect();
        assert_eq!(log.truncate_to_checkpoint(), 14);
        let records: Vec<_> = log.records().copied().collect();
        assert_eq!(
            records,
            vec![
                Record::StartCheckpoint,
                Record::EndCheckpoint,
                Record::StartCheckpoint,
                Record::Start { tx_id: 5 },
            ]
        );
    }
}
