//! Property-based tests for engine invariants
//!
//! - Money conservation across concurrent commits and aborts
//! - No balance left negative after a batch
//! - Undoing from the first transaction restores the opening balances

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use undo_ledger::{
    account::{AccountId, Balance},
    command::Transaction,
    processor::{checkpoint::Checkpointer, engine::TransactionEngine},
};

const OPENING: [Balance; 5] = [100, 100, 150, 200, 200];

/// Strategy for a transfer between two distinct accounts
fn transfer_strategy() -> impl Strategy<Value = (AccountId, AccountId, Balance)> {
    (1..=5u32, 1..=4u32, 1..=60i64).prop_map(|(from, offset, amount)| {
        let to = (from - 1 + offset) % 5 + 1;
        (from, to, amount)
    })
}

fn batch_strategy() -> impl Strategy<Value = Vec<Transaction>> {
    prop::collection::vec(transfer_strategy(), 1..40).prop_map(|transfers| {
        transfers
            .into_iter()
            .enumerate()
            .map(|(idx, (from, to, amount))| {
                Transaction::new(idx as u32 + 1, from, to, amount).unwrap()
            })
            .collect()
    })
}

fn create_engine() -> Arc<TransactionEngine> {
    let engine = TransactionEngine::new();
    for (idx, balance) in OPENING.iter().enumerate() {
        let id = idx as AccountId + 1;
        engine.add_account(id, format!("acc-{id}"), *balance).unwrap();
    }
    Arc::new(engine)
}

fn balances(engine: &TransactionEngine) -> Vec<Balance> {
    engine.balances().iter().map(|s| s.balance).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: the total never changes, whatever commits or aborts
    #[test]
    fn prop_batch_conserves_money(batch in batch_strategy()) {
        let engine = create_engine();
        let total = engine.total_balance();

        let outcome = engine.execute_batch(batch.clone());

        prop_assert_eq!(outcome.len(), batch.len());
        prop_assert_eq!(engine.total_balance(), total);
        prop_assert!(balances(&engine).iter().all(|balance| *balance >= 0));
        prop_assert_eq!(engine.active_transactions(), 0);
    }

    /// Property: undoing from the first id brings back the opening balances
    #[test]
    fn prop_undo_everything_restores_opening(batch in batch_strategy()) {
        let engine = create_engine();
        engine.execute_batch(batch);

        engine.undo_from(1).unwrap();

        prop_assert_eq!(balances(&engine), OPENING.to_vec());
    }

    /// Property: a running checkpointer does not disturb the batch
    #[test]
    fn prop_checkpointing_keeps_conservation(batch in batch_strategy()) {
        let engine = create_engine();
        let total = engine.total_balance();
        let handle = Checkpointer::new(engine.clone())
            .spawn(Duration::from_millis(1))
            .unwrap();

        engine.execute_batch(batch);
        handle.stop().unwrap();

        prop_assert_eq!(engine.total_balance(), total);
        prop_assert_eq!(engine.active_transactions(), 0);
    }
}
