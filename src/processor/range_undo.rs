use tracing::info;

use crate::command::TransactionId;

use super::{TransactionProcessError, engine::TransactionEngine};

impl TransactionEngine {
    /// Reverts every recorded change of transactions with id `>= from`.
    ///
    /// The whole log is scanned from the tail without stopping at `Start`
    /// records, so an account touched by several of these transactions ends
    /// up at the oldest recorded value, i.e. its balance right before the
    /// first of them. Returns the number of restores applied.
    pub fn undo_from(&self, from: TransactionId) -> Result<usize, TransactionProcessError> {
        let restored = self.restore_from_log(|log| log.restores_from(from))?;
        info!(from, restored, "transactions undone");
        Ok(restored)
    }
}
