use std::io::Write;

use csv::Writer;
use serde::Serialize;

use crate::account::{AccountId, AccountSnapshot, Balance};

/// Point of the run a balance row was taken at.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Executed,
    Undone,
}

#[derive(Debug, Serialize)]
struct BalanceRow<'a> {
    stage: Stage,
    id: AccountId,
    name: &'a str,
    balance: Balance,
}

pub fn print_balances<W>(
    writer: &mut Writer<W>,
    stage: Stage,
    accounts: &[AccountSnapshot],
) -> anyhow::Result<()>
where
    W: Write,
{
    for acc in accounts {
        let row = BalanceRow {
            stage,
            id: acc.id,
            name: &acc.name,
            balance: acc.balance,
        };
        if let Err(err) = writer.serialize(row) {
            anyhow::bail!("Failed to write to CSV: {err}")
        }
    }
    Ok(())
}
