use std::io::Read;

use csv::{DeserializeRecordsIntoIter, Trim};
use serde::{Deserialize, de::DeserializeOwned};

use crate::{
    account::{AccountId, Balance},
    command::TransactionId,
};

#[derive(Debug, Deserialize)]
pub struct AccountRow {
    pub id: AccountId,
    pub name: String,
    pub balance: Balance,
}

#[derive(Debug, Deserialize)]
pub struct TransactionRow {
    pub tx: TransactionId,
    pub from: AccountId,
    pub to: AccountId,
    pub amount: Balance,
}

/// Parses rows of type `T` from CSV with a header line, yielding each row
/// together with the reader's line position.
pub struct CsvParser<R, T> {
    iter: DeserializeRecordsIntoIter<R, T>,
}

impl<R, T> CsvParser<R, T>
where
    R: Read,
    T: DeserializeOwned,
{
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(Trim::All)
            .from_reader(source);

        Self {
            iter: reader.into_deserialize(),
        }
    }
}

impl<R, T> Iterator for CsvParser<R, T>
where
    R: Read,
    T: DeserializeOwned,
{
    type Item = (u64, csv::Result<T>);

    fn next(&mut self) -> Option<Self::Item> {
        let curr_line = self.iter.reader().position().line();
        self.iter.next().map(|row| (curr_line, row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rows_with_whitespace() {
        let input = "tx, from, to, amount\n1, 1, 2, 10\n 2,2 ,3, 5\n";
        let rows: Vec<_> = CsvParser::<_, TransactionRow>::new(input.as_bytes())
            .map(|(_, row)| row.unwrap())
            .map(|row| (row.tx, row.from, row.to, row.amount))
            .collect();
        assert_eq!(rows, vec![(1, 1, 2, 10), (2, 2, 3, 5)]);
    }

    #[test]
    fn malformed_row_is_an_error() {
        let input = "id,name,balance\n1,Tom,10\n2,Jerry,lots\n";
        let rows: Vec<_> = CsvParser::<_, AccountRow>::new(input.as_bytes()).collect();
        assert_eq!(rows.len(), 2);
        let first = rows[0].1.as_ref().unwrap();
        assert_eq!((first.id, first.name.as_str(), first.balance), (1, "Tom", 10));
        assert!(rows[1].1.is_err());
    }
}
