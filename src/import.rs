// 📥 CSV Import - seed a book from a split-per-line CSV file
//
// Columns: txn,date,num,description,notes,account,memo,action,value,reconcile
//
// Lines sharing a `txn` key form one transaction; the transaction-level
// columns are taken from its first line. Accounts are created on demand.
// A transaction that does not balance is scrubbed into the imbalance
// account rather than rejected.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use log::{info, warn};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use crate::entities::{Book, Commodity, ReconcileState};
use crate::scrub::scrub_imbalance;

#[derive(Debug, Clone, Deserialize)]
struct ImportRow {
    txn: String,
    date: String,
    #[serde(default)]
    num: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    notes: String,
    account: String,
    #[serde(default)]
    memo: String,
    #[serde(default)]
    action: String,
    value: String,
    #[serde(default)]
    reconcile: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub transactions: usize,
    pub splits: usize,
    /// Transactions that needed an imbalance split
    pub scrubbed: usize,
}

pub fn load_book_csv(csv_path: &Path, separator: char, currency: &Commodity) -> Result<(Book, ImportSummary)> {
    let file = std::fs::File::open(csv_path).with_context(|| format!("Failed to open CSV file {}", csv_path.display()))?;
    read_book_csv(file, separator, currency)
}

pub fn read_book_csv<R: Read>(reader: R, separator: char, currency: &Commodity) -> Result<(Book, ImportSummary)> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    // group lines by txn key, keeping file order
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<ImportRow>> = HashMap::new();

    for (line, result) in rdr.deserialize().enumerate() {
        let row: ImportRow = result.with_context(|| format!("Failed to deserialize CSV line {}", line + 2))?;
        if !groups.contains_key(&row.txn) {
            order.push(row.txn.clone());
        }
        groups.entry(row.txn.clone()).or_default().push(row);
    }

    let mut book = Book::new(currency.clone());
    let mut summary = ImportSummary::default();

    for key in order {
        let Some(rows) = groups.remove(&key) else {
            continue;
        };
        let first = &rows[0];

        let date = NaiveDate::parse_from_str(&first.date, "%Y-%m-%d")
            .with_context(|| format!("Transaction {}: invalid date '{}'", key, first.date))?;

        let trans = book.new_transaction(currency.clone(), date);
        {
            let body = book.trans_mut(trans)?;
            body.num = first.num.clone();
            body.description = first.description.clone();
            body.notes = first.notes.clone();
        }

        for row in &rows {
            if row.account.is_empty() {
                bail!("Transaction {}: split without an account", key);
            }
            let account = book
                .find_or_create_account(&row.account, separator, currency)
                .with_context(|| format!("Transaction {}: account '{}'", key, row.account))?;

            let value = Decimal::from_str(&row.value.replace(',', ""))
                .with_context(|| format!("Transaction {}: invalid value '{}'", key, row.value))?;

            let reconcile = match row.reconcile.chars().next() {
                None => ReconcileState::Unreconciled,
                Some(c) => ReconcileState::from_char(c)
                    .with_context(|| format!("Transaction {}: invalid reconcile flag '{}'", key, row.reconcile))?,
            };

            let split = book.create_split(trans)?;
            book.set_split_account(split, Some(account))?;
            let body = book.split_mut(split)?;
            body.memo = row.memo.clone();
            body.action = row.action.clone();
            body.reconcile = reconcile;
            body.set_value(currency.round(value));
            summary.splits += 1;
        }

        if let Err(e) = book.commit_edit(trans) {
            warn!("Transaction {} does not balance ({}); scrubbing", key, e);
            scrub_imbalance(&mut book, trans, None)?;
            book.commit_edit(trans)?;
            summary.scrubbed += 1;
        }
        summary.transactions += 1;
    }

    info!(
        "Imported {} transactions ({} splits, {} scrubbed)",
        summary.transactions, summary.splits, summary.scrubbed
    );
    Ok((book, summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "txn,date,num,description,notes,account,memo,action,value,reconcile\n";

    fn create_test_csv(body: &str) -> String {
        format!("{}{}", HEADER, body)
    }

    #[test]
    fn test_import_groups_splits_by_txn() {
        let csv = create_test_csv(
            "1,2024-03-01,101,Farmers Market,,Assets:Checking,,,-20.00,c\n\
             1,2024-03-01,,,,Expenses:Groceries,vegetables,,20.00,\n\
             2,2024-03-02,,Latte,,Assets:Checking,,,-4.50,\n\
             2,2024-03-02,,,,Expenses:Coffee,,,4.50,\n",
        );

        let (book, summary) = read_book_csv(csv.as_bytes(), ':', &Commodity::usd()).unwrap();
        assert_eq!(summary, ImportSummary { transactions: 2, splits: 4, scrubbed: 0 });

        let checking = book.find_account("Assets:Checking", ':').unwrap();
        let splits = book.account_splits(checking);
        assert_eq!(splits.len(), 2);

        let first = book.split(splits[0]).unwrap();
        assert_eq!(first.reconcile, ReconcileState::Cleared);
        let trans = book.transaction(first.parent()).unwrap();
        assert_eq!(trans.description, "Farmers Market");
        assert_eq!(trans.num, "101");
        assert!(!book.is_open(first.parent()));
    }

    #[test]
    fn test_unbalanced_transaction_is_scrubbed() {
        let csv = create_test_csv(
            "a,2024-03-01,,Odd,,Assets:Checking,,,-10.00,\n\
             a,2024-03-01,,,,Expenses:Misc,,,9.00,\n",
        );

        let (book, summary) = read_book_csv(csv.as_bytes(), ':', &Commodity::usd()).unwrap();
        assert_eq!(summary.scrubbed, 1);

        let imbalance = book.find_account("Imbalance-USD", ':').unwrap();
        assert_eq!(book.account_splits(imbalance).len(), 1);
        let (id, _) = book.transactions().next().unwrap();
        assert!(book.imbalance(id).is_zero());
    }

    #[test]
    fn test_bad_value_reports_transaction() {
        let csv = create_test_csv("7,2024-03-01,,Bad,,Assets:Checking,,,ten,\n");
        let err = read_book_csv(csv.as_bytes(), ':', &Commodity::usd()).unwrap_err();
        assert!(err.to_string().contains("Transaction 7"));
    }
}
