// 🧽 Scrub - heuristic repair of unbalanced transactions
//
// The imbalance is absorbed by one split: an existing split in the target
// account when there is one, otherwise a new split. Without a target the
// split goes to the "Imbalance-<CURRENCY>" account under the root.

use log::info;
use rust_decimal::Decimal;

use crate::entities::{AccountId, Book, Commodity, TransId};
use crate::error::{LedgerError, LedgerResult};

/// Name of the account that collects unassigned imbalances
pub fn imbalance_account_name(currency: &Commodity) -> String {
    format!("Imbalance-{}", currency.mnemonic)
}

/// Get or create the top-level imbalance account for a currency
pub fn imbalance_account(book: &mut Book, currency: &Commodity) -> LedgerResult<AccountId> {
    let name = imbalance_account_name(currency);
    let root = book.root();

    let existing = book
        .account(root)
        .map(|r| r.children().to_vec())
        .unwrap_or_default()
        .into_iter()
        .find(|c| book.account(*c).map(|a| a.name == name).unwrap_or(false));

    match existing {
        Some(id) => Ok(id),
        None => book.add_account(root, &name, currency.clone()),
    }
}

/// Make the transaction balance by adjusting (or adding) one split.
///
/// Opens and commits the transaction itself when it was not already open.
pub fn scrub_imbalance(book: &mut Book, trans: TransId, account: Option<AccountId>) -> LedgerResult<()> {
    let imbalance = book.imbalance(trans);
    if imbalance.is_zero() {
        return Ok(());
    }

    let currency = book
        .transaction(trans)
        .ok_or(LedgerError::UnknownTransaction(trans))?
        .currency
        .clone();

    let target = match account {
        Some(acc) => acc,
        None => imbalance_account(book, &currency)?,
    };

    let was_open = book.is_open(trans);
    book.begin_edit(trans)?;

    let existing = book
        .transaction(trans)
        .map(|t| t.splits().to_vec())
        .unwrap_or_default()
        .into_iter()
        .find(|s| book.split(*s).and_then(|b| b.account()) == Some(target));

    let split = match existing {
        Some(s) => s,
        None => {
            let s = book.create_split(trans)?;
            book.set_split_account(s, Some(target))?;
            s
        }
    };

    let same_commodity = book.account(target).map(|a| a.commodity == currency).unwrap_or(false);
    let new_value = {
        let body = book.split_mut(split)?;
        let new_value: Decimal = body.value - imbalance;
        body.value = new_value;
        if same_commodity {
            body.amount = new_value;
        }
        new_value
    };

    if account.is_none() && new_value.is_zero() {
        book.destroy_split(split)?;
    }

    info!(
        "Scrubbed imbalance of {} {} into '{}'",
        imbalance,
        currency.mnemonic,
        book.full_name(target, ':')
    );

    if !was_open {
        book.commit_edit(trans)?;
    }

    Ok(())
}
