// 🧯 Ledger Errors - typed failures surfaced by the engine
//
// Refused traversals are NOT errors (see register::control::TraverseOutcome).
// The only hard failure that leaves the core is an imbalance the user refused
// to resolve, which must reach the caller as a value.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::entities::{AccountId, SplitId, TransId};

/// Raised by `Book::commit_edit` when a transaction does not balance.
///
/// The transaction stays open for edit; nothing was committed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("transaction {guid} is unbalanced by {imbalance} {currency}")]
pub struct ImbalanceError {
    pub trans: TransId,
    pub guid: Uuid,
    pub imbalance: Decimal,
    pub currency: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error(transparent)]
    Imbalance(#[from] ImbalanceError),

    #[error("unknown account: {0:?}")]
    UnknownAccount(AccountId),

    #[error("no account named '{0}'")]
    AccountNotFound(String),

    #[error("account '{0}' still has children or splits")]
    AccountInUse(String),

    #[error("unknown transaction: {0:?}")]
    UnknownTransaction(TransId),

    #[error("unknown split: {0:?}")]
    UnknownSplit(SplitId),

    #[error("transaction {0:?} is not open for edit")]
    TransactionNotOpen(TransId),

    #[error("'{0}' is a placeholder account and cannot hold splits")]
    PlaceholderAccount(String),

    #[error("invalid amount: '{0}'")]
    InvalidAmount(String),

    #[error("invalid date: '{0}'")]
    InvalidDate(String),

    #[error("change to a reconciled split was not confirmed")]
    EditDenied,

    #[error("the blank entry cannot be deleted")]
    BlankEntry,
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::Key;

    #[test]
    fn test_imbalance_error_message() {
        let err = ImbalanceError {
            trans: TransId::null(),
            guid: Uuid::nil(),
            imbalance: Decimal::new(-1, 2),
            currency: "USD".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("-0.01"));
        assert!(msg.contains("USD"));

        let wrapped: LedgerError = err.clone().into();
        assert_eq!(wrapped, LedgerError::Imbalance(err));
    }
}
