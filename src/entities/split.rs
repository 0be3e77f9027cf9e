// ✂️ Split Entity - one leg of a transaction
//
// value: in the transaction's currency (what balancing sums)
// amount: in the account's commodity

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ids::{AccountId, TransId};

// ============================================================================
// RECONCILE STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReconcileState {
    #[default]
    Unreconciled,
    Cleared,
    Reconciled,
    Frozen,
}

impl ReconcileState {
    pub fn as_char(&self) -> char {
        match self {
            ReconcileState::Unreconciled => 'n',
            ReconcileState::Cleared => 'c',
            ReconcileState::Reconciled => 'y',
            ReconcileState::Frozen => 'f',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'n' => Some(ReconcileState::Unreconciled),
            'c' => Some(ReconcileState::Cleared),
            'y' => Some(ReconcileState::Reconciled),
            'f' => Some(ReconcileState::Frozen),
            _ => None,
        }
    }

    /// Order a user toggles through; frozen is set by reconciliation only
    pub fn next(&self) -> Self {
        match self {
            ReconcileState::Unreconciled => ReconcileState::Cleared,
            ReconcileState::Cleared => ReconcileState::Reconciled,
            ReconcileState::Reconciled | ReconcileState::Frozen => ReconcileState::Unreconciled,
        }
    }

    /// Reconciled history needs explicit confirmation to change
    pub fn is_locked(&self) -> bool {
        matches!(self, ReconcileState::Reconciled | ReconcileState::Frozen)
    }
}

// ============================================================================
// SPLIT ENTITY
// ============================================================================

#[derive(Debug, Clone)]
pub struct Split {
    pub guid: Uuid,

    pub memo: String,
    pub action: String,
    pub reconcile: ReconcileState,

    pub value: Decimal,
    pub amount: Decimal,

    pub(crate) parent: TransId,
    pub(crate) account: Option<AccountId>,
    pub(crate) destroyed: bool,
}

impl Split {
    pub(crate) fn new(parent: TransId) -> Self {
        Split {
            guid: Uuid::new_v4(),
            memo: String::new(),
            action: String::new(),
            reconcile: ReconcileState::Unreconciled,
            value: Decimal::ZERO,
            amount: Decimal::ZERO,
            parent,
            account: None,
            destroyed: false,
        }
    }

    pub fn parent(&self) -> TransId {
        self.parent
    }

    pub fn account(&self) -> Option<AccountId> {
        self.account
    }

    /// Value and amount move together when account and transaction share a commodity
    pub fn set_value(&mut self, value: Decimal) {
        self.value = value;
        self.amount = value;
    }
}
