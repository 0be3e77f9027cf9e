// 💳 Account Entity - a node in the account tree
//
// "Account name is a VALUE (can change), Account UUID is IDENTITY (never changes)"
//
// Accounts do not own splits. They keep back-references to the splits posted
// to them; the splits themselves belong to their transaction.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ids::{AccountId, SplitId};

// ============================================================================
// COMMODITY
// ============================================================================

/// Currency or other commodity with its smallest denomination
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Commodity {
    /// ISO 4217 code or ticker (e.g. "USD")
    pub mnemonic: String,

    /// Decimal places of the smallest unit (2 for cents)
    pub scale: u32,
}

impl Commodity {
    pub fn new(mnemonic: &str, scale: u32) -> Self {
        Commodity {
            mnemonic: mnemonic.to_string(),
            scale,
        }
    }

    pub fn usd() -> Self {
        Commodity::new("USD", 2)
    }

    /// Round to the smallest denomination
    pub fn round(&self, value: Decimal) -> Decimal {
        value.round_dp(self.scale)
    }
}

// ============================================================================
// ACCOUNT ENTITY
// ============================================================================

#[derive(Debug, Clone)]
pub struct Account {
    // ========================================================================
    // IDENTITY
    // ========================================================================
    pub guid: Uuid,

    // ========================================================================
    // VALUES
    // ========================================================================
    /// Name of this node only; the full name joins ancestors with a separator
    pub name: String,

    pub commodity: Commodity,

    /// Placeholder accounts group children and never hold splits
    pub placeholder: bool,

    /// Last check/reference number used in this account
    pub last_num: Option<String>,

    // ========================================================================
    // TREE + BACK-REFERENCES (maintained by Book)
    // ========================================================================
    pub(crate) parent: Option<AccountId>,
    pub(crate) children: Vec<AccountId>,
    pub(crate) splits: Vec<SplitId>,
}

impl Account {
    pub(crate) fn new(name: &str, commodity: Commodity, parent: Option<AccountId>) -> Self {
        Account {
            guid: Uuid::new_v4(),
            name: name.to_string(),
            commodity,
            placeholder: false,
            last_num: None,
            parent,
            children: Vec::new(),
            splits: Vec::new(),
        }
    }

    pub fn parent(&self) -> Option<AccountId> {
        self.parent
    }

    pub fn children(&self) -> &[AccountId] {
        &self.children
    }

    /// Splits posted to this account, in posting order (not date order)
    pub fn splits(&self) -> &[SplitId] {
        &self.splits
    }
}
