// 🧾 Transaction Entity - a balanced group of splits
//
// Owns its splits (insertion order, not display order). The sum of split
// values must be zero at commit time; it may be violated while open for edit.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use super::account::Commodity;
use super::ids::SplitId;

#[derive(Debug, Clone)]
pub struct Transaction {
    pub guid: Uuid,

    /// Currency every split value is expressed in
    pub currency: Commodity,

    pub date_posted: NaiveDate,
    pub date_entered: DateTime<Utc>,

    /// Check number or reference
    pub num: String,
    pub description: String,
    pub notes: String,

    pub(crate) splits: Vec<SplitId>,
}

impl Transaction {
    pub(crate) fn new(currency: Commodity, date_posted: NaiveDate) -> Self {
        Transaction {
            guid: Uuid::new_v4(),
            currency,
            date_posted,
            date_entered: Utc::now(),
            num: String::new(),
            description: String::new(),
            notes: String::new(),
            splits: Vec::new(),
        }
    }

    pub fn splits(&self) -> &[SplitId] {
        &self.splits
    }

    /// Numeric value of `num`, used when ordering transactions
    pub fn num_value(&self) -> Option<i64> {
        self.num.trim().parse().ok()
    }
}
