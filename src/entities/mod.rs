// Entity Models - the double-entry ledger
// "Identity persists, values change"
//
// Each entity has:
// - Stable identity (UUID) that NEVER changes
// - An arena handle (generational index) used inside the engine
// - Values that only change inside a begin_edit / commit_edit window

pub mod ids;
pub mod account;
pub mod transaction;
pub mod split;
pub mod book;

pub use ids::{AccountId, SplitId, TransId};
pub use account::{Account, Commodity};
pub use transaction::Transaction;
pub use split::{ReconcileState, Split};
pub use book::Book;
