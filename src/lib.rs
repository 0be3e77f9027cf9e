// Ledger Register - Core Library
// Exposes the ledger engine and the register for use in the CLI, the TUI and tests

pub mod error;
pub mod entities;
pub mod scrub;
pub mod quickfill;
pub mod account_quickfill;
pub mod quickfill_store;
pub mod config;
pub mod ports;
pub mod table;
pub mod register;
pub mod session;
pub mod import;

// Re-export commonly used types
pub use error::{ImbalanceError, LedgerError, LedgerResult};
pub use entities::{
    Account, AccountId, Book, Commodity, ReconcileState,
    Split, SplitId, TransId, Transaction,
};
pub use scrub::{imbalance_account, scrub_imbalance};
pub use quickfill::{QuickFill, QuickFillSort};
pub use account_quickfill::AccountQuickFill;
pub use quickfill_store::{QuickFillStore, SqliteQuickFillStore};
pub use config::RegisterConfig;
pub use ports::{
    BalanceChoice, BalancePrompt, CommitChoice, ConfirmationPort,
    DeclineAll, PresentationEvent,
};
pub use table::{CellName, CursorClass, TraversalDir, VirtualCellLocation, VirtualLocation};
pub use register::{
    RefusalReason, RegisterStyle, RegisterType, SplitRegister, TraverseOutcome,
};
pub use session::Session;
pub use import::{load_book_csv, read_book_csv, ImportSummary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
