// 📒 Split Register - the ledger view over a book
//
// Maps the splits of one or more accounts onto a virtual table, keeps one
// transaction pending while the user edits it, and decides at every cursor
// move whether the edit may be left (control.rs), how rows are laid out
// (load.rs) and how cell values reach the entities (save.rs).
//
// The register never owns the book: every call that reads or changes
// entities takes `&mut Book` (or `&Book`) from the session.

pub mod control;
pub mod layout;
pub mod load;
pub mod save;

use chrono::{Local, NaiveDate};
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::account_quickfill::AccountQuickFill;
use crate::config::RegisterConfig;
use crate::entities::{AccountId, Book, SplitId, TransId};
use crate::ports::{ConfirmationPort, PresentationEvent, PresentationListener};
use crate::quickfill::QuickFill;
use crate::quickfill_store::{self, QuickFillStore};
use crate::table::{CellName, CursorClass, CursorKind, Table, VirtualCellLocation, VirtualLocation};

pub use control::{RefusalReason, TraverseOutcome};
pub use layout::SPLIT_TRANS_STR;

// ============================================================================
// STYLE + TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RegisterStyle {
    /// One row per transaction; splits shown only when expanded by hand
    #[default]
    Ledger,
    /// The transaction under the cursor is expanded automatically
    AutoLedger,
    /// Every transaction is shown with all of its splits
    Journal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterType {
    /// One account; its splits anchor the lead rows
    Account(AccountId),
    /// An account and all of its descendants
    AccountTree(AccountId),
    /// Every transaction in the book
    GeneralJournal,
}

impl RegisterType {
    pub fn is_single_account(&self) -> bool {
        matches!(self, RegisterType::Account(_))
    }

    pub fn default_account(&self) -> Option<AccountId> {
        match self {
            RegisterType::Account(a) | RegisterType::AccountTree(a) => Some(*a),
            RegisterType::GeneralJournal => None,
        }
    }
}

// ============================================================================
// REGISTER STATE
// ============================================================================

/// Where the cursor should land after the next reload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CursorHint {
    pub trans: Option<TransId>,
    pub split: Option<SplitId>,
    pub trans_split: Option<SplitId>,
    pub class: CursorClass,
}

impl Default for CursorHint {
    fn default() -> Self {
        CursorHint {
            trans: None,
            split: None,
            trans_split: None,
            class: CursorClass::None,
        }
    }
}

#[derive(Debug)]
pub(crate) struct RegisterInfo {
    pub blank_split: Option<SplitId>,
    pub pending_trans: Option<TransId>,
    pub default_account: Option<AccountId>,

    pub hint: CursorHint,
    pub hint_set_by_traverse: bool,
    pub traverse_to_new: bool,
    pub exact_traversal: bool,

    pub trans_expanded: bool,
    pub reg_loaded: bool,
    pub first_pass: bool,
    /// Edits to the reconciled split under the cursor were confirmed
    pub change_confirmed: bool,
    pub blank_split_edited: bool,

    /// Posting date given to the next blank transaction
    pub last_date_entered: NaiveDate,

    /// Split list of the last load, reused while a transaction is pending
    pub saved_slist: Vec<SplitId>,
    /// Running balance keyed by the lead row's split
    pub balances: HashMap<SplitId, Decimal>,
    pub help_text: String,
}

impl RegisterInfo {
    fn new(default_account: Option<AccountId>) -> Self {
        RegisterInfo {
            blank_split: None,
            pending_trans: None,
            default_account,
            hint: CursorHint::default(),
            hint_set_by_traverse: false,
            traverse_to_new: false,
            exact_traversal: false,
            trans_expanded: false,
            reg_loaded: false,
            first_pass: true,
            change_confirmed: false,
            blank_split_edited: false,
            last_date_entered: Local::now().date_naive(),
            saved_slist: Vec::new(),
            balances: HashMap::new(),
            help_text: String::new(),
        }
    }
}

/// Per-register completion caches
#[derive(Debug, Clone, Default)]
pub(crate) struct RegisterQuickFills {
    pub description: QuickFill,
    pub notes: QuickFill,
    pub memo: QuickFill,
}

pub struct SplitRegister {
    pub(crate) table: Table,
    pub(crate) config: RegisterConfig,
    reg_type: RegisterType,
    pub(crate) info: RegisterInfo,
    pub(crate) port: Box<dyn ConfirmationPort>,
    pub(crate) quickfills: RegisterQuickFills,
    pub(crate) account_qf: AccountQuickFill,
    pub(crate) last_num: Option<String>,
}

impl SplitRegister {
    pub fn new(reg_type: RegisterType, config: RegisterConfig, port: Box<dyn ConfirmationPort>) -> Self {
        let table = Table::new(layout::create_layout(config.double_line));
        let account_qf = AccountQuickFill::new(config.account_separator);

        SplitRegister {
            table,
            reg_type,
            info: RegisterInfo::new(reg_type.default_account()),
            port,
            quickfills: RegisterQuickFills::default(),
            account_qf,
            last_num: None,
            config,
        }
    }

    pub fn set_port(&mut self, port: Box<dyn ConfirmationPort>) {
        self.port = port;
    }

    pub fn add_listener(&mut self, listener: PresentationListener) {
        self.table.add_listener(listener);
    }

    pub fn config(&self) -> &RegisterConfig {
        &self.config
    }

    pub fn style(&self) -> RegisterStyle {
        self.config.style
    }

    pub fn reg_type(&self) -> RegisterType {
        self.reg_type
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn default_account(&self) -> Option<AccountId> {
        self.info.default_account
    }

    pub fn help_text(&self) -> &str {
        &self.info.help_text
    }

    pub fn is_expanded(&self) -> bool {
        self.info.trans_expanded
    }

    /// Splits shown by this register, in posting order
    pub fn query_splits(&self, book: &Book) -> Vec<SplitId> {
        match self.reg_type {
            RegisterType::Account(a) => book.account_splits(a),
            RegisterType::AccountTree(a) => book.splits_for_accounts(&book.descendants(a)),
            RegisterType::GeneralJournal => book.all_splits(),
        }
    }

    /// Accounts whose running balance the register shows
    pub(crate) fn balance_accounts(&self, book: &Book) -> Vec<AccountId> {
        match self.reg_type {
            RegisterType::Account(a) => vec![a],
            RegisterType::AccountTree(a) => book.descendants(a),
            RegisterType::GeneralJournal => Vec::new(),
        }
    }

    /// Re-query the split list and reload
    pub fn refresh(&mut self, book: &mut Book) {
        let slist = self.query_splits(book);
        self.load(book, slist);
    }

    // ========================================================================
    // CURSOR KINDS
    // ========================================================================

    pub(crate) fn passive_cursor(&self) -> CursorKind {
        match self.config.style {
            RegisterStyle::Ledger | RegisterStyle::AutoLedger => CursorKind::Lead,
            RegisterStyle::Journal => CursorKind::ExpandedLead,
        }
    }

    pub(crate) fn active_cursor(&self) -> CursorKind {
        match self.config.style {
            RegisterStyle::Ledger if !self.info.trans_expanded => CursorKind::Lead,
            _ => CursorKind::ExpandedLead,
        }
    }

    // ========================================================================
    // ENTITY LOOKUP BY LOCATION
    // ========================================================================

    pub fn blank_split(&self, book: &Book) -> Option<SplitId> {
        self.info.blank_split.filter(|s| book.split(*s).is_some())
    }

    pub fn blank_trans(&self, book: &Book) -> Option<TransId> {
        self.blank_split(book).and_then(|s| book.split_trans(s))
    }

    pub fn pending_trans(&self, book: &Book) -> Option<TransId> {
        self.info.pending_trans.filter(|t| book.transaction(*t).is_some())
    }

    pub fn get_cursor_class(&self, loc: VirtualCellLocation) -> CursorClass {
        self.table.vcell(loc).map(|v| v.cursor.class()).unwrap_or(CursorClass::None)
    }

    /// Split bound to a row; None for blank split rows and stale bindings
    pub fn get_split(&self, book: &Book, loc: VirtualCellLocation) -> Option<SplitId> {
        self.table.vcell(loc)?.split.filter(|s| book.split(*s).is_some())
    }

    /// The lead row of the transaction owning `loc`, with its split
    pub fn get_trans_split(&self, loc: VirtualCellLocation) -> Option<(Option<SplitId>, VirtualCellLocation)> {
        let mut row = loc.row;
        while row >= 1 {
            let at = VirtualCellLocation::new(row, loc.col);
            if self.get_cursor_class(at) == CursorClass::Trans {
                return Some((self.table.vcell(at)?.split, at));
            }
            row -= 1;
        }
        None
    }

    pub fn get_trans(&self, book: &Book, loc: VirtualCellLocation) -> Option<TransId> {
        if let Some(split) = self.get_split(book, loc) {
            return book.split_trans(split);
        }
        if self.get_cursor_class(loc) != CursorClass::Split {
            return None;
        }
        // blank split row: the transaction of its lead row
        let (lead_split, _) = self.get_trans_split(loc)?;
        lead_split.and_then(|s| book.split_trans(s))
    }

    pub fn current_split(&self, book: &Book) -> Option<SplitId> {
        self.get_split(book, self.table.current_location().vcell)
    }

    pub fn current_trans(&self, book: &Book) -> Option<TransId> {
        self.get_trans(book, self.table.current_location().vcell)
    }

    pub fn current_trans_split(&self, book: &Book) -> Option<(Option<SplitId>, VirtualCellLocation)> {
        let (split, loc) = self.get_trans_split(self.table.current_location().vcell)?;
        Some((split.filter(|s| book.split(*s).is_some()), loc))
    }

    pub fn current_cursor_class(&self) -> CursorClass {
        self.get_cursor_class(self.table.current_location().vcell)
    }

    /// Split whose fields a row edits: the row's own split, or the lead's
    pub(crate) fn row_split(&self, book: &Book, loc: VirtualCellLocation) -> Option<SplitId> {
        if self.get_cursor_class(loc) == CursorClass::None {
            return None;
        }
        self.get_split(book, loc)
    }

    /// Locate a transaction/split pair after a reload. Falls back to the
    /// transaction's lead split and then to its first row.
    pub fn find_split(
        &self,
        book: &Book,
        trans: Option<TransId>,
        trans_split: Option<SplitId>,
        split: Option<SplitId>,
        class: CursorClass,
    ) -> Option<VirtualCellLocation> {
        let trans = trans?;
        let mut trans_row = None;
        let mut trans_split_row = None;

        for row in 1..self.table.num_virt_rows() as i32 {
            let loc = VirtualCellLocation::new(row, 0);
            if self.get_trans(book, loc) != Some(trans) {
                continue;
            }

            let s = self.table.vcell(loc).and_then(|v| v.split);
            let row_class = self.get_cursor_class(loc);

            if trans_row.is_none() {
                trans_row = Some(loc);
            }
            if trans_split_row.is_none() && row_class == CursorClass::Trans && s == trans_split {
                trans_split_row = Some(loc);
            }
            if trans_split_row.is_some() && s == split && row_class == class {
                return Some(loc);
            }
        }

        trans_split_row.or(trans_row)
    }

    /// Show or hide the split rows below a lead row. With `only_blank_split`
    /// rows holding a real split are left alone.
    pub(crate) fn set_trans_visible(&mut self, lead: VirtualCellLocation, visible: bool, only_blank_split: bool) {
        let rows = self.table.num_virt_rows() as i32;
        let mut row = lead.row + 1;

        while row < rows {
            let loc = VirtualCellLocation::new(row, lead.col);
            if self.get_cursor_class(loc) != CursorClass::Split {
                return;
            }
            let has_split = self.table.vcell(loc).map(|v| v.split.is_some()).unwrap_or(false);
            if !(only_blank_split && has_split) {
                self.table.set_vcell_visible(loc, visible);
            }
            row += 1;
        }
    }

    /// Show the current transaction's splits (Ledger style only)
    pub fn expand_current_transaction(&mut self, book: &mut Book, expand: bool) -> crate::error::LedgerResult<()> {
        if self.config.style != RegisterStyle::Ledger || expand == self.info.trans_expanded {
            return Ok(());
        }

        self.save(book)?;

        let Some((_, lead)) = self.get_trans_split(self.table.current_location().vcell) else {
            return Ok(());
        };

        if !expand {
            // collapsing hides the row the cursor may be on
            let mut loc = self.table.current_location();
            loc.vcell = lead;
            if let Some(valid) = self.table.find_close_valid_cell(loc, false) {
                self.table.move_cursor_gui(valid);
            }
        }

        self.info.trans_expanded = expand;
        let cursor = self.active_cursor();
        self.table.set_vcell_cursor(lead, cursor);
        self.set_trans_visible(lead, expand, false);

        let current = self.table.current_location();
        if let Some(valid) = self.table.find_close_valid_cell(current, false) {
            self.table.move_cursor_gui(valid);
        }
        self.load_cursor_values(book);
        self.update_help_text();

        debug!("Transaction {}", if expand { "expanded" } else { "collapsed" });
        Ok(())
    }

    pub(crate) fn update_help_text(&mut self) {
        let text = self
            .table
            .current_cell_name()
            .map(layout::help_text)
            .unwrap_or("")
            .to_string();

        if text != self.info.help_text {
            self.info.help_text = text.clone();
            self.table.notify(PresentationEvent::HelpTextChanged(text));
        }
    }

    // ========================================================================
    // COMPLETION
    // ========================================================================

    /// Completion offered for what has been typed into a cell
    pub fn quickfill_completion(&self, cell: CellName, typed: &str) -> Option<String> {
        let qf = match cell {
            CellName::Description => &self.quickfills.description,
            CellName::Notes => &self.quickfills.notes,
            CellName::Memo => &self.quickfills.memo,
            CellName::Transfer => return self.account_qf.complete(typed),
            _ => return None,
        };
        qf.match_prefix(typed)?.text().map(str::to_string)
    }

    /// Account-name completion up to the point where candidates diverge
    pub fn account_unique_completion(&self, typed: &str) -> Option<String> {
        self.account_qf.unique_completion(typed)
    }

    /// Number following the last one used in this register. A number
    /// already at the top of the range is offered again unchanged.
    pub fn next_num(&self) -> String {
        match self.last_num.as_deref().map(|n| n.trim().parse::<i64>()) {
            Some(Ok(n)) => n.checked_add(1).unwrap_or(n).to_string(),
            _ => "1".to_string(),
        }
    }

    pub fn last_num(&self) -> Option<&str> {
        self.last_num.as_deref()
    }

    pub fn seed_quickfills(&mut self, store: &dyn QuickFillStore) -> anyhow::Result<()> {
        let sort = self.config.quickfill_sort;
        quickfill_store::seed(&mut self.quickfills.description, store, "description", sort)?;
        quickfill_store::seed(&mut self.quickfills.notes, store, "notes", sort)?;
        quickfill_store::seed(&mut self.quickfills.memo, store, "memo", sort)?;
        Ok(())
    }

    pub fn flush_quickfills(&self, store: &mut dyn QuickFillStore) -> anyhow::Result<()> {
        quickfill_store::flush(&self.quickfills.description, store, "description")?;
        quickfill_store::flush(&self.quickfills.notes, store, "notes")?;
        quickfill_store::flush(&self.quickfills.memo, store, "memo")?;
        Ok(())
    }

    pub(crate) fn add_quickfill(&mut self, cell: CellName, text: &str) {
        let sort = self.config.quickfill_sort;
        match cell {
            CellName::Description => self.quickfills.description.insert(text, sort),
            CellName::Notes => self.quickfills.notes.insert(text, sort),
            CellName::Memo => self.quickfills.memo.insert(text, sort),
            _ => {}
        }
    }

    // ========================================================================
    // DISPLAY
    // ========================================================================

    /// Text of every column of one physical row, for rendering
    pub fn display_row(&self, book: &Book, loc: VirtualCellLocation, phys_row: usize) -> Vec<String> {
        let Some(block) = self.table.block_at(loc) else {
            return Vec::new();
        };
        let is_current = loc == self.table.current_location().vcell;

        (0..block.cols as i32)
            .map(|col| match block.cell(phys_row as i32, col) {
                Some(cell) if is_current => self.table.cell_value(cell.name).to_string(),
                Some(cell) => self.entry_text(book, loc, cell.name),
                None => String::new(),
            })
            .collect()
    }

    /// Location of the row the cursor is on, if any
    pub fn current_location(&self) -> VirtualLocation {
        self.table.current_location()
    }
}
