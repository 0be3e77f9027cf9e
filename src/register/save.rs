// 💾 Register Save - cursor cells into entities
//
// Saving opens the cursor's transaction (it becomes the pending
// transaction) and writes every changed cell. It never commits; the
// traversal decides when a pending transaction may be committed.

use chrono::NaiveDate;
use log::{debug, info, warn};
use rust_decimal::Decimal;
use std::str::FromStr;

use super::{SplitRegister, SPLIT_TRANS_STR};
use crate::entities::{AccountId, Book, ReconcileState, SplitId, TransId};
use crate::error::{ImbalanceError, LedgerError, LedgerResult};
use crate::table::{CellIo, CellName, CursorClass, CursorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SaveOutcome {
    Unchanged,
    Saved,
}

/// Empty text is zero; thousands separators are ignored
pub(crate) fn parse_amount(text: &str) -> LedgerResult<Decimal> {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return Ok(Decimal::ZERO);
    }
    Decimal::from_str(&cleaned).map_err(|_| LedgerError::InvalidAmount(text.to_string()))
}

impl SplitRegister {
    pub(crate) fn parse_date(&self, text: &str) -> LedgerResult<NaiveDate> {
        NaiveDate::parse_from_str(text.trim(), &self.config.date_format)
            .map_err(|_| LedgerError::InvalidDate(text.to_string()))
    }

    // ========================================================================
    // PENDING TRANSACTION
    // ========================================================================

    /// Open `trans` for edit, committing any other pending transaction first
    pub(crate) fn make_pending(&mut self, book: &mut Book, trans: TransId) -> LedgerResult<()> {
        if let Some(pending) = self.pending_trans(book) {
            if pending != trans {
                self.commit_pending(book, pending)?;
            }
        }
        book.begin_edit(trans)?;
        self.info.pending_trans = Some(trans);
        Ok(())
    }

    /// Commit the pending transaction. An untouched new transaction is
    /// rolled back instead.
    pub(crate) fn commit_pending(&mut self, book: &mut Book, trans: TransId) -> Result<(), ImbalanceError> {
        let is_blank = self.blank_trans(book) == Some(trans);

        if is_blank && self.blank_is_degenerate(book, trans) {
            self.rollback_pending(book, trans);
            debug!("Discarded empty new transaction");
            return Ok(());
        }

        self.prune_empty_splits(book, trans);
        book.commit_edit(trans)?;

        if self.info.pending_trans == Some(trans) {
            self.info.pending_trans = None;
        }

        if is_blank {
            if let Some(t) = book.transaction(trans) {
                self.info.last_date_entered = t.date_posted;
            }
            self.info.blank_split = None;
            self.info.blank_split_edited = false;
            info!("Recorded new transaction");
        } else {
            info!("Committed transaction");
        }

        self.remember_num(book, trans);
        Ok(())
    }

    pub(crate) fn rollback_pending(&mut self, book: &mut Book, trans: TransId) {
        let was_blank = self.blank_trans(book) == Some(trans);
        book.rollback_edit(trans);

        if self.info.pending_trans == Some(trans) {
            self.info.pending_trans = None;
        }
        if was_blank {
            // the blank split may have been replaced inside the edit
            self.info.blank_split = book.transaction(trans).and_then(|t| t.splits().first().copied());
            self.info.blank_split_edited = false;
        }
    }

    /// No memo, no transfer account and nothing but zero amounts
    fn blank_is_degenerate(&self, book: &Book, trans: TransId) -> bool {
        let default_account = self.info.default_account;
        book.transaction(trans)
            .map(|t| {
                t.splits().iter().filter_map(|s| book.split(*s)).all(|s| {
                    s.memo.is_empty() && s.value.is_zero() && (s.account().is_none() || s.account() == default_account)
                })
            })
            .unwrap_or(true)
    }

    /// Drop accountless, empty splits left over from blank rows
    fn prune_empty_splits(&self, book: &mut Book, trans: TransId) {
        let splits = book.transaction(trans).map(|t| t.splits().to_vec()).unwrap_or_default();
        let empty: Vec<SplitId> = splits
            .iter()
            .copied()
            .filter(|s| {
                book.split(*s)
                    .map(|b| b.account().is_none() && b.value.is_zero() && b.memo.is_empty() && b.action.is_empty())
                    .unwrap_or(false)
            })
            .collect();

        if empty.is_empty() || empty.len() == splits.len() {
            return;
        }
        for s in empty {
            if let Err(e) = book.destroy_split(s) {
                warn!("Could not prune empty split: {}", e);
            }
        }
    }

    fn remember_num(&mut self, book: &mut Book, trans: TransId) {
        let Some(num) = book.transaction(trans).map(|t| t.num.clone()) else {
            return;
        };
        if num.trim().parse::<i64>().is_err() {
            return;
        }
        if let Some(account) = self.info.default_account.and_then(|a| book.account_mut(a)) {
            account.last_num = Some(num.clone());
        }
        self.last_num = Some(num);
    }

    fn lookup_account(&self, book: &Book, name: &str) -> LedgerResult<AccountId> {
        book.find_account(name, self.config.account_separator)
            .ok_or_else(|| LedgerError::AccountNotFound(name.to_string()))
    }

    // ========================================================================
    // SAVE
    // ========================================================================

    /// Write the changed cells of the cursor into the model
    pub(crate) fn save(&mut self, book: &mut Book) -> LedgerResult<SaveOutcome> {
        let Some(trans) = self.current_trans(book) else {
            return Ok(SaveOutcome::Unchanged);
        };
        if !self.table.current_cursor_changed() {
            return Ok(SaveOutcome::Unchanged);
        }

        let loc = self.table.current_location().vcell;
        let class = self.current_cursor_class();

        // a blank split row with nothing worth keeping
        if class == CursorClass::Split && self.get_split(book, loc).is_none() && !self.blank_row_has_content() {
            self.table.clear_current_cursor_changes();
            return Ok(SaveOutcome::Unchanged);
        }

        self.make_pending(book, trans)?;

        let is_blank = self.blank_trans(book) == Some(trans);
        if is_blank && !self.info.blank_split_edited {
            self.info.blank_split_edited = true;
            if let (Some(blank), Some(account)) = (self.blank_split(book), self.info.default_account) {
                if book.split(blank).map(|s| s.account().is_none()).unwrap_or(false) {
                    book.set_split_account(blank, Some(account))?;
                }
            }
        }

        match class {
            CursorClass::Trans => self.save_trans_cells(book, trans, is_blank)?,
            CursorClass::Split => self.save_split_cells(book, trans)?,
            CursorClass::None => {}
        }

        self.table.clear_current_cursor_changes();
        debug!("Saved cursor into pending transaction");
        Ok(SaveOutcome::Saved)
    }

    fn blank_row_has_content(&self) -> bool {
        [CellName::Action, CellName::Memo, CellName::Transfer, CellName::Debit, CellName::Credit]
            .iter()
            .any(|name| !self.table.cell_value(*name).trim().is_empty())
    }

    fn save_trans_cells(&mut self, book: &mut Book, trans: TransId, is_blank: bool) -> LedgerResult<()> {
        let edited = self.table.changed_cells();
        let changed = |name: CellName| edited.contains(&name);

        if changed(CellName::Date) {
            let date = self.parse_date(self.table.cell_value(CellName::Date))?;
            book.trans_mut(trans)?.date_posted = date;
            if is_blank {
                self.info.last_date_entered = date;
            }
        }
        if changed(CellName::Num) {
            book.trans_mut(trans)?.num = self.table.cell_value(CellName::Num).to_string();
        }
        if changed(CellName::Description) {
            let text = self.table.cell_value(CellName::Description).to_string();
            book.trans_mut(trans)?.description = text.clone();
            self.add_quickfill(CellName::Description, &text);
        }
        if changed(CellName::Notes) {
            let text = self.table.cell_value(CellName::Notes).to_string();
            book.trans_mut(trans)?.notes = text.clone();
            self.add_quickfill(CellName::Notes, &text);
        }

        // the collapsed lead row also edits its own split and the other side
        if self.table.current_cursor() != Some(CursorKind::Lead) {
            return Ok(());
        }
        let Some(anchor) = self.current_split(book) else {
            return Ok(());
        };

        if changed(CellName::Reconcile) {
            if let Some(state) = self.table.cell_value(CellName::Reconcile).chars().next().and_then(ReconcileState::from_char) {
                book.split_mut(anchor)?.reconcile = state;
            }
        }

        if changed(CellName::Debit) || changed(CellName::Credit) {
            let value = self.cell_value_amount(book, trans)?;
            book.split_mut(anchor)?.set_value(value);
            if let Some(other) = book.other_split(anchor) {
                book.split_mut(other)?.set_value(-value);
            }
        }

        if changed(CellName::Transfer) {
            let name = self.table.cell_value(CellName::Transfer).trim().to_string();
            if !name.is_empty() && name != SPLIT_TRANS_STR {
                let account = self.lookup_account(book, &name)?;
                let count = book.transaction(trans).map(|t| t.splits().len()).unwrap_or(0);

                match book.other_split(anchor) {
                    Some(other) => book.set_split_account(other, Some(account))?,
                    None if count == 1 => {
                        let value = book.split(anchor).map(|s| s.value).unwrap_or_default();
                        let other = book.create_split(trans)?;
                        book.set_split_account(other, Some(account))?;
                        book.split_mut(other)?.set_value(-value);
                    }
                    None => warn!("Transfer '{}' ignored on a transaction with {} splits", name, count),
                }
            }
        }

        Ok(())
    }

    fn save_split_cells(&mut self, book: &mut Book, trans: TransId) -> LedgerResult<()> {
        let loc = self.table.current_location().vcell;
        let split = match self.get_split(book, loc) {
            Some(split) => split,
            None => {
                let split = book.create_split(trans)?;
                self.table.set_vcell_split(loc, Some(split));
                split
            }
        };

        let edited = self.table.changed_cells();
        let changed = |name: CellName| edited.contains(&name);

        if changed(CellName::Action) {
            book.split_mut(split)?.action = self.table.cell_value(CellName::Action).to_string();
        }
        if changed(CellName::Memo) {
            let text = self.table.cell_value(CellName::Memo).to_string();
            book.split_mut(split)?.memo = text.clone();
            self.add_quickfill(CellName::Memo, &text);
        }
        if changed(CellName::Reconcile) {
            if let Some(state) = self.table.cell_value(CellName::Reconcile).chars().next().and_then(ReconcileState::from_char) {
                book.split_mut(split)?.reconcile = state;
            }
        }
        if changed(CellName::Transfer) {
            let name = self.table.cell_value(CellName::Transfer).trim().to_string();
            let account = if name.is_empty() { None } else { Some(self.lookup_account(book, &name)?) };
            book.set_split_account(split, account)?;
        }
        if changed(CellName::Debit) || changed(CellName::Credit) {
            let value = self.cell_value_amount(book, trans)?;
            book.split_mut(split)?.set_value(value);
        }

        Ok(())
    }

    /// Debit minus credit, rounded to the transaction currency
    fn cell_value_amount(&self, book: &Book, trans: TransId) -> LedgerResult<Decimal> {
        let debit = parse_amount(self.table.cell_value(CellName::Debit))?;
        let credit = parse_amount(self.table.cell_value(CellName::Credit))?;
        let value = debit - credit;
        Ok(book.transaction(trans).map(|t| t.currency.round(value)).unwrap_or(value))
    }

    /// A split row whose memo, transfer and amounts are all empty
    pub(crate) fn old_split_empty(&self) -> bool {
        let blank = |name| self.table.cell_value(name).trim().is_empty();
        let zero = |name| parse_amount(self.table.cell_value(name)).map(|v| v.is_zero()).unwrap_or(false);

        blank(CellName::Memo) && blank(CellName::Transfer) && zero(CellName::Debit) && zero(CellName::Credit)
    }

    // ========================================================================
    // EDITING
    // ========================================================================

    /// User input into a cell of the current cursor
    pub fn set_cell(&mut self, book: &mut Book, name: CellName, value: &str) -> LedgerResult<()> {
        let loc = self.table.current_cell_location(name).ok_or(LedgerError::EditDenied)?;
        match self.table.cell_at(loc).map(|c| c.io) {
            Some(CellIo::Input | CellIo::ExactOnly) => {}
            _ => return Err(LedgerError::EditDenied),
        }

        match name {
            CellName::Debit | CellName::Credit => {
                parse_amount(value)?;
            }
            CellName::Date => {
                self.parse_date(value)?;
            }
            _ => {}
        }

        let state = self.row_split(book, loc.vcell).and_then(|s| book.split(s)).map(|s| s.reconcile);

        if name == CellName::Reconcile {
            let new_state = value.chars().next().and_then(ReconcileState::from_char).ok_or(LedgerError::EditDenied)?;
            let leaving_reconciled = state == Some(ReconcileState::Reconciled) && new_state != ReconcileState::Reconciled;

            if leaving_reconciled && self.config.confirm_reconciled_change && !self.info.change_confirmed {
                if !self.port.confirm_reconciled_change() {
                    return Err(LedgerError::EditDenied);
                }
                self.info.change_confirmed = true;
            }
        } else if state.map(|s| s.is_locked()).unwrap_or(false) && !self.info.change_confirmed {
            if !self.port.confirm_reconciled_change() {
                return Err(LedgerError::EditDenied);
            }
            self.info.change_confirmed = true;
        }

        self.table.set_cell_value(name, value);
        Ok(())
    }

    /// Advance the reconcile cell n -> c -> y -> n
    pub fn toggle_reconcile(&mut self, book: &mut Book) -> LedgerResult<()> {
        let current = self
            .table
            .cell_value(CellName::Reconcile)
            .chars()
            .next()
            .and_then(ReconcileState::from_char)
            .unwrap_or_default();
        let next = current.next().as_char().to_string();
        self.set_cell(book, CellName::Reconcile, &next)
    }

    /// Forget edits in the cursor; the model is untouched
    pub fn cancel_cursor_split_changes(&mut self, book: &mut Book) {
        if !self.table.current_cursor_changed() {
            return;
        }
        self.load_cursor_values(book);
    }

    /// Forget edits in the cursor and roll back the pending transaction
    pub fn cancel_cursor_trans_changes(&mut self, book: &mut Book) {
        let pending = self.pending_trans(book);
        if pending.is_none() || pending != self.current_trans(book) {
            self.cancel_cursor_split_changes(book);
            return;
        }

        self.table.clear_current_cursor_changes();
        if let Some(trans) = pending {
            self.rollback_pending(book, trans);
            info!("Rolled back pending transaction");
        }
        self.refresh(book);
    }

    pub fn delete_current_split(&mut self, book: &mut Book) -> LedgerResult<()> {
        let Some(split) = self.current_split(book) else {
            return Ok(());
        };
        if Some(split) == self.blank_split(book) {
            return Err(LedgerError::BlankEntry);
        }
        let trans = book.split_trans(split).ok_or(LedgerError::UnknownSplit(split))?;

        let locked = book.split(split).map(|s| s.reconcile.is_locked()).unwrap_or(false);
        if locked && !self.port.confirm_reconciled_change() {
            return Err(LedgerError::EditDenied);
        }

        self.make_pending(book, trans)?;
        book.destroy_split(split)?;
        self.table.clear_current_cursor_changes();
        info!("Deleted split");

        self.refresh(book);
        Ok(())
    }

    pub fn delete_current_trans(&mut self, book: &mut Book) -> LedgerResult<()> {
        let Some(trans) = self.current_trans(book) else {
            return Ok(());
        };
        if Some(trans) == self.blank_trans(book) {
            return Err(LedgerError::BlankEntry);
        }
        if book.has_reconciled_splits(trans) && !self.port.confirm_reconciled_change() {
            return Err(LedgerError::EditDenied);
        }

        if self.info.pending_trans == Some(trans) {
            self.info.pending_trans = None;
        }
        self.table.clear_current_cursor_changes();
        book.destroy_transaction(trans)?;
        info!("Deleted transaction");

        self.refresh(book);
        Ok(())
    }

    /// Save the cursor, balance and commit its transaction (Enter).
    ///
    /// A balance prompt answered with "manual" leaves the transaction
    /// pending and returns the imbalance as an error.
    pub fn record(&mut self, book: &mut Book) -> LedgerResult<()> {
        let Some(trans) = self.current_trans(book) else {
            return Ok(());
        };
        let was_blank = self.blank_trans(book) == Some(trans);

        self.save(book)?;

        if self.pending_trans(book) != Some(trans) {
            self.refresh(book);
            return Ok(());
        }

        if let Some(imbalance) = self.balance_trans(book, trans)? {
            self.refresh(book);
            let body = book.transaction(trans);
            return Err(ImbalanceError {
                trans,
                guid: body.map(|t| t.guid).unwrap_or_else(uuid::Uuid::nil),
                imbalance,
                currency: body.map(|t| t.currency.mnemonic.clone()).unwrap_or_default(),
            }
            .into());
        }

        self.commit_pending(book, trans)?;
        if was_blank {
            self.info.traverse_to_new = true;
        }
        self.refresh(book);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::{RegisterStyle, RegisterType};
    use super::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("").unwrap(), Decimal::ZERO);
        assert_eq!(parse_amount(" 1,250.50 ").unwrap(), dec("1250.50"));
        assert_eq!(parse_amount("abc").unwrap_err(), LedgerError::InvalidAmount("abc".to_string()));
    }

    #[test]
    fn test_set_cell_validates() {
        let mut tb = create_test_book();
        let (mut reg, _) = create_test_register(&mut tb.book, RegisterType::Account(tb.checking), RegisterStyle::Ledger);

        assert!(matches!(reg.set_cell(&mut tb.book, CellName::Debit, "12x"), Err(LedgerError::InvalidAmount(_))));
        assert!(matches!(reg.set_cell(&mut tb.book, CellName::Date, "03/01/2024"), Err(LedgerError::InvalidDate(_))));
        assert_eq!(reg.set_cell(&mut tb.book, CellName::Balance, "1"), Err(LedgerError::EditDenied));
        assert_eq!(reg.set_cell(&mut tb.book, CellName::Memo, "x"), Err(LedgerError::EditDenied));

        reg.set_cell(&mut tb.book, CellName::Description, "Rent").unwrap();
        assert!(reg.table().cell_changed(CellName::Description));
    }

    #[test]
    fn test_record_new_transaction() {
        let mut tb = create_test_book();
        let (mut reg, script) = create_test_register(&mut tb.book, RegisterType::Account(tb.checking), RegisterStyle::Ledger);

        reg.set_cell(&mut tb.book, CellName::Date, "2024-03-05").unwrap();
        reg.set_cell(&mut tb.book, CellName::Num, "101").unwrap();
        reg.set_cell(&mut tb.book, CellName::Description, "Groceries run").unwrap();
        reg.set_cell(&mut tb.book, CellName::Transfer, "Expenses:Groceries").unwrap();
        reg.set_cell(&mut tb.book, CellName::Credit, "42.10").unwrap();
        reg.record(&mut tb.book).unwrap();

        let splits = tb.book.account_splits(tb.checking);
        assert_eq!(splits.len(), 1);
        let trans = tb.book.split_trans(splits[0]).unwrap();
        assert!(!tb.book.is_open(trans));
        assert!(tb.book.imbalance(trans).is_zero());
        assert_eq!(tb.book.split(splits[0]).unwrap().value, dec("-42.10"));
        assert_eq!(tb.book.account_splits(tb.groceries).len(), 1);
        assert_eq!(tb.book.transaction(trans).unwrap().date_posted, date(2024, 3, 5));

        // cursor lands on a fresh blank transaction
        assert_ne!(reg.blank_trans(&tb.book), Some(trans));
        assert_eq!(reg.current_trans(&tb.book), reg.blank_trans(&tb.book));
        assert_eq!(reg.last_num(), Some("101"));
        assert_eq!(tb.book.account(tb.checking).unwrap().last_num.as_deref(), Some("101"));
        assert!(script.balance_prompts().is_empty());
    }

    #[test]
    fn test_record_untouched_blank_twice_creates_nothing() {
        let mut tb = create_test_book();
        let (mut reg, _) = create_test_register(&mut tb.book, RegisterType::Account(tb.checking), RegisterStyle::Ledger);
        let count = tb.book.transactions().count();

        reg.record(&mut tb.book).unwrap();
        reg.record(&mut tb.book).unwrap();

        assert_eq!(tb.book.transactions().count(), count);
        assert!(tb.book.account_splits(tb.checking).is_empty());
    }

    #[test]
    fn test_degenerate_blank_edit_is_discarded() {
        let mut tb = create_test_book();
        let (mut reg, _) = create_test_register(&mut tb.book, RegisterType::Account(tb.checking), RegisterStyle::Ledger);
        let blank = reg.blank_split(&tb.book);

        for _ in 0..2 {
            reg.set_cell(&mut tb.book, CellName::Date, "2024-01-02").unwrap();
            reg.record(&mut tb.book).unwrap();
        }

        assert!(tb.book.account_splits(tb.checking).is_empty());
        assert_eq!(reg.blank_split(&tb.book), blank);
        assert!(reg.pending_trans(&tb.book).is_none());
    }

    #[test]
    fn test_record_refused_returns_imbalance() {
        let mut tb = create_test_book();
        let (mut reg, script) = create_test_register(&mut tb.book, RegisterType::GeneralJournal, RegisterStyle::Journal);

        // a description alone is not worth keeping
        reg.set_cell(&mut tb.book, CellName::Description, "Half entry").unwrap();
        reg.record(&mut tb.book).unwrap();
        assert!(script.balance_prompts().is_empty());
        assert!(reg.pending_trans(&tb.book).is_none());

        let trans = reg.blank_trans(&tb.book).unwrap();
        let split = reg.blank_split(&tb.book);
        let loc = cell_loc(&reg, &tb.book, trans, split, CursorClass::Split, CellName::Debit);
        reg.traverse_to(&mut tb.book, loc, crate::table::TraversalDir::Pointer);
        reg.set_cell(&mut tb.book, CellName::Transfer, "Expenses:Coffee").unwrap();
        reg.set_cell(&mut tb.book, CellName::Debit, "3.00").unwrap();

        let err = reg.record(&mut tb.book).unwrap_err();
        match err {
            LedgerError::Imbalance(e) => {
                assert_eq!(e.trans, trans);
                assert_eq!(e.imbalance, dec("3.00"));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(script.balance_prompts().len(), 1);
        assert_eq!(reg.pending_trans(&tb.book), Some(trans));
        assert!(tb.book.is_open(trans));
    }

    #[test]
    fn test_reconciled_split_needs_confirmation() {
        let mut tb = create_test_book();
        let t = create_test_transaction(&mut tb.book, 1, "Paycheck", tb.checking, tb.groceries, "10.00");
        tb.book.begin_edit(t).unwrap();
        let anchor = tb.book.account_splits(tb.checking)[0];
        tb.book.split_mut(anchor).unwrap().reconcile = ReconcileState::Reconciled;
        tb.book.commit_edit(t).unwrap();

        let (mut reg, script) = create_test_register(&mut tb.book, RegisterType::Account(tb.checking), RegisterStyle::Ledger);
        let loc = cell_loc(&reg, &tb.book, t, Some(anchor), CursorClass::Trans, CellName::Description);
        reg.traverse_to(&mut tb.book, loc, crate::table::TraversalDir::Pointer);

        // declined
        assert_eq!(reg.set_cell(&mut tb.book, CellName::Description, "Pay"), Err(LedgerError::EditDenied));
        assert_eq!(script.reconcile_prompts(), 1);

        // confirmed once per visit
        script.reconcile(true);
        reg.set_cell(&mut tb.book, CellName::Description, "Pay").unwrap();
        reg.set_cell(&mut tb.book, CellName::Num, "7").unwrap();
        assert_eq!(script.reconcile_prompts(), 2);
    }

    #[test]
    fn test_toggle_reconcile_from_reconciled_asks() {
        let mut tb = create_test_book();
        let t = create_test_transaction(&mut tb.book, 1, "Paycheck", tb.checking, tb.groceries, "10.00");
        tb.book.begin_edit(t).unwrap();
        let anchor = tb.book.account_splits(tb.checking)[0];
        tb.book.split_mut(anchor).unwrap().reconcile = ReconcileState::Reconciled;
        tb.book.commit_edit(t).unwrap();

        let (mut reg, script) = create_test_register(&mut tb.book, RegisterType::Account(tb.checking), RegisterStyle::Ledger);
        let loc = cell_loc(&reg, &tb.book, t, Some(anchor), CursorClass::Trans, CellName::Reconcile);
        reg.traverse_to(&mut tb.book, loc, crate::table::TraversalDir::Pointer);
        assert_eq!(reg.table().cell_value(CellName::Reconcile), "y");

        script.reconcile(true);
        reg.toggle_reconcile(&mut tb.book).unwrap();
        assert_eq!(reg.table().cell_value(CellName::Reconcile), "n");
        assert_eq!(script.reconcile_prompts(), 1);
    }

    #[test]
    fn test_cancel_trans_changes_rolls_back() {
        let mut tb = create_test_book();
        let t = create_test_transaction(&mut tb.book, 1, "Food", tb.checking, tb.groceries, "20.00");
        let (mut reg, _) = create_test_register(&mut tb.book, RegisterType::Account(tb.checking), RegisterStyle::Journal);

        let sb = tb.book.account_splits(tb.groceries)[0];
        let loc = cell_loc(&reg, &tb.book, t, Some(sb), CursorClass::Split, CellName::Memo);
        reg.traverse_to(&mut tb.book, loc, crate::table::TraversalDir::Pointer);
        reg.set_cell(&mut tb.book, CellName::Memo, "bread").unwrap();

        // onto the lead row of the same transaction: saved, still pending
        let anchor = tb.book.account_splits(tb.checking)[0];
        let lead = cell_loc(&reg, &tb.book, t, Some(anchor), CursorClass::Trans, CellName::Description);
        reg.traverse_to(&mut tb.book, lead, crate::table::TraversalDir::Pointer);
        assert_eq!(tb.book.split(sb).unwrap().memo, "bread");
        assert_eq!(reg.pending_trans(&tb.book), Some(t));

        reg.cancel_cursor_trans_changes(&mut tb.book);
        assert_eq!(tb.book.split(sb).unwrap().memo, "");
        assert!(reg.pending_trans(&tb.book).is_none());
        assert!(!tb.book.is_open(t));
        assert_eq!(reg.current_split(&tb.book), Some(anchor));
    }

    #[test]
    fn test_cancel_split_changes_keeps_model() {
        let mut tb = create_test_book();
        let (mut reg, _) = create_test_register(&mut tb.book, RegisterType::Account(tb.checking), RegisterStyle::Ledger);

        reg.set_cell(&mut tb.book, CellName::Description, "Oops").unwrap();
        reg.cancel_cursor_split_changes(&mut tb.book);

        assert_eq!(reg.table().cell_value(CellName::Description), "");
        assert!(!reg.table().current_cursor_changed());
        assert!(reg.pending_trans(&tb.book).is_none());
    }

    #[test]
    fn test_delete_split_and_transaction() {
        let mut tb = create_test_book();
        let t = create_test_transaction(&mut tb.book, 1, "Food", tb.checking, tb.groceries, "20.00");
        let (mut reg, _) = create_test_register(&mut tb.book, RegisterType::Account(tb.checking), RegisterStyle::Journal);

        assert_eq!(reg.delete_current_trans(&mut tb.book), Err(LedgerError::BlankEntry));

        let sb = tb.book.account_splits(tb.groceries)[0];
        let loc = cell_loc(&reg, &tb.book, t, Some(sb), CursorClass::Split, CellName::Memo);
        reg.traverse_to(&mut tb.book, loc, crate::table::TraversalDir::Pointer);
        reg.delete_current_split(&mut tb.book).unwrap();

        assert!(tb.book.split(sb).is_none());
        assert_eq!(reg.pending_trans(&tb.book), Some(t));

        reg.delete_current_trans(&mut tb.book).unwrap();
        assert!(tb.book.transaction(t).is_none());
        assert!(reg.pending_trans(&tb.book).is_none());
        assert!(tb.book.account_splits(tb.checking).is_empty());
        println!("✅ Split and transaction deleted through the register");
    }
}
