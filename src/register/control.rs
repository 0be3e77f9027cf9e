// 🧭 Register Control - the traversal state machine
//
// Every cursor move goes through two steps:
//   1. check_traverse: may the cursor leave? Resolves the transfer cell,
//      tabs off the end into a new entry, runs auto-completion and asks
//      whether a changed transaction should be recorded.
//   2. move_cursor: save the cursor, balance and commit the transaction
//      being left, reload, and put the cursor where it was asked to go.
//
// An unbalanced transaction the user declines to fix keeps the cursor
// where it was. Nothing the user typed is thrown away by a refusal.

use log::{debug, info, warn};
use rust_decimal::Decimal;
use std::collections::HashSet;

use super::save::SaveOutcome;
use super::{CursorHint, RegisterStyle, SplitRegister, SPLIT_TRANS_STR};
use crate::entities::{AccountId, Book, SplitId, TransId};
use crate::error::{LedgerError, LedgerResult};
use crate::ports::{BalanceChoice, BalancePrompt, CommitChoice, PresentationEvent};
use crate::scrub::scrub_imbalance;
use crate::table::{CellName, CursorClass, TraversalDir, VirtualCellLocation, VirtualLocation};

#[derive(Debug, Clone, PartialEq)]
pub enum RefusalReason {
    /// The transaction being left does not balance and was not fixed
    Unbalanced { trans: TransId, imbalance: Decimal },
    /// A cell holds something the model cannot take
    Invalid(LedgerError),
}

/// Result of asking the register to move its cursor
#[derive(Debug, Clone, PartialEq)]
pub enum TraverseOutcome {
    Moved(VirtualLocation),
    Refused {
        location: VirtualLocation,
        reason: RefusalReason,
    },
    /// The user cancelled; nothing changed
    Cancelled,
}

impl TraverseOutcome {
    pub fn is_moved(&self) -> bool {
        matches!(self, TraverseOutcome::Moved(_))
    }
}

/// Entities under one virtual cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RowEntities {
    trans: Option<TransId>,
    split: Option<SplitId>,
    trans_split: Option<SplitId>,
    class: CursorClass,
}

impl SplitRegister {
    // ========================================================================
    // ENTRY POINTS
    // ========================================================================

    /// Keyboard traversal from the current cell
    pub fn traverse(&mut self, book: &mut Book, dir: TraversalDir) -> TraverseOutcome {
        let dest = self.table.candidate_destination(dir);
        self.traverse_to(book, dest, dir)
    }

    /// Move the cursor to `dest` (a click is `TraversalDir::Pointer`)
    pub fn traverse_to(&mut self, book: &mut Book, dest: VirtualLocation, dir: TraversalDir) -> TraverseOutcome {
        match self.check_traverse(book, dest, dir) {
            Ok(loc) => self.move_cursor(book, loc),
            Err(outcome) => {
                self.info.exact_traversal = false;
                outcome
            }
        }
    }

    fn row_entities(&self, book: &Book, vcell: VirtualCellLocation) -> RowEntities {
        RowEntities {
            trans: self.get_trans(book, vcell),
            split: self.get_split(book, vcell),
            trans_split: self
                .get_trans_split(vcell)
                .and_then(|(s, _)| s)
                .filter(|s| book.split(*s).is_some()),
            class: self.get_cursor_class(vcell),
        }
    }

    fn snap(&self, loc: VirtualLocation) -> VirtualLocation {
        self.table
            .find_close_valid_cell(loc, self.info.exact_traversal)
            .unwrap_or_else(|| self.table.current_location())
    }

    fn refuse(&self, reason: RefusalReason) -> TraverseOutcome {
        TraverseOutcome::Refused {
            location: self.table.current_location(),
            reason,
        }
    }

    // ========================================================================
    // CHECK
    // ========================================================================

    fn check_traverse(&mut self, book: &mut Book, dest: VirtualLocation, dir: TraversalDir) -> Result<VirtualLocation, TraverseOutcome> {
        if self.info.first_pass {
            return Ok(dest);
        }
        self.info.exact_traversal = dir == TraversalDir::Pointer;

        let current = self.table.current_location();
        let Some(trans) = self.current_trans(book) else {
            return Ok(self.snap(dest));
        };

        let changed = self.table.current_cursor_changed();
        if !changed && self.pending_trans(book) != Some(trans) {
            return Ok(self.snap(dest));
        }

        // accounts created on the way out; a cancelled move takes them back
        let mut created = Vec::new();
        if changed && self.table.current_cell_name() == Some(CellName::Transfer) && self.table.cell_changed(CellName::Transfer) {
            match self.resolve_transfer_cell(book) {
                Ok(accounts) => created = accounts,
                Err(e) => return Err(self.refuse(RefusalReason::Invalid(e))),
            }
        }

        // tabbing off the very last line starts a new entry
        if (changed || self.info.blank_split_edited)
            && dir == TraversalDir::Right
            && self.table.move_vertical_position(current, 1).is_none()
            && self.table.move_tab(current, true).is_none()
        {
            self.info.traverse_to_new = true;
            return Ok(VirtualLocation::at_row(current.vcell.row + 1));
        }

        if dir == TraversalDir::Right && !self.table.out_of_bounds(dest.vcell) {
            match self.auto_completion(book) {
                Ok(Some(loc)) => return Ok(loc),
                Ok(None) => {}
                Err(e) => return Err(self.refuse(RefusalReason::Invalid(e))),
            }
        }

        // tabbing off a blank split row lands on the next blank split row
        if changed && self.current_split(book).is_none() && dir == TraversalDir::Right && dest.vcell != current.vcell {
            let (trans_split, _) = self.current_trans_split(book).unzip();
            self.info.hint = CursorHint {
                trans: Some(trans),
                split: None,
                trans_split: trans_split.flatten(),
                class: CursorClass::Split,
            };
            self.info.hint_set_by_traverse = true;
        }

        let dest = self.snap(dest);
        if self.get_trans(book, dest.vcell) == Some(trans) {
            return Ok(dest);
        }

        match self.port.ask_commit_or_discard() {
            CommitChoice::Commit => Ok(dest),
            CommitChoice::Discard => {
                let target = self.row_entities(book, dest.vcell);
                self.cancel_cursor_trans_changes(book);
                self.remove_created_accounts(book, &created);

                let mut dest = dest;
                if let Some(vcell) = self.find_split(book, target.trans, target.trans_split, target.split, target.class) {
                    dest.vcell = vcell;
                }
                Ok(self.snap(dest))
            }
            CommitChoice::Cancel => {
                self.info.hint_set_by_traverse = false;
                self.remove_created_accounts(book, &created);
                Err(TraverseOutcome::Cancelled)
            }
        }
    }

    /// Leaving a transfer cell: the named account must exist (or be created)
    /// and must be able to hold splits. Returns the accounts created, deepest first.
    fn resolve_transfer_cell(&mut self, book: &mut Book) -> LedgerResult<Vec<AccountId>> {
        let name = self.table.cell_value(CellName::Transfer).trim().to_string();
        if name.is_empty() || name == SPLIT_TRANS_STR {
            return Ok(Vec::new());
        }

        let separator = self.config.account_separator;
        let mut created = Vec::new();
        let account = match book.find_account(&name, separator) {
            Some(account) => account,
            None => {
                if !self.port.confirm_create_account(&name) {
                    return Err(LedgerError::AccountNotFound(name));
                }
                let commodity = self
                    .info
                    .default_account
                    .and_then(|a| book.account(a))
                    .map(|a| a.commodity.clone())
                    .unwrap_or_else(|| book.default_currency().clone());
                let existing: HashSet<AccountId> = book.accounts().map(|(id, _)| id).collect();
                let account = book.find_or_create_account(&name, separator, &commodity)?;
                let mut walk = Some(account);
                while let Some(id) = walk.filter(|id| !existing.contains(id) && *id != book.root()) {
                    created.push(id);
                    walk = book.account(id).and_then(|a| a.parent());
                }
                self.account_qf.rebuild(book);
                info!("Created account '{}'", name);
                account
            }
        };

        if book.account(account).map(|a| a.placeholder).unwrap_or(false) {
            let vcell = self.table.current_location().vcell;
            let text = self.entry_text(book, vcell, CellName::Transfer);
            self.table.load_cell_value(CellName::Transfer, text);
            return Err(LedgerError::PlaceholderAccount(name));
        }

        Ok(created)
    }

    fn remove_created_accounts(&mut self, book: &mut Book, created: &[AccountId]) {
        if created.is_empty() {
            return;
        }
        for id in created {
            if let Err(e) = book.remove_account(*id) {
                warn!("Account created for the transfer cell kept: {}", e);
            }
        }
        self.account_qf.rebuild(book);
        debug!("Removed {} account(s) created by a cancelled move", created.len());
    }

    // ========================================================================
    // MOVE
    // ========================================================================

    fn move_cursor(&mut self, book: &mut Book, new_loc: VirtualLocation) -> TraverseOutcome {
        let old_loc = self.table.current_location();

        // within one virtual cell nothing is saved
        if new_loc.vcell == old_loc.vcell && !self.info.traverse_to_new && !self.info.hint_set_by_traverse {
            self.table.set_current_offset(new_loc);
            self.table.notify(PresentationEvent::CursorMoved(new_loc));
            self.info.exact_traversal = false;
            self.update_help_text();
            return TraverseOutcome::Moved(self.table.current_location());
        }

        let old = self.row_entities(book, old_loc.vcell);
        let old_lead = self.get_trans_split(old_loc.vcell).map(|(_, lead)| lead);

        let mut new = if self.info.traverse_to_new {
            RowEntities {
                trans: if old.class == CursorClass::Split { old.trans } else { None },
                split: None,
                trans_split: None,
                class: CursorClass::None,
            }
        } else if self.info.hint_set_by_traverse {
            RowEntities {
                trans: self.info.hint.trans,
                split: self.info.hint.split,
                trans_split: self.info.hint.trans_split,
                class: self.info.hint.class,
            }
        } else {
            self.row_entities(book, new_loc.vcell)
        };

        self.info.hint_set_by_traverse = false;
        self.info.reg_loaded = false;

        let mut new_loc = new_loc;
        let mut refusal = None;

        let mut saved = match self.save(book) {
            Ok(SaveOutcome::Saved) => true,
            Ok(SaveOutcome::Unchanged) => false,
            Err(e) => {
                warn!("Cursor could not be saved: {}", e);
                self.info.traverse_to_new = false;
                self.info.exact_traversal = false;
                return self.refuse(RefusalReason::Invalid(e));
            }
        };

        // a split emptied by the user goes away when the cursor leaves it
        if old.class == CursorClass::Split && old.split != new.split && old.split != self.blank_split(book) && self.old_split_empty() {
            if let (Some(split), Some(trans)) = (old.split, old.trans) {
                match self.make_pending(book, trans).and_then(|_| book.destroy_split(split)) {
                    Ok(()) => {
                        saved = true;
                        debug!("Removed empty split");
                    }
                    Err(e) => warn!("Empty split not removed: {}", e),
                }
            }
        }

        let pending = self.pending_trans(book);
        let leaving = old.trans.filter(|t| old.trans != new.trans && book.transaction(*t).is_some());

        if let Some(trans) = leaving {
            let result = if pending == Some(trans) {
                saved = true;
                match self.balance_trans(book, trans) {
                    Ok(None) => match self.commit_pending(book, trans) {
                        Ok(()) => Ok(None),
                        Err(e) => Ok(Some(e.imbalance)),
                    },
                    other => other,
                }
            } else if !book.is_open(trans)
                && !book.has_reconciled_splits(trans)
                && !self.info.first_pass
                && !book.imbalance(trans).is_zero()
            {
                // committed elsewhere but still unbalanced
                saved = true;
                self.balance_trans(book, trans)
            } else {
                Ok(None)
            };

            match result {
                Ok(None) => {}
                Ok(Some(imbalance)) => {
                    refusal = Some(RefusalReason::Unbalanced { trans, imbalance });
                }
                Err(e) => refusal = Some(RefusalReason::Invalid(e)),
            }

            if refusal.is_some() {
                new = old;
                new_loc = old_loc;
                self.info.traverse_to_new = false;
                debug!("Cursor kept on unbalanced transaction");
            }
        }

        if saved {
            self.info.hint = CursorHint {
                trans: new.trans,
                split: new.split,
                trans_split: new.trans_split,
                class: new.class,
            };
            if !self.info.reg_loaded {
                self.refresh(book);
            }
            new_loc.vcell = self
                .find_split(book, new.trans, new.trans_split, new.split, new.class)
                .unwrap_or_else(|| self.table.current_location().vcell);
            new = self.row_entities(book, new_loc.vcell);
        } else if self.info.traverse_to_new {
            let blank_trans = self.blank_trans(book);
            let blank = self.blank_split(book);
            if let Some(vcell) = self.find_split(book, blank_trans, blank, None, CursorClass::Trans) {
                new_loc = VirtualLocation {
                    vcell,
                    phys_row_offset: 0,
                    phys_col_offset: 0,
                };
            }
            new = self.row_entities(book, new_loc.vcell);
            self.info.traverse_to_new = false;
        }

        new_loc = self.snap(new_loc);

        // collapse the transaction left behind, expand the one entered
        let multi_line = self.config.style == RegisterStyle::Journal;
        let dynamic = self.config.style == RegisterStyle::AutoLedger;
        if !saved && old.trans_split != new.trans_split && (multi_line || dynamic || self.info.trans_expanded) {
            if let Some(lead) = old_lead {
                let passive = self.passive_cursor();
                self.table.set_vcell_cursor(lead, passive);
                self.set_trans_visible(lead, false, multi_line);
            }
            self.info.trans_expanded = false;

            if multi_line || dynamic {
                if let Some((_, lead)) = self.get_trans_split(new_loc.vcell) {
                    let active = self.active_cursor();
                    self.table.set_vcell_cursor(lead, active);
                    self.set_trans_visible(lead, true, multi_line);
                }
            }
            new_loc = self.snap(new_loc);
        }

        if old.split != new.split {
            self.info.change_confirmed = false;
        }

        if new_loc.vcell == self.table.current_location().vcell {
            self.table.set_current_offset(new_loc);
            self.table.notify(PresentationEvent::CursorMoved(new_loc));
        } else {
            self.table.move_cursor_gui(new_loc);
            self.load_cursor_values(book);
        }

        let (trans_split, _) = self.current_trans_split(book).unzip();
        self.info.hint = CursorHint {
            trans: self.current_trans(book),
            split: self.current_split(book),
            trans_split: trans_split.flatten(),
            class: self.current_cursor_class(),
        };
        self.info.exact_traversal = false;
        self.update_help_text();

        match refusal {
            Some(reason) => self.refuse(reason),
            None => TraverseOutcome::Moved(self.table.current_location()),
        }
    }

    // ========================================================================
    // BALANCING
    // ========================================================================

    /// Offer to fix an unbalanced transaction. Returns what is left of the
    /// imbalance: None once the transaction balances.
    pub(crate) fn balance_trans(&mut self, book: &mut Book, trans: TransId) -> LedgerResult<Option<Decimal>> {
        let imbalance = book.imbalance(trans);
        if imbalance.is_zero() {
            return Ok(None);
        }
        let body = book.transaction(trans).ok_or(LedgerError::UnknownTransaction(trans))?;

        let default_account = self.info.default_account;
        let mut other_account = None;
        if let Some(&first) = body.splits().first() {
            if let Some(other) = book.other_split(first) {
                other_account = book.split(other).and_then(|s| s.account());
                if default_account == other_account {
                    other_account = book.split(first).and_then(|s| s.account());
                }
            }
        }
        let two_accounts = other_account.is_some() && other_account != default_account;

        // adjusting "current" or "other" only means something in a one-account view
        let single = self.reg_type().is_single_account() && default_account.is_some();
        let mut choices = vec![BalanceChoice::Manual, BalanceChoice::AutoAdjust];
        if single {
            choices.push(BalanceChoice::AdjustCurrent);
        }
        if single && two_accounts {
            choices.push(BalanceChoice::AdjustOther);
        }

        let prompt = BalancePrompt {
            trans,
            description: body.description.clone(),
            imbalance,
            currency: body.currency.mnemonic.clone(),
            choices,
        };

        let mut choice = self.port.ask_balance_choice(&prompt);
        if !prompt.choices.contains(&choice) {
            warn!("Balance choice {:?} not offered; leaving the transaction as is", choice);
            choice = BalanceChoice::Manual;
        }

        let target = match choice {
            BalanceChoice::Manual => return Ok(Some(imbalance)),
            BalanceChoice::AutoAdjust => None,
            BalanceChoice::AdjustCurrent => default_account,
            BalanceChoice::AdjustOther => other_account,
        };

        scrub_imbalance(book, trans, target)?;

        let remaining = book.imbalance(trans);
        info!("Balanced transaction ({:?})", choice);
        Ok(if remaining.is_zero() { None } else { Some(remaining) })
    }

    // ========================================================================
    // AUTO-COMPLETION
    // ========================================================================

    /// Fill the cursor from an earlier entry when the user leaves a
    /// description or memo cell. Returns where the cursor should go.
    fn auto_completion(&mut self, book: &mut Book) -> LedgerResult<Option<VirtualLocation>> {
        match self.current_cursor_class() {
            CursorClass::Trans => self.auto_complete_trans(book),
            CursorClass::Split => self.auto_complete_split(book),
            CursorClass::None => Ok(None),
        }
    }

    fn auto_complete_trans(&mut self, book: &mut Book) -> LedgerResult<Option<VirtualLocation>> {
        let Some(trans) = self.current_trans(book) else {
            return Ok(None);
        };
        if Some(trans) != self.blank_trans(book) || self.table.current_cell_name() != Some(CellName::Description) {
            return Ok(None);
        }

        let untouched = [CellName::Transfer, CellName::Debit, CellName::Credit, CellName::Notes, CellName::Reconcile];
        if untouched.iter().any(|name| self.table.cell_changed(*name)) || !self.table.cell_changed(CellName::Description) {
            return Ok(None);
        }

        let description = self.table.cell_value(CellName::Description).trim().to_string();
        if description.is_empty() {
            return Ok(None);
        }

        let source = self
            .info
            .default_account
            .and_then(|a| book.find_trans_by_desc(a, &description))
            .or_else(|| self.find_trans_in_register(book, &description))
            .filter(|t| *t != trans);
        let Some(source) = source else {
            return Ok(None);
        };

        let typed_num = self
            .table
            .cell_changed(CellName::Num)
            .then(|| self.table.cell_value(CellName::Num).to_string());

        // keep the date and number typed so far
        self.save(book)?;
        self.make_pending(book, trans)?;
        book.copy_trans_onto(source, trans)?;
        if let Some(num) = typed_num {
            book.trans_mut(trans)?.num = num;
        }

        let splits = book.transaction(trans).map(|t| t.splits().to_vec()).unwrap_or_default();
        let blank = self
            .info
            .default_account
            .and_then(|a| splits.iter().copied().find(|s| book.split(*s).and_then(|b| b.account()) == Some(a)))
            .or_else(|| splits.first().copied());

        self.info.blank_split = blank;
        self.info.blank_split_edited = true;

        let lead = self.table.current_location().vcell;
        self.table.set_vcell_split(lead, blank);
        self.info.hint = CursorHint {
            trans: Some(trans),
            split: blank,
            trans_split: blank,
            class: CursorClass::Trans,
        };
        self.refresh(book);

        info!("Auto-completed '{}' from an earlier transaction", description);

        let value = blank.and_then(|s| book.split(s)).map(|s| s.value).unwrap_or_default();
        let target = if value < Decimal::ZERO { CellName::Credit } else { CellName::Debit };
        Ok(self.table.current_cell_location(target))
    }

    fn auto_complete_split(&mut self, book: &mut Book) -> LedgerResult<Option<VirtualLocation>> {
        if self.current_split(book).is_some() || self.table.current_cell_name() != Some(CellName::Memo) {
            return Ok(None);
        }
        if self.table.cell_changed(CellName::Transfer) || self.table.cell_changed(CellName::Reconcile) {
            return Ok(None);
        }
        if !self.table.cell_changed(CellName::Memo) {
            return Ok(None);
        }

        let memo = self.table.cell_value(CellName::Memo).trim().to_string();
        if memo.is_empty() {
            return Ok(None);
        }
        let Some(trans) = self.current_trans(book) else {
            return Ok(None);
        };

        let found = self
            .info
            .default_account
            .and_then(|a| book.find_split_by_memo(a, &memo, true))
            .or_else(|| self.find_split_in_register(book, trans, &memo));
        let Some(source) = found.and_then(|s| book.split(s)).cloned() else {
            return Ok(None);
        };

        let scale = book.transaction(trans).map(|t| t.currency.scale).unwrap_or(2);

        if !self.table.cell_changed(CellName::Action) {
            self.table.set_cell_value(CellName::Action, &source.action);
        }

        let transfer = source
            .account()
            .map(|a| book.full_name(a, self.config.account_separator))
            .unwrap_or_default();
        self.table.set_cell_value(CellName::Transfer, &transfer);
        self.table.mark_cell_changed(CellName::Transfer);

        if !self.table.cell_changed(CellName::Debit) && !self.table.cell_changed(CellName::Credit) {
            self.table.set_cell_value(CellName::Debit, &super::load::debit_text(source.value, scale));
            self.table.set_cell_value(CellName::Credit, &super::load::credit_text(source.value, scale));
        }

        debug!("Auto-completed memo '{}'", memo);

        let target = if source.value < Decimal::ZERO { CellName::Credit } else { CellName::Debit };
        Ok(self.table.current_cell_location(target))
    }

    /// Latest transaction in the register with this description
    fn find_trans_in_register(&self, book: &Book, description: &str) -> Option<TransId> {
        let blank = self.blank_trans(book);
        (1..self.table.num_virt_rows() as i32)
            .rev()
            .map(|row| VirtualCellLocation::new(row, 0))
            .filter(|loc| self.get_cursor_class(*loc) == CursorClass::Trans)
            .filter_map(|loc| self.get_trans(book, loc))
            .filter(|t| Some(*t) != blank)
            .find(|t| book.transaction(*t).map(|body| body.description == description).unwrap_or(false))
    }

    /// Latest split in the register with this memo, the current transaction first
    fn find_split_in_register(&self, book: &Book, current: TransId, memo: &str) -> Option<SplitId> {
        if let Some(split) = book.find_split_in_trans_by_memo(current, memo, true) {
            return Some(split);
        }
        (1..self.table.num_virt_rows() as i32)
            .rev()
            .map(|row| VirtualCellLocation::new(row, 0))
            .filter(|loc| self.get_cursor_class(*loc) == CursorClass::Trans)
            .filter_map(|loc| self.get_trans(book, loc))
            .find_map(|t| book.find_split_in_trans_by_memo(t, memo, true))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::{RegisterStyle, RegisterType};
    use super::*;
    use crate::table::CursorKind;

    fn blank_lead(reg: &SplitRegister, book: &Book, name: CellName) -> VirtualLocation {
        let trans = reg.blank_trans(book).unwrap();
        cell_loc(reg, book, trans, reg.blank_split(book), CursorClass::Trans, name)
    }

    #[test]
    fn test_balanced_moves_never_ask_to_balance() {
        let mut tb = create_test_book();
        let t1 = create_test_transaction(&mut tb.book, 1, "Food", tb.checking, tb.groceries, "20.00");
        let t2 = create_test_transaction(&mut tb.book, 2, "Latte", tb.checking, tb.coffee, "4.50");
        let (mut reg, script) = create_test_register(&mut tb.book, RegisterType::Account(tb.checking), RegisterStyle::Ledger);
        script.commit(CommitChoice::Commit);

        let a1 = tb.book.account_splits(tb.checking)[0];
        let a2 = tb.book.account_splits(tb.checking)[1];

        let loc = cell_loc(&reg, &tb.book, t1, Some(a1), CursorClass::Trans, CellName::Description);
        assert!(reg.traverse_to(&mut tb.book, loc, TraversalDir::Pointer).is_moved());
        assert_eq!(script.commit_prompts(), 0);

        reg.set_cell(&mut tb.book, CellName::Description, "Weekly food").unwrap();
        let loc = cell_loc(&reg, &tb.book, t2, Some(a2), CursorClass::Trans, CellName::Description);
        assert!(reg.traverse_to(&mut tb.book, loc, TraversalDir::Pointer).is_moved());

        assert_eq!(script.commit_prompts(), 1);
        assert!(script.balance_prompts().is_empty());
        assert_eq!(tb.book.transaction(t1).unwrap().description, "Weekly food");
        assert!(!tb.book.is_open(t1));
        assert_eq!(reg.current_trans(&tb.book), Some(t2));
    }

    #[test]
    fn test_adjust_other_account_on_leave() {
        let mut tb = create_test_book();
        let t = create_test_transaction(&mut tb.book, 1, "Food", tb.checking, tb.groceries, "10.00");
        let (mut reg, script) = create_test_register(&mut tb.book, RegisterType::Account(tb.checking), RegisterStyle::Journal);
        script.commit(CommitChoice::Commit).balance(BalanceChoice::AdjustOther);

        let sb = tb.book.account_splits(tb.groceries)[0];
        let loc = cell_loc(&reg, &tb.book, t, Some(sb), CursorClass::Split, CellName::Debit);
        assert!(reg.traverse_to(&mut tb.book, loc, TraversalDir::Pointer).is_moved());
        reg.set_cell(&mut tb.book, CellName::Debit, "9.99").unwrap();

        let target = blank_lead(&reg, &tb.book, CellName::Description);
        assert!(reg.traverse_to(&mut tb.book, target, TraversalDir::Pointer).is_moved());

        let prompts = script.balance_prompts();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].imbalance, dec("-0.01"));
        assert!(prompts[0].choices.contains(&BalanceChoice::AdjustCurrent));
        assert!(prompts[0].choices.contains(&BalanceChoice::AdjustOther));

        assert_eq!(tb.book.split(sb).unwrap().value, dec("10.00"));
        assert!(tb.book.imbalance(t).is_zero());
        assert!(!tb.book.is_open(t));
        assert_eq!(reg.current_trans(&tb.book), reg.blank_trans(&tb.book));
        println!("✅ Imbalance absorbed by the other account");
    }

    #[test]
    fn test_manual_refusal_keeps_edit_then_auto_adjust() {
        let mut tb = create_test_book();
        let t = create_test_transaction(&mut tb.book, 1, "Food", tb.checking, tb.groceries, "10.00");
        let (mut reg, script) = create_test_register(&mut tb.book, RegisterType::Account(tb.checking), RegisterStyle::Journal);
        script
            .commit(CommitChoice::Commit)
            .balance(BalanceChoice::Manual)
            .commit(CommitChoice::Commit)
            .balance(BalanceChoice::AutoAdjust);

        let sb = tb.book.account_splits(tb.groceries)[0];
        let loc = cell_loc(&reg, &tb.book, t, Some(sb), CursorClass::Split, CellName::Debit);
        reg.traverse_to(&mut tb.book, loc, TraversalDir::Pointer);
        reg.set_cell(&mut tb.book, CellName::Debit, "9.99").unwrap();

        let target = blank_lead(&reg, &tb.book, CellName::Description);
        match reg.traverse_to(&mut tb.book, target, TraversalDir::Pointer) {
            TraverseOutcome::Refused {
                reason: RefusalReason::Unbalanced { trans, imbalance },
                ..
            } => {
                assert_eq!(trans, t);
                assert_eq!(imbalance, dec("-0.01"));
            }
            other => panic!("expected a refusal, got {:?}", other),
        }

        // the edit survives the refusal
        assert_eq!(reg.current_split(&tb.book), Some(sb));
        assert_eq!(reg.pending_trans(&tb.book), Some(t));
        assert_eq!(tb.book.split(sb).unwrap().value, dec("9.99"));

        let target = blank_lead(&reg, &tb.book, CellName::Description);
        assert!(reg.traverse_to(&mut tb.book, target, TraversalDir::Pointer).is_moved());

        let body = tb.book.transaction(t).unwrap();
        assert_eq!(body.splits().len(), 3);
        assert!(tb.book.imbalance(t).is_zero());
        assert!(tb.book.find_account("Imbalance-USD", ':').is_some());
        assert_eq!(script.balance_prompts().len(), 2);
    }

    #[test]
    fn test_cancel_leaves_everything_in_place() {
        let mut tb = create_test_book();
        let t = create_test_transaction(&mut tb.book, 1, "Food", tb.checking, tb.groceries, "10.00");
        let (mut reg, script) = create_test_register(&mut tb.book, RegisterType::Account(tb.checking), RegisterStyle::Journal);
        script.commit(CommitChoice::Cancel);

        let sb = tb.book.account_splits(tb.groceries)[0];
        let loc = cell_loc(&reg, &tb.book, t, Some(sb), CursorClass::Split, CellName::Debit);
        reg.traverse_to(&mut tb.book, loc, TraversalDir::Pointer);
        reg.set_cell(&mut tb.book, CellName::Debit, "9.99").unwrap();

        let target = blank_lead(&reg, &tb.book, CellName::Description);
        assert_eq!(reg.traverse_to(&mut tb.book, target, TraversalDir::Pointer), TraverseOutcome::Cancelled);

        assert_eq!(tb.book.split(sb).unwrap().value, dec("10.00"));
        assert!(!tb.book.is_open(t));
        assert_eq!(reg.current_split(&tb.book), Some(sb));
        assert_eq!(reg.table().cell_value(CellName::Debit), "9.99");
        assert!(script.balance_prompts().is_empty());
    }

    #[test]
    fn test_discard_rolls_back_pending_edit() {
        let mut tb = create_test_book();
        let t = create_test_transaction(&mut tb.book, 1, "Food", tb.checking, tb.groceries, "10.00");
        let (mut reg, script) = create_test_register(&mut tb.book, RegisterType::Account(tb.checking), RegisterStyle::Journal);
        script.commit(CommitChoice::Discard);

        let sb = tb.book.account_splits(tb.groceries)[0];
        let anchor = tb.book.account_splits(tb.checking)[0];
        let loc = cell_loc(&reg, &tb.book, t, Some(sb), CursorClass::Split, CellName::Memo);
        reg.traverse_to(&mut tb.book, loc, TraversalDir::Pointer);
        reg.set_cell(&mut tb.book, CellName::Memo, "bread").unwrap();

        let lead = cell_loc(&reg, &tb.book, t, Some(anchor), CursorClass::Trans, CellName::Description);
        reg.traverse_to(&mut tb.book, lead, TraversalDir::Pointer);
        assert_eq!(tb.book.split(sb).unwrap().memo, "bread");

        let target = blank_lead(&reg, &tb.book, CellName::Description);
        assert!(reg.traverse_to(&mut tb.book, target, TraversalDir::Pointer).is_moved());

        assert_eq!(tb.book.split(sb).unwrap().memo, "");
        assert!(!tb.book.is_open(t));
        assert!(reg.pending_trans(&tb.book).is_none());
        assert_eq!(reg.current_trans(&tb.book), reg.blank_trans(&tb.book));
    }

    #[test]
    fn test_tab_off_last_cell_records_new_entry() {
        let mut tb = create_test_book();
        let (mut reg, script) = create_test_register(&mut tb.book, RegisterType::Account(tb.checking), RegisterStyle::Ledger);
        let first_blank = reg.blank_trans(&tb.book).unwrap();

        reg.set_cell(&mut tb.book, CellName::Description, "Morning latte").unwrap();
        reg.set_cell(&mut tb.book, CellName::Transfer, "Expenses:Coffee").unwrap();
        reg.set_cell(&mut tb.book, CellName::Credit, "4.50").unwrap();

        let credit = blank_lead(&reg, &tb.book, CellName::Credit);
        reg.traverse_to(&mut tb.book, credit, TraversalDir::Pointer);
        assert!(reg.traverse(&mut tb.book, TraversalDir::Right).is_moved());

        assert_eq!(script.commit_prompts(), 0);
        assert!(!tb.book.is_open(first_blank));
        assert_eq!(tb.book.transaction(first_blank).unwrap().description, "Morning latte");
        assert_eq!(tb.book.account_splits(tb.coffee).len(), 1);
        assert_eq!(tb.book.split(tb.book.account_splits(tb.checking)[0]).unwrap().value, dec("-4.50"));

        let blank = reg.blank_trans(&tb.book).unwrap();
        assert_ne!(blank, first_blank);
        assert_eq!(reg.current_trans(&tb.book), Some(blank));
        assert_eq!(reg.table().current_cell_name(), Some(CellName::Date));
    }

    #[test]
    fn test_description_auto_completion() {
        let mut tb = create_test_book();
        create_test_transaction(&mut tb.book, 1, "Coffee", tb.checking, tb.coffee, "4.50");
        let (mut reg, _) = create_test_register(&mut tb.book, RegisterType::Account(tb.checking), RegisterStyle::Ledger);

        let desc = blank_lead(&reg, &tb.book, CellName::Description);
        reg.traverse_to(&mut tb.book, desc, TraversalDir::Pointer);
        reg.set_cell(&mut tb.book, CellName::Description, "Coffee").unwrap();

        assert!(reg.traverse(&mut tb.book, TraversalDir::Right).is_moved());
        assert_eq!(reg.table().current_cell_name(), Some(CellName::Credit));
        assert_eq!(reg.table().cell_value(CellName::Credit), "4.50");
        assert_eq!(reg.table().cell_value(CellName::Transfer), "Expenses:Coffee");

        let blank = reg.blank_trans(&tb.book).unwrap();
        assert_eq!(reg.pending_trans(&tb.book), Some(blank));

        reg.record(&mut tb.book).unwrap();
        assert_eq!(tb.book.account_splits(tb.coffee).len(), 2);
        assert!(tb.book.imbalance(blank).is_zero());
    }

    #[test]
    fn test_memo_auto_completion() {
        let mut tb = create_test_book();
        let t = create_test_transaction(&mut tb.book, 1, "Food", tb.checking, tb.groceries, "20.00");
        let sb = tb.book.account_splits(tb.groceries)[0];
        tb.book.begin_edit(t).unwrap();
        tb.book.split_mut(sb).unwrap().memo = "bread".to_string();
        tb.book.commit_edit(t).unwrap();

        let (mut reg, _) = create_test_register(&mut tb.book, RegisterType::Account(tb.checking), RegisterStyle::Journal);
        let anchor = tb.book.account_splits(tb.checking)[0];

        // entering the transaction shows its blank split row
        let lead = cell_loc(&reg, &tb.book, t, Some(anchor), CursorClass::Trans, CellName::Description);
        reg.traverse_to(&mut tb.book, lead, TraversalDir::Pointer);
        let memo = cell_loc(&reg, &tb.book, t, None, CursorClass::Split, CellName::Memo);
        assert!(reg.traverse_to(&mut tb.book, memo, TraversalDir::Pointer).is_moved());
        assert_eq!(reg.current_split(&tb.book), None);

        reg.set_cell(&mut tb.book, CellName::Memo, "bread").unwrap();
        assert!(reg.traverse(&mut tb.book, TraversalDir::Right).is_moved());

        assert_eq!(reg.table().current_cell_name(), Some(CellName::Debit));
        assert_eq!(reg.table().cell_value(CellName::Transfer), "Expenses:Groceries");
        assert_eq!(reg.table().cell_value(CellName::Debit), "20.00");
        assert!(reg.table().cell_changed(CellName::Transfer));
    }

    #[test]
    fn test_unknown_transfer_account() {
        let mut tb = create_test_book();
        let (mut reg, script) = create_test_register(&mut tb.book, RegisterType::Account(tb.checking), RegisterStyle::Ledger);

        let xfer = blank_lead(&reg, &tb.book, CellName::Transfer);
        reg.traverse_to(&mut tb.book, xfer, TraversalDir::Pointer);
        reg.set_cell(&mut tb.book, CellName::Transfer, "Expenses:Travel").unwrap();

        match reg.traverse(&mut tb.book, TraversalDir::Right) {
            TraverseOutcome::Refused { location, reason } => {
                assert_eq!(reason, RefusalReason::Invalid(LedgerError::AccountNotFound("Expenses:Travel".to_string())));
                assert_eq!(location, reg.current_location());
            }
            other => panic!("expected a refusal, got {:?}", other),
        }
        assert!(tb.book.find_account("Expenses:Travel", ':').is_none());

        script.create_account(true);
        assert!(reg.traverse(&mut tb.book, TraversalDir::Right).is_moved());
        assert!(tb.book.find_account("Expenses:Travel", ':').is_some());
        assert_eq!(reg.quickfill_completion(CellName::Transfer, "Expenses:Tr").as_deref(), Some("Expenses:Travel"));
    }

    #[test]
    fn test_cancel_takes_back_created_account() {
        let mut tb = create_test_book();
        let t = create_test_transaction(&mut tb.book, 1, "Food", tb.checking, tb.groceries, "10.00");
        let (mut reg, script) = create_test_register(&mut tb.book, RegisterType::Account(tb.checking), RegisterStyle::Journal);
        script.create_account(true).commit(CommitChoice::Cancel);
        let accounts_before = tb.book.accounts().count();

        let sb = tb.book.account_splits(tb.groceries)[0];
        let xfer = cell_loc(&reg, &tb.book, t, Some(sb), CursorClass::Split, CellName::Transfer);
        reg.traverse_to(&mut tb.book, xfer, TraversalDir::Pointer);
        reg.set_cell(&mut tb.book, CellName::Transfer, "Travel:Rail").unwrap();

        let target = blank_lead(&reg, &tb.book, CellName::Description);
        assert_eq!(reg.traverse_to(&mut tb.book, target, TraversalDir::Pointer), TraverseOutcome::Cancelled);

        assert_eq!(tb.book.accounts().count(), accounts_before);
        assert!(tb.book.find_account("Travel", ':').is_none());
        assert_eq!(reg.quickfill_completion(CellName::Transfer, "Trav"), None);
        assert_eq!(reg.table().cell_value(CellName::Transfer), "Travel:Rail");
        assert_eq!(reg.current_split(&tb.book), Some(sb));

        // discarding the edit takes the account back too
        script.create_account(true).commit(CommitChoice::Discard);
        assert!(reg.traverse_to(&mut tb.book, target, TraversalDir::Pointer).is_moved());
        assert_eq!(tb.book.accounts().count(), accounts_before);
        assert_eq!(tb.book.split(sb).unwrap().account(), Some(tb.groceries));
        println!("✅ Cancelled moves leave the account tree untouched");
    }

    #[test]
    fn test_balance_choices_per_register_type() {
        let cases = [
            ("account", true),
            ("tree", false),
            ("journal", false),
        ];

        for (kind, single) in cases {
            let mut tb = create_test_book();
            let t = create_test_transaction(&mut tb.book, 1, "Food", tb.checking, tb.groceries, "10.00");
            let assets = tb.book.find_account("Assets", ':').unwrap();
            let reg_type = match kind {
                "account" => RegisterType::Account(tb.checking),
                "tree" => RegisterType::AccountTree(assets),
                _ => RegisterType::GeneralJournal,
            };
            let (mut reg, script) = create_test_register(&mut tb.book, reg_type, RegisterStyle::Journal);
            script.commit(CommitChoice::Commit).balance(BalanceChoice::AutoAdjust);

            let sb = tb.book.account_splits(tb.groceries)[0];
            let loc = cell_loc(&reg, &tb.book, t, Some(sb), CursorClass::Split, CellName::Debit);
            assert!(reg.traverse_to(&mut tb.book, loc, TraversalDir::Pointer).is_moved());
            reg.set_cell(&mut tb.book, CellName::Debit, "9.99").unwrap();

            let target = blank_lead(&reg, &tb.book, CellName::Description);
            assert!(reg.traverse_to(&mut tb.book, target, TraversalDir::Pointer).is_moved());

            let prompts = script.balance_prompts();
            assert_eq!(prompts.len(), 1, "{} register", kind);
            let expected = if single {
                vec![BalanceChoice::Manual, BalanceChoice::AutoAdjust, BalanceChoice::AdjustCurrent, BalanceChoice::AdjustOther]
            } else {
                vec![BalanceChoice::Manual, BalanceChoice::AutoAdjust]
            };
            assert_eq!(prompts[0].choices, expected, "{} register", kind);
            assert!(tb.book.imbalance(t).is_zero());
        }
    }

    /// A port answer that was never offered is treated as Manual
    #[test]
    fn test_adjust_other_not_offered_in_general_journal() {
        let mut tb = create_test_book();
        let t = create_test_transaction(&mut tb.book, 1, "Food", tb.checking, tb.groceries, "10.00");
        let (mut reg, script) = create_test_register(&mut tb.book, RegisterType::GeneralJournal, RegisterStyle::Journal);
        script.commit(CommitChoice::Commit).balance(BalanceChoice::AdjustOther);

        let sb = tb.book.account_splits(tb.groceries)[0];
        let loc = cell_loc(&reg, &tb.book, t, Some(sb), CursorClass::Split, CellName::Debit);
        reg.traverse_to(&mut tb.book, loc, TraversalDir::Pointer);
        reg.set_cell(&mut tb.book, CellName::Debit, "9.99").unwrap();

        let target = blank_lead(&reg, &tb.book, CellName::Description);
        let outcome = reg.traverse_to(&mut tb.book, target, TraversalDir::Pointer);
        assert!(matches!(outcome, TraverseOutcome::Refused { reason: RefusalReason::Unbalanced { .. }, .. }));
        assert_eq!(tb.book.split(sb).unwrap().value, dec("9.99"));
        assert_eq!(script.balance_prompts()[0].choices, vec![BalanceChoice::Manual, BalanceChoice::AutoAdjust]);
    }

    #[test]
    fn test_placeholder_transfer_is_refused() {
        let mut tb = create_test_book();
        let expenses = tb.book.find_account("Expenses", ':').unwrap();
        tb.book.account_mut(expenses).unwrap().placeholder = true;
        let (mut reg, _) = create_test_register(&mut tb.book, RegisterType::Account(tb.checking), RegisterStyle::Ledger);

        let xfer = blank_lead(&reg, &tb.book, CellName::Transfer);
        reg.traverse_to(&mut tb.book, xfer, TraversalDir::Pointer);
        reg.set_cell(&mut tb.book, CellName::Transfer, "Expenses").unwrap();

        let outcome = reg.traverse(&mut tb.book, TraversalDir::Right);
        assert_eq!(
            outcome,
            TraverseOutcome::Refused {
                location: xfer,
                reason: RefusalReason::Invalid(LedgerError::PlaceholderAccount("Expenses".to_string())),
            }
        );
        assert_eq!(reg.table().cell_value(CellName::Transfer), "");
    }

    #[test]
    fn test_emptied_split_removed_on_leave() {
        let mut tb = create_test_book();
        let t = create_test_transaction(&mut tb.book, 1, "Food", tb.checking, tb.groceries, "20.00");
        tb.book.begin_edit(t).unwrap();
        let extra = tb.book.create_split(t).unwrap();
        tb.book.set_split_account(extra, Some(tb.coffee)).unwrap();
        tb.book.commit_edit(t).unwrap();

        let (mut reg, script) = create_test_register(&mut tb.book, RegisterType::Account(tb.checking), RegisterStyle::Journal);
        let anchor = tb.book.account_splits(tb.checking)[0];

        let loc = cell_loc(&reg, &tb.book, t, Some(extra), CursorClass::Split, CellName::Transfer);
        reg.traverse_to(&mut tb.book, loc, TraversalDir::Pointer);
        reg.set_cell(&mut tb.book, CellName::Transfer, "").unwrap();

        let lead = cell_loc(&reg, &tb.book, t, Some(anchor), CursorClass::Trans, CellName::Description);
        assert!(reg.traverse_to(&mut tb.book, lead, TraversalDir::Pointer).is_moved());

        assert!(tb.book.split(extra).is_none());
        assert_eq!(tb.book.transaction(t).unwrap().splits().len(), 2);
        assert_eq!(reg.pending_trans(&tb.book), Some(t));
        assert_eq!(script.commit_prompts(), 0);
    }

    #[test]
    fn test_auto_ledger_expands_current_transaction() {
        let mut tb = create_test_book();
        let t = create_test_transaction(&mut tb.book, 1, "Food", tb.checking, tb.groceries, "20.00");
        let (mut reg, _) = create_test_register(&mut tb.book, RegisterType::Account(tb.checking), RegisterStyle::AutoLedger);
        let anchor = tb.book.account_splits(tb.checking)[0];

        let lead = cell_loc(&reg, &tb.book, t, Some(anchor), CursorClass::Trans, CellName::Description);
        reg.traverse_to(&mut tb.book, lead, TraversalDir::Pointer);
        assert_eq!(reg.table().vcell(lead.vcell).unwrap().cursor, CursorKind::ExpandedLead);

        let split_row = VirtualCellLocation::new(lead.vcell.row + 1, 0);
        assert!(reg.table().vcell(split_row).unwrap().visible);

        let target = blank_lead(&reg, &tb.book, CellName::Description);
        reg.traverse_to(&mut tb.book, target, TraversalDir::Pointer);
        assert_eq!(reg.table().vcell(lead.vcell).unwrap().cursor, CursorKind::Lead);
        assert!(!reg.table().vcell(split_row).unwrap().visible);
    }
}
