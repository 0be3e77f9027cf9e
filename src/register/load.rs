// 📥 Register Loader - split list to table rows
//
// One lead row per transaction followed by its split rows and a blank
// split row. The blank transaction always comes last. The cursor is put
// back on the same split, transaction split or transaction it was on.

use chrono::Local;
use log::{debug, warn};
use rust_decimal::Decimal;
use std::collections::HashSet;

use super::{RegisterStyle, SplitRegister, SPLIT_TRANS_STR};
use crate::entities::{Book, SplitId, TransId};
use crate::table::{CellName, CursorClass, CursorKind, VirtualCellLocation, VirtualLocation};

/// Where rows of the cursor's old entities ended up
#[derive(Debug, Default)]
struct FoundRows {
    split: Option<i32>,
    trans_split: Option<i32>,
    trans: Option<i32>,
}

struct Find {
    trans: Option<TransId>,
    split: Option<SplitId>,
    trans_split: Option<SplitId>,
    class: CursorClass,
}

impl SplitRegister {
    /// Lay `slist` out in the table. While a transaction is pending the
    /// split list of the previous load is used instead, so the edited
    /// transaction cannot drop out of view.
    pub fn load(&mut self, book: &mut Book, slist: Vec<SplitId>) {
        let Some(blank_split) = self.ensure_blank_split(book) else {
            warn!("Register has no blank split; load skipped");
            return;
        };
        let blank_trans = book.split_trans(blank_split);
        let pending = self.pending_trans(book);

        let multi_line = self.config.style == RegisterStyle::Journal;
        let dynamic = self.config.style == RegisterStyle::AutoLedger;
        let lead_cursor = self.passive_cursor();

        let find = if self.info.traverse_to_new {
            Find {
                trans: blank_trans,
                split: None,
                trans_split: Some(blank_split),
                class: self.info.hint.class,
            }
        } else {
            Find {
                trans: self.info.hint.trans,
                split: self.info.hint.split,
                trans_split: self.info.hint.trans_split,
                class: self.info.hint.class,
            }
        };

        let mut save_loc = self.table.current_location();

        let cursor_buffer = if self.table.current_cursor_changed() && find.split == self.current_split(book) {
            self.table.save_current_cursor()
        } else {
            None
        };

        self.table.move_cursor(VirtualLocation::invalid());

        let mut row = 0;
        self.table.set_vcell(VirtualCellLocation::new(row, 0), CursorKind::Header, None, true);
        row += 1;

        let today = Local::now().date_naive();
        self.table.dividing_row = None;

        let mut has_last_num = false;
        if self.info.first_pass {
            if let Some(last) = self.info.default_account.and_then(|a| book.account(a)).and_then(|a| a.last_num.clone()) {
                self.last_num = Some(last);
                has_last_num = true;
            }
            self.account_qf.rebuild(book);
        }

        let slist = if pending.is_some() {
            self.info.saved_slist.clone()
        } else {
            self.info.saved_slist = slist.clone();
            slist
        };

        let balance_accounts = self.balance_accounts(book);
        let mut running = Decimal::ZERO;
        self.info.balances.clear();

        let mut found = FoundRows::default();
        let mut found_pending = false;
        let mut found_divider = false;
        let mut seen: HashSet<TransId> = HashSet::new();

        for split in slist {
            let Some(trans) = book.split_trans(split) else {
                continue;
            };

            if pending == Some(trans) {
                found_pending = true;
            }

            if split == blank_split || Some(trans) == blank_trans {
                continue;
            }
            if !seen.insert(trans) {
                continue;
            }

            let Some(body) = book.transaction(trans) else {
                continue;
            };

            if self.config.show_present_divider && !found_divider && body.date_posted > today {
                self.table.dividing_row = Some(row);
                found_divider = true;
            }

            if self.info.first_pass {
                let description = body.description.clone();
                let notes = body.notes.clone();
                let num = body.num.clone();
                self.add_quickfill(CellName::Description, &description);
                self.add_quickfill(CellName::Notes, &notes);
                if !has_last_num && !num.is_empty() {
                    self.last_num = Some(num);
                }
                let memos: Vec<String> = body
                    .splits()
                    .iter()
                    .filter_map(|s| book.split(*s))
                    .map(|s| s.memo.clone())
                    .collect();
                for memo in memos {
                    self.add_quickfill(CellName::Memo, &memo);
                }
            }

            if !balance_accounts.is_empty() {
                running += Self::amount_in(book, trans, &balance_accounts);
                self.info.balances.insert(split, running);
            }

            if Some(trans) == find.trans {
                found.trans = Some(row);
            }
            if Some(split) == find.trans_split {
                found.trans_split = Some(row);
            }

            self.add_transaction(book, trans, split, lead_cursor, multi_line, true, &find, &mut found, &mut row);
        }

        // the blank transaction
        if pending == blank_trans && blank_trans.is_some() {
            found_pending = true;
        }
        if let Some(trans) = blank_trans {
            if Some(trans) == find.trans {
                found.trans = Some(row);
            }
            if Some(blank_split) == find.trans_split {
                found.trans_split = Some(row);
            }

            if self.info.first_pass {
                found = FoundRows::default();
                save_loc = VirtualLocation::at_row(row);
            }

            let add_blank = self.info.blank_split_edited;
            self.add_transaction(book, trans, blank_split, lead_cursor, multi_line, add_blank, &find, &mut found, &mut row);
        }

        self.table.set_size(row as usize, 1);

        // restore the cursor
        if let Some(r) = found.split.or(found.trans_split).or(found.trans) {
            save_loc.vcell.row = r;
        }

        if let Some((_, lead)) = self.get_trans_split(save_loc.vcell) {
            if dynamic || multi_line || self.info.trans_expanded {
                let active = self.active_cursor();
                self.table.set_vcell_cursor(lead, active);
                self.set_trans_visible(lead, true, multi_line);
                self.info.trans_expanded = self.config.style == RegisterStyle::Ledger && self.info.trans_expanded;
            } else {
                save_loc.vcell = lead;
                self.info.trans_expanded = false;
            }
        }

        if let Some(loc) = self.table.find_close_valid_cell(save_loc, false) {
            self.table.move_cursor_gui(loc);
            self.load_cursor_values(book);

            if let Some(buffer) = cursor_buffer.as_ref() {
                if find.split == self.current_split(book) {
                    self.table.restore_current_cursor(buffer);
                }
            }
        }

        // the pending transaction was moved out of this register
        if !found_pending {
            if let Some(trans) = pending {
                warn!("Pending transaction left the register; committing it");
                if let Err(e) = self.commit_pending(book, trans) {
                    warn!("Could not commit pending transaction: {}; rolling back", e);
                    self.rollback_pending(book, trans);
                }
            }
            self.info.pending_trans = None;
        }

        let (trans_split, _) = self.current_trans_split(book).unzip();
        self.info.hint.trans = self.current_trans(book);
        self.info.hint.split = self.current_split(book);
        self.info.hint.trans_split = trans_split.flatten();
        self.info.hint.class = self.current_cursor_class();
        self.info.hint_set_by_traverse = false;
        self.info.traverse_to_new = false;
        self.info.exact_traversal = false;
        self.info.first_pass = false;
        self.info.reg_loaded = true;

        self.update_help_text();
        debug!("Loaded {} register rows", row);
    }

    /// The blank split, created along with its transaction when missing
    fn ensure_blank_split(&mut self, book: &mut Book) -> Option<SplitId> {
        if let Some(split) = self.blank_split(book) {
            return Some(split);
        }

        let currency = self
            .info
            .default_account
            .and_then(|a| book.account(a))
            .map(|a| a.commodity.clone())
            .unwrap_or_else(|| book.default_currency().clone());

        let trans = book.new_transaction(currency, self.info.last_date_entered);
        let split = match book.create_split(trans) {
            Ok(split) => split,
            Err(e) => {
                warn!("Could not create blank split: {}", e);
                book.rollback_edit(trans);
                return None;
            }
        };
        if let Err(e) = book.commit_edit(trans) {
            warn!("Blank transaction did not commit: {}", e);
        }

        self.info.blank_split = Some(split);
        self.info.blank_split_edited = false;
        debug!("Created blank transaction");
        Some(split)
    }

    #[allow(clippy::too_many_arguments)]
    fn add_transaction(
        &mut self,
        book: &Book,
        trans: TransId,
        split: SplitId,
        lead_cursor: CursorKind,
        visible_splits: bool,
        add_blank: bool,
        find: &Find,
        found: &mut FoundRows,
        row: &mut i32,
    ) {
        if Some(split) == find.split {
            found.split = Some(*row);
        }

        self.table.set_vcell(VirtualCellLocation::new(*row, 0), lead_cursor, Some(split), true);
        *row += 1;

        let secondaries = book.transaction(trans).map(|t| t.splits().to_vec()).unwrap_or_default();
        for secondary in secondaries {
            if Some(secondary) == find.split && find.class == CursorClass::Split {
                found.split = Some(*row);
            }
            self.table.set_vcell(VirtualCellLocation::new(*row, 0), CursorKind::Split, Some(secondary), visible_splits);
            *row += 1;
        }

        if !add_blank {
            return;
        }

        if find.trans == Some(trans) && find.split.is_none() && find.class == CursorClass::Split {
            found.split = Some(*row);
        }
        self.table.set_vcell(VirtualCellLocation::new(*row, 0), CursorKind::Split, None, false);
        *row += 1;
    }

    fn amount_in(book: &Book, trans: TransId, accounts: &[crate::entities::AccountId]) -> Decimal {
        book.transaction(trans)
            .map(|t| {
                t.splits()
                    .iter()
                    .filter_map(|s| book.split(*s))
                    .filter(|s| s.account().map(|a| accounts.contains(&a)).unwrap_or(false))
                    .map(|s| s.amount)
                    .sum()
            })
            .unwrap_or(Decimal::ZERO)
    }

    // ========================================================================
    // CELL VALUES FROM THE MODEL
    // ========================================================================

    /// Fill the current cursor's cells from the entities
    pub(crate) fn load_cursor_values(&mut self, book: &Book) {
        let loc = self.table.current_location().vcell;
        let names: Vec<CellName> = match self.table.block_at(loc) {
            Some(block) => block.cell_names().collect(),
            None => return,
        };

        for name in names {
            let text = self.entry_text(book, loc, name);
            self.table.load_cell_value(name, text);
        }
    }

    /// Model text of a cell in any row
    pub(crate) fn entry_text(&self, book: &Book, loc: VirtualCellLocation, name: CellName) -> String {
        let Some(vcell) = self.table.vcell(loc) else {
            return String::new();
        };
        if vcell.cursor == CursorKind::Header {
            return name.label().to_string();
        }

        let Some(trans_id) = self.get_trans(book, loc) else {
            return String::new();
        };
        let Some(trans) = book.transaction(trans_id) else {
            return String::new();
        };
        let scale = trans.currency.scale;
        let split = self.get_split(book, loc).and_then(|s| book.split(s).map(|b| (s, b)));

        match (vcell.cursor, name) {
            (CursorKind::Lead | CursorKind::ExpandedLead, CellName::Date) => {
                trans.date_posted.format(&self.config.date_format).to_string()
            }
            (CursorKind::Lead | CursorKind::ExpandedLead, CellName::Num) => trans.num.clone(),
            (CursorKind::Lead | CursorKind::ExpandedLead, CellName::Description) => trans.description.clone(),
            (CursorKind::Lead | CursorKind::ExpandedLead, CellName::Notes) => trans.notes.clone(),
            (CursorKind::Lead | CursorKind::ExpandedLead, CellName::Balance) => split
                .and_then(|(s, _)| self.info.balances.get(&s))
                .map(|b| format_amount(*b, scale))
                .unwrap_or_default(),

            (CursorKind::Lead, CellName::Transfer) => match split {
                Some((s, _)) => self.transfer_text(book, trans_id, s),
                None => String::new(),
            },
            (CursorKind::Lead, CellName::Reconcile) => {
                split.map(|(_, b)| b.reconcile.as_char().to_string()).unwrap_or_default()
            }
            (CursorKind::Lead, CellName::Debit) => split.map(|(_, b)| debit_text(b.value, scale)).unwrap_or_default(),
            (CursorKind::Lead, CellName::Credit) => split.map(|(_, b)| credit_text(b.value, scale)).unwrap_or_default(),

            (CursorKind::ExpandedLead, CellName::Debit | CellName::Credit) => {
                let values = trans.splits().iter().filter_map(|s| book.split(*s)).map(|s| s.value);
                let total: Decimal = if name == CellName::Debit {
                    values.filter(|v| v.is_sign_positive()).sum()
                } else {
                    -values.filter(|v| v.is_sign_negative()).sum::<Decimal>()
                };
                if total.is_zero() {
                    String::new()
                } else {
                    format_amount(total, scale)
                }
            }

            (CursorKind::Split, _) => {
                let Some((_, body)) = split else {
                    return String::new();
                };
                match name {
                    CellName::Action => body.action.clone(),
                    CellName::Memo => body.memo.clone(),
                    CellName::Transfer => body
                        .account()
                        .map(|a| book.full_name(a, self.config.account_separator))
                        .unwrap_or_default(),
                    CellName::Reconcile => body.reconcile.as_char().to_string(),
                    CellName::Debit => debit_text(body.value, scale),
                    CellName::Credit => credit_text(body.value, scale),
                    _ => String::new(),
                }
            }

            _ => String::new(),
        }
    }

    /// The other side of a lead row's split
    fn transfer_text(&self, book: &Book, trans: TransId, split: SplitId) -> String {
        let count = book.transaction(trans).map(|t| t.splits().len()).unwrap_or(0);
        if count > 2 {
            return SPLIT_TRANS_STR.to_string();
        }
        book.other_split(split)
            .and_then(|o| book.split(o))
            .and_then(|o| o.account())
            .map(|a| book.full_name(a, self.config.account_separator))
            .unwrap_or_default()
    }
}

pub(crate) fn format_amount(value: Decimal, scale: u32) -> String {
    let mut rounded = value.round_dp(scale);
    rounded.rescale(scale);
    rounded.to_string()
}

pub(crate) fn debit_text(value: Decimal, scale: u32) -> String {
    if value > Decimal::ZERO {
        format_amount(value, scale)
    } else {
        String::new()
    }
}

pub(crate) fn credit_text(value: Decimal, scale: u32) -> String {
    if value < Decimal::ZERO {
        format_amount(-value, scale)
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::{RegisterType, TraverseOutcome};
    use super::*;
    use crate::entities::Commodity;

    #[test]
    fn test_rows_for_ledger_style() {
        let mut tb = create_test_book();
        create_test_transaction(&mut tb.book, 1, "Food", tb.checking, tb.groceries, "20.00");
        create_test_transaction(&mut tb.book, 2, "Latte", tb.checking, tb.coffee, "4.50");

        let (reg, _) = create_test_register(&mut tb.book, RegisterType::Account(tb.checking), RegisterStyle::Ledger);

        // header + 2 x (lead + 2 splits + blank row) + blank trans (lead + 1 split)
        assert_eq!(reg.table().num_virt_rows(), 1 + 2 * 4 + 2);

        let visible: Vec<_> = reg.table().visible_rows();
        assert_eq!(visible.len(), 4);

        // cursor starts on the blank transaction
        assert_eq!(reg.current_trans(&tb.book), reg.blank_trans(&tb.book));
        assert_eq!(reg.current_cursor_class(), CursorClass::Trans);
        assert_eq!(reg.table().cell_value(CellName::Date), Local::now().date_naive().format("%Y-%m-%d").to_string());
    }

    #[test]
    fn test_journal_shows_splits() {
        let mut tb = create_test_book();
        create_test_transaction(&mut tb.book, 1, "Food", tb.checking, tb.groceries, "20.00");

        let (reg, _) = create_test_register(&mut tb.book, RegisterType::Account(tb.checking), RegisterStyle::Journal);

        // header, lead, 2 splits, blank trans lead + its split
        assert_eq!(reg.table().visible_rows().len(), 6);
        let lead = VirtualCellLocation::new(1, 0);
        assert_eq!(reg.table().vcell(lead).unwrap().cursor, CursorKind::ExpandedLead);
    }

    #[test]
    fn test_lead_row_text() {
        let mut tb = create_test_book();
        let t = create_test_transaction(&mut tb.book, 1, "Food", tb.checking, tb.groceries, "20.00");
        create_test_transaction(&mut tb.book, 2, "Latte", tb.checking, tb.coffee, "4.50");

        let (reg, _) = create_test_register(&mut tb.book, RegisterType::Account(tb.checking), RegisterStyle::Ledger);
        let anchor = tb.book.account_splits(tb.checking)[0];
        assert_eq!(tb.book.split_trans(anchor), Some(t));

        let lead = VirtualCellLocation::new(1, 0);
        assert_eq!(reg.entry_text(&tb.book, lead, CellName::Description), "Food");
        assert_eq!(reg.entry_text(&tb.book, lead, CellName::Transfer), "Expenses:Groceries");
        assert_eq!(reg.entry_text(&tb.book, lead, CellName::Debit), "");
        assert_eq!(reg.entry_text(&tb.book, lead, CellName::Credit), "20.00");
        assert_eq!(reg.entry_text(&tb.book, lead, CellName::Balance), "-20.00");

        let second = VirtualCellLocation::new(5, 0);
        assert_eq!(reg.entry_text(&tb.book, second, CellName::Balance), "-24.50");

        let row = reg.display_row(&tb.book, VirtualCellLocation::new(0, 0), 0);
        assert_eq!(row[0], "Date");
        assert_eq!(row.len(), 8);
    }

    #[test]
    fn test_multi_split_transfer_text() {
        let mut tb = create_test_book();
        let t = tb.book.new_transaction(Commodity::usd(), date(2024, 3, 1));
        let parts = [(tb.checking, "-30.00"), (tb.groceries, "20.00"), (tb.coffee, "10.00")];
        for (account, value) in parts {
            let s = tb.book.create_split(t).unwrap();
            tb.book.set_split_account(s, Some(account)).unwrap();
            tb.book.split_mut(s).unwrap().set_value(dec(value));
        }
        tb.book.commit_edit(t).unwrap();

        let (reg, _) = create_test_register(&mut tb.book, RegisterType::Account(tb.checking), RegisterStyle::Ledger);
        let lead = VirtualCellLocation::new(1, 0);
        assert_eq!(reg.entry_text(&tb.book, lead, CellName::Transfer), SPLIT_TRANS_STR);
    }

    #[test]
    fn test_present_divider() {
        let mut tb = create_test_book();
        create_test_transaction(&mut tb.book, 1, "Past", tb.checking, tb.groceries, "1.00");

        let future = Local::now().date_naive() + chrono::Duration::days(30);
        let t = tb.book.new_transaction(Commodity::usd(), future);
        let a = tb.book.create_split(t).unwrap();
        tb.book.set_split_account(a, Some(tb.checking)).unwrap();
        let b = tb.book.create_split(t).unwrap();
        tb.book.set_split_account(b, Some(tb.groceries)).unwrap();
        tb.book.commit_edit(t).unwrap();

        let (reg, _) = create_test_register(&mut tb.book, RegisterType::Account(tb.checking), RegisterStyle::Ledger);
        assert_eq!(reg.table().dividing_row, Some(5));
    }

    #[test]
    fn test_cursor_survives_reload() {
        let mut tb = create_test_book();
        create_test_transaction(&mut tb.book, 10, "Food", tb.checking, tb.groceries, "20.00");
        let latte = create_test_transaction(&mut tb.book, 12, "Latte", tb.checking, tb.coffee, "4.50");

        let (mut reg, _) = create_test_register(&mut tb.book, RegisterType::Account(tb.checking), RegisterStyle::Ledger);
        let target = cell_loc(&reg, &tb.book, latte, tb.book.account_splits(tb.checking).get(1).copied(), CursorClass::Trans, CellName::Description);
        assert!(matches!(
            reg.traverse_to(&mut tb.book, target, crate::table::TraversalDir::Pointer),
            TraverseOutcome::Moved(_)
        ));
        let bound = reg.current_split(&tb.book);
        let row_before = reg.current_location().vcell.row;

        // an earlier transaction arrives from elsewhere
        create_test_transaction(&mut tb.book, 1, "Rent", tb.checking, tb.groceries, "500.00");
        reg.refresh(&mut tb.book);

        assert_eq!(reg.current_split(&tb.book), bound);
        assert_eq!(reg.current_trans(&tb.book), Some(latte));
        assert_eq!(reg.current_location().vcell.row, row_before + 4);
    }

    #[test]
    fn test_first_pass_fills_quickfills() {
        let mut tb = create_test_book();
        let t = create_test_transaction(&mut tb.book, 1, "Corner Cafe", tb.checking, tb.coffee, "3.00");
        tb.book.begin_edit(t).unwrap();
        tb.book.trans_mut(t).unwrap().num = "1001".to_string();
        let s = tb.book.transaction(t).unwrap().splits()[1];
        tb.book.split_mut(s).unwrap().memo = "flat white".to_string();
        tb.book.commit_edit(t).unwrap();

        let (reg, _) = create_test_register(&mut tb.book, RegisterType::Account(tb.checking), RegisterStyle::Ledger);

        assert_eq!(reg.quickfill_completion(CellName::Description, "cor").as_deref(), Some("Corner Cafe"));
        assert_eq!(reg.quickfill_completion(CellName::Memo, "FLAT").as_deref(), Some("flat white"));
        assert_eq!(reg.quickfill_completion(CellName::Transfer, "Expenses:C").as_deref(), Some("Expenses:Coffee"));
        assert_eq!(reg.last_num(), Some("1001"));
        assert_eq!(reg.next_num(), "1002");
        println!("✅ First load populated description, memo and account completions");
    }
}
