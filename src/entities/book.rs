// 📚 Book - the entity store
//
// Owns every account, transaction and split in arenas. Transactions change
// only inside begin_edit / commit_edit; rollback_edit restores the state
// captured at begin_edit. commit_edit is the single hard balance gate.

use chrono::NaiveDate;
use log::{debug, info};
use rust_decimal::Decimal;
use slotmap::SlotMap;
use std::cmp::Ordering;
use std::collections::HashMap;
use uuid::Uuid;

use super::account::{Account, Commodity};
use super::ids::{AccountId, SplitId, TransId};
use super::split::{ReconcileState, Split};
use super::transaction::Transaction;
use crate::error::{ImbalanceError, LedgerError, LedgerResult};

// ============================================================================
// EDIT SNAPSHOT
// ============================================================================

/// State captured at begin_edit
#[derive(Debug, Clone)]
struct EditSnapshot {
    /// None when the transaction was created inside this edit
    trans: Option<Transaction>,
    splits: Vec<(SplitId, Split)>,
    created: Vec<SplitId>,
    destroyed: bool,
}

// ============================================================================
// BOOK
// ============================================================================

#[derive(Debug)]
pub struct Book {
    pub guid: Uuid,
    accounts: SlotMap<AccountId, Account>,
    transactions: SlotMap<TransId, Transaction>,
    splits: SlotMap<SplitId, Split>,
    root: AccountId,
    default_currency: Commodity,
    edits: HashMap<TransId, EditSnapshot>,
}

impl Book {
    pub fn new(default_currency: Commodity) -> Self {
        let mut accounts = SlotMap::with_key();
        let mut root_account = Account::new("", default_currency.clone(), None);
        root_account.placeholder = true;
        let root = accounts.insert(root_account);

        Book {
            guid: Uuid::new_v4(),
            accounts,
            transactions: SlotMap::with_key(),
            splits: SlotMap::with_key(),
            root,
            default_currency,
            edits: HashMap::new(),
        }
    }

    pub fn root(&self) -> AccountId {
        self.root
    }

    pub fn default_currency(&self) -> &Commodity {
        &self.default_currency
    }

    // ========================================================================
    // ACCOUNTS
    // ========================================================================

    pub fn add_account(&mut self, parent: AccountId, name: &str, commodity: Commodity) -> LedgerResult<AccountId> {
        if !self.accounts.contains_key(parent) {
            return Err(LedgerError::UnknownAccount(parent));
        }

        let id = self.accounts.insert(Account::new(name, commodity, Some(parent)));
        if let Some(p) = self.accounts.get_mut(parent) {
            p.children.push(id);
        }

        debug!("Created account '{}'", name);
        Ok(id)
    }

    pub fn account(&self, id: AccountId) -> Option<&Account> {
        self.accounts.get(id)
    }

    pub fn account_mut(&mut self, id: AccountId) -> Option<&mut Account> {
        self.accounts.get_mut(id)
    }

    /// Every account except the root
    pub fn accounts(&self) -> impl Iterator<Item = (AccountId, &Account)> + '_ {
        let root = self.root;
        self.accounts.iter().filter(move |(id, _)| *id != root)
    }

    pub fn full_name(&self, id: AccountId, separator: char) -> String {
        let mut parts = Vec::new();
        let mut current = Some(id);

        while let Some(acc_id) = current {
            if acc_id == self.root {
                break;
            }
            match self.accounts.get(acc_id) {
                Some(acc) => {
                    parts.push(acc.name.as_str());
                    current = acc.parent;
                }
                None => break,
            }
        }

        parts.reverse();
        parts.join(&separator.to_string())
    }

    pub fn find_account(&self, full_name: &str, separator: char) -> Option<AccountId> {
        if full_name.is_empty() {
            return None;
        }

        let mut current = self.root;
        for part in full_name.split(separator) {
            current = self.find_child(current, part)?;
        }

        Some(current)
    }

    /// Resolve a full account path, creating any missing component
    pub fn find_or_create_account(&mut self, full_name: &str, separator: char, commodity: &Commodity) -> LedgerResult<AccountId> {
        if full_name.is_empty() {
            return Err(LedgerError::AccountNotFound(String::new()));
        }

        let mut current = self.root;
        for part in full_name.split(separator) {
            current = match self.find_child(current, part) {
                Some(child) => child,
                None => self.add_account(current, part, commodity.clone())?,
            };
        }

        Ok(current)
    }

    /// Remove an account that has no children and holds no splits
    pub fn remove_account(&mut self, id: AccountId) -> LedgerResult<()> {
        if id == self.root {
            return Err(LedgerError::AccountInUse(String::new()));
        }
        let account = self.accounts.get(id).ok_or(LedgerError::UnknownAccount(id))?;
        let holds_splits = account.splits.iter().any(|s| self.splits.contains_key(*s));
        if !account.children.is_empty() || holds_splits {
            return Err(LedgerError::AccountInUse(account.name.clone()));
        }

        let parent = account.parent;
        self.accounts.remove(id);
        if let Some(p) = parent.and_then(|p| self.accounts.get_mut(p)) {
            p.children.retain(|c| *c != id);
        }

        debug!("Removed account {:?}", id);
        Ok(())
    }

    /// The account and all of its descendants
    pub fn descendants(&self, id: AccountId) -> Vec<AccountId> {
        let mut out = Vec::new();
        let mut stack = vec![id];

        while let Some(acc_id) = stack.pop() {
            if let Some(acc) = self.accounts.get(acc_id) {
                out.push(acc_id);
                stack.extend(acc.children.iter().rev());
            }
        }

        out
    }

    fn find_child(&self, parent: AccountId, name: &str) -> Option<AccountId> {
        self.accounts.get(parent)?
            .children
            .iter()
            .copied()
            .find(|c| self.accounts.get(*c).map(|a| a.name == name).unwrap_or(false))
    }

    // ========================================================================
    // TRANSACTIONS
    // ========================================================================

    /// New transaction, already open for edit
    pub fn new_transaction(&mut self, currency: Commodity, date_posted: NaiveDate) -> TransId {
        let id = self.transactions.insert(Transaction::new(currency, date_posted));
        self.edits.insert(id, EditSnapshot {
            trans: None,
            splits: Vec::new(),
            created: Vec::new(),
            destroyed: false,
        });
        id
    }

    pub fn transaction(&self, id: TransId) -> Option<&Transaction> {
        self.transactions.get(id)
    }

    pub fn transactions(&self) -> impl Iterator<Item = (TransId, &Transaction)> + '_ {
        self.transactions.iter()
    }

    pub fn trans_mut(&mut self, id: TransId) -> LedgerResult<&mut Transaction> {
        if !self.edits.contains_key(&id) {
            return Err(LedgerError::TransactionNotOpen(id));
        }
        self.transactions.get_mut(id).ok_or(LedgerError::UnknownTransaction(id))
    }

    pub fn is_open(&self, id: TransId) -> bool {
        self.edits.contains_key(&id)
    }

    /// Open a transaction for edit. Calling it again on an open transaction is a no-op.
    pub fn begin_edit(&mut self, id: TransId) -> LedgerResult<()> {
        if self.edits.contains_key(&id) {
            return Ok(());
        }

        let trans = self.transactions.get(id).ok_or(LedgerError::UnknownTransaction(id))?;
        let splits = trans
            .splits
            .iter()
            .filter_map(|s| self.splits.get(*s).map(|body| (*s, body.clone())))
            .collect();

        self.edits.insert(id, EditSnapshot {
            trans: Some(trans.clone()),
            splits,
            created: Vec::new(),
            destroyed: false,
        });

        Ok(())
    }

    /// Close the edit. Fails, leaving the transaction open, when it does not balance.
    pub fn commit_edit(&mut self, id: TransId) -> Result<(), ImbalanceError> {
        let Some(snapshot) = self.edits.get(&id) else {
            return Ok(());
        };

        let empty = self.transactions.get(id).map(|t| t.splits.is_empty()).unwrap_or(true);
        if snapshot.destroyed || empty {
            let snapshot = self.edits.remove(&id);
            self.remove_transaction(id, snapshot);
            info!("Destroyed transaction on commit");
            return Ok(());
        }

        let imbalance = self.imbalance(id);
        if !imbalance.is_zero() {
            let trans = self.transactions.get(id);
            return Err(ImbalanceError {
                trans: id,
                guid: trans.map(|t| t.guid).unwrap_or_else(Uuid::nil),
                imbalance,
                currency: trans.map(|t| t.currency.mnemonic.clone()).unwrap_or_default(),
            });
        }

        if let Some(snapshot) = self.edits.remove(&id) {
            let touched = snapshot.splits.iter().map(|(s, _)| *s).chain(snapshot.created.iter().copied());
            let doomed: Vec<SplitId> = touched
                .filter(|s| self.splits.get(*s).map(|b| b.destroyed).unwrap_or(false))
                .collect();
            for s in doomed {
                self.splits.remove(s);
            }
        }

        debug!("Committed transaction {:?}", id);
        Ok(())
    }

    /// Discard every change made since begin_edit
    pub fn rollback_edit(&mut self, id: TransId) {
        let Some(snapshot) = self.edits.remove(&id) else {
            return;
        };

        let original = match snapshot.trans {
            Some(original) => original,
            None => {
                // created inside this edit: it never existed
                self.remove_transaction(id, Some(snapshot));
                return;
            }
        };

        for s in &snapshot.created {
            self.detach_from_account(*s);
            self.splits.remove(*s);
        }

        for (s, body) in snapshot.splits {
            self.detach_from_account(s);
            let account = body.account;
            if let Some(slot) = self.splits.get_mut(s) {
                *slot = body;
            }
            if let Some(acc) = account {
                self.attach_to_account(s, acc);
            }
        }

        if let Some(trans) = self.transactions.get_mut(id) {
            *trans = original;
        }

        debug!("Rolled back transaction {:?}", id);
    }

    /// Remove a transaction and all of its splits
    pub fn destroy_transaction(&mut self, id: TransId) -> LedgerResult<()> {
        self.begin_edit(id)?;
        if let Some(snapshot) = self.edits.get_mut(&id) {
            snapshot.destroyed = true;
        }
        self.commit_edit(id)?;
        Ok(())
    }

    fn remove_transaction(&mut self, id: TransId, snapshot: Option<EditSnapshot>) {
        let mut doomed: Vec<SplitId> = self.transactions.get(id).map(|t| t.splits.clone()).unwrap_or_default();
        if let Some(snapshot) = snapshot {
            doomed.extend(snapshot.splits.iter().map(|(s, _)| *s));
            doomed.extend(snapshot.created);
        }
        doomed.sort();
        doomed.dedup();

        for s in doomed {
            self.detach_from_account(s);
            self.splits.remove(s);
        }
        self.transactions.remove(id);
    }

    // ========================================================================
    // SPLITS
    // ========================================================================

    pub fn create_split(&mut self, trans: TransId) -> LedgerResult<SplitId> {
        let Some(snapshot) = self.edits.get_mut(&trans) else {
            return Err(LedgerError::TransactionNotOpen(trans));
        };

        let id = self.splits.insert(Split::new(trans));
        snapshot.created.push(id);
        if let Some(t) = self.transactions.get_mut(trans) {
            t.splits.push(id);
        }

        Ok(id)
    }

    /// Live split; None once destroyed (even while the destroy is uncommitted)
    pub fn split(&self, id: SplitId) -> Option<&Split> {
        self.splits.get(id).filter(|s| !s.destroyed)
    }

    pub fn split_mut(&mut self, id: SplitId) -> LedgerResult<&mut Split> {
        let parent = self.split(id).ok_or(LedgerError::UnknownSplit(id))?.parent;
        if !self.edits.contains_key(&parent) {
            return Err(LedgerError::TransactionNotOpen(parent));
        }
        self.splits.get_mut(id).ok_or(LedgerError::UnknownSplit(id))
    }

    pub fn split_trans(&self, id: SplitId) -> Option<TransId> {
        self.split(id).map(|s| s.parent)
    }

    pub fn set_split_account(&mut self, id: SplitId, account: Option<AccountId>) -> LedgerResult<()> {
        if let Some(acc) = account {
            let target = self.accounts.get(acc).ok_or(LedgerError::UnknownAccount(acc))?;
            if target.placeholder {
                return Err(LedgerError::PlaceholderAccount(target.name.clone()));
            }
        }

        self.split_mut(id)?;
        self.detach_from_account(id);
        if let Some(split) = self.splits.get_mut(id) {
            split.account = account;
        }
        if let Some(acc) = account {
            self.attach_to_account(id, acc);
        }

        Ok(())
    }

    pub fn destroy_split(&mut self, id: SplitId) -> LedgerResult<()> {
        let parent = self.split_mut(id)?.parent;
        self.detach_from_account(id);
        if let Some(split) = self.splits.get_mut(id) {
            split.destroyed = true;
        }
        if let Some(trans) = self.transactions.get_mut(parent) {
            trans.splits.retain(|s| *s != id);
        }
        Ok(())
    }

    fn detach_from_account(&mut self, id: SplitId) {
        let account = self.splits.get(id).and_then(|s| s.account);
        if let Some(acc) = account.and_then(|a| self.accounts.get_mut(a)) {
            acc.splits.retain(|s| *s != id);
        }
    }

    fn attach_to_account(&mut self, id: SplitId, account: AccountId) {
        if let Some(acc) = self.accounts.get_mut(account) {
            if !acc.splits.contains(&id) {
                acc.splits.push(id);
            }
        }
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Sum of split values in the transaction's currency, rounded to its smallest unit
    pub fn imbalance(&self, id: TransId) -> Decimal {
        let Some(trans) = self.transactions.get(id) else {
            return Decimal::ZERO;
        };

        let sum: Decimal = trans
            .splits
            .iter()
            .filter_map(|s| self.split(*s))
            .map(|s| s.value)
            .sum();

        trans.currency.round(sum)
    }

    /// The opposite leg of a two-split transaction
    pub fn other_split(&self, id: SplitId) -> Option<SplitId> {
        let trans = self.transactions.get(self.split(id)?.parent)?;
        if trans.splits.len() != 2 {
            return None;
        }
        trans.splits.iter().copied().find(|s| *s != id)
    }

    pub fn has_reconciled_splits(&self, id: TransId) -> bool {
        self.transactions
            .get(id)
            .map(|t| {
                t.splits
                    .iter()
                    .filter_map(|s| self.split(*s))
                    .any(|s| s.reconcile.is_locked())
            })
            .unwrap_or(false)
    }

    /// Posting order: date, number, entry time, description
    pub fn compare_splits(&self, a: SplitId, b: SplitId) -> Ordering {
        let ta = self.split(a).and_then(|s| self.transactions.get(s.parent));
        let tb = self.split(b).and_then(|s| self.transactions.get(s.parent));

        match (ta, tb) {
            (Some(ta), Some(tb)) => ta
                .date_posted
                .cmp(&tb.date_posted)
                .then_with(|| ta.num_value().cmp(&tb.num_value()))
                .then_with(|| ta.date_entered.cmp(&tb.date_entered))
                .then_with(|| ta.description.cmp(&tb.description))
                .then_with(|| a.cmp(&b)),
            _ => a.cmp(&b),
        }
    }

    pub fn account_splits(&self, account: AccountId) -> Vec<SplitId> {
        self.splits_for_accounts(&[account])
    }

    pub fn splits_for_accounts(&self, accounts: &[AccountId]) -> Vec<SplitId> {
        let mut out: Vec<SplitId> = accounts
            .iter()
            .filter_map(|a| self.accounts.get(*a))
            .flat_map(|a| a.splits.iter().copied())
            .filter(|s| self.split(*s).is_some())
            .collect();
        out.sort_by(|a, b| self.compare_splits(*a, *b));
        out
    }

    /// Every live split in the book, in posting order
    pub fn all_splits(&self) -> Vec<SplitId> {
        let mut out: Vec<SplitId> = self
            .splits
            .iter()
            .filter(|(_, s)| !s.destroyed)
            .map(|(id, _)| id)
            .collect();
        out.sort_by(|a, b| self.compare_splits(*a, *b));
        out
    }

    /// Most recent transaction in the account with exactly this description
    pub fn find_trans_by_desc(&self, account: AccountId, description: &str) -> Option<TransId> {
        self.account_splits(account)
            .into_iter()
            .rev()
            .filter_map(|s| self.split_trans(s))
            .find(|t| self.transactions.get(*t).map(|tr| tr.description == description).unwrap_or(false))
    }

    /// Split with this memo in the account's most recent matching transaction
    pub fn find_split_by_memo(&self, account: AccountId, memo: &str, unit_price: bool) -> Option<SplitId> {
        self.account_splits(account)
            .into_iter()
            .rev()
            .filter_map(|s| self.split_trans(s))
            .find_map(|t| self.find_split_in_trans_by_memo(t, memo, unit_price))
    }

    pub fn find_split_in_trans_by_memo(&self, trans: TransId, memo: &str, unit_price: bool) -> Option<SplitId> {
        self.transactions.get(trans)?.splits.iter().copied().find(|s| {
            self.split(*s)
                .map(|body| body.memo == memo && (!unit_price || body.amount == body.value))
                .unwrap_or(false)
        })
    }

    /// Replace the splits and text fields of `to` with copies from `from`.
    /// `to` must be open; its posting date is kept.
    pub fn copy_trans_onto(&mut self, from: TransId, to: TransId) -> LedgerResult<()> {
        let source = self.transactions.get(from).ok_or(LedgerError::UnknownTransaction(from))?.clone();
        let existing = self.trans_mut(to)?.splits.clone();

        for s in existing {
            self.destroy_split(s)?;
        }

        {
            let target = self.trans_mut(to)?;
            target.description = source.description.clone();
            target.num = source.num.clone();
            target.notes = source.notes.clone();
            target.currency = source.currency.clone();
        }

        for s in &source.splits {
            let Some(body) = self.split(*s).cloned() else {
                continue;
            };
            let copy = self.create_split(to)?;
            {
                let split = self.split_mut(copy)?;
                split.memo = body.memo;
                split.action = body.action;
                split.value = body.value;
                split.amount = body.amount;
                split.reconcile = ReconcileState::Unreconciled;
            }
            self.set_split_account(copy, body.account)?;
        }

        Ok(())
    }
}

impl Default for Book {
    fn default() -> Self {
        Self::new(Commodity::usd())
    }
}
