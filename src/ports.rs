// 🔌 Ports - what the register asks of the outside world
//
// ConfirmationPort: synchronous questions to the user (modal round-trips).
// PresentationEvent: what the register tells a display layer after it changes.

use rust_decimal::Decimal;

use crate::entities::TransId;
use crate::table::VirtualLocation;

// ============================================================================
// CONFIRMATION
// ============================================================================

/// How to resolve an unbalanced transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceChoice {
    /// Leave it for the user to fix; the cursor stays on the transaction
    Manual,
    /// Add an adjusting split to the imbalance account
    AutoAdjust,
    /// Adjust the split in the register's own account
    AdjustCurrent,
    /// Adjust the split in the other account of a two-account transaction
    AdjustOther,
}

/// Answer to "the current transaction has changed, record it?"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitChoice {
    Commit,
    Discard,
    Cancel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BalancePrompt {
    pub trans: TransId,
    pub description: String,
    pub imbalance: Decimal,
    pub currency: String,
    /// Choices valid for this transaction and register, in display order
    pub choices: Vec<BalanceChoice>,
}

pub trait ConfirmationPort {
    fn ask_balance_choice(&mut self, prompt: &BalancePrompt) -> BalanceChoice;

    fn ask_commit_or_discard(&mut self) -> CommitChoice;

    /// Changing reconciled history defaults to "no"
    fn confirm_reconciled_change(&mut self) -> bool {
        false
    }

    /// Leaving a transfer cell naming an unknown account
    fn confirm_create_account(&mut self, _full_name: &str) -> bool {
        false
    }
}

/// Port used when nobody can answer: never changes anything on its own
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclineAll;

impl ConfirmationPort for DeclineAll {
    fn ask_balance_choice(&mut self, _prompt: &BalancePrompt) -> BalanceChoice {
        BalanceChoice::Manual
    }

    fn ask_commit_or_discard(&mut self) -> CommitChoice {
        CommitChoice::Cancel
    }
}

// ============================================================================
// PRESENTATION
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum PresentationEvent {
    CursorMoved(VirtualLocation),
    HelpTextChanged(String),
    TableResized { rows: usize, cols: usize },
}

pub type PresentationListener = Box<dyn FnMut(&PresentationEvent)>;

// ============================================================================
// SCRIPTED PORT (tests)
// ============================================================================

#[cfg(test)]
pub(crate) mod scripted {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    #[derive(Debug, Default)]
    pub struct Script {
        pub balance: VecDeque<BalanceChoice>,
        pub commit: VecDeque<CommitChoice>,
        pub reconcile: VecDeque<bool>,
        pub create_account: VecDeque<bool>,
        pub balance_prompts: Vec<BalancePrompt>,
        pub commit_prompts: usize,
        pub reconcile_prompts: usize,
        pub create_prompts: Vec<String>,
    }

    /// Canned answers; every question is recorded. Unscripted questions decline.
    #[derive(Debug, Clone, Default)]
    pub struct ScriptedConfirmation {
        pub script: Rc<RefCell<Script>>,
    }

    impl ScriptedConfirmation {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn balance(&self, choice: BalanceChoice) -> &Self {
            self.script.borrow_mut().balance.push_back(choice);
            self
        }

        pub fn commit(&self, choice: CommitChoice) -> &Self {
            self.script.borrow_mut().commit.push_back(choice);
            self
        }

        pub fn reconcile(&self, answer: bool) -> &Self {
            self.script.borrow_mut().reconcile.push_back(answer);
            self
        }

        pub fn create_account(&self, answer: bool) -> &Self {
            self.script.borrow_mut().create_account.push_back(answer);
            self
        }

        pub fn balance_prompts(&self) -> Vec<BalancePrompt> {
            self.script.borrow().balance_prompts.clone()
        }

        pub fn commit_prompts(&self) -> usize {
            self.script.borrow().commit_prompts
        }

        pub fn reconcile_prompts(&self) -> usize {
            self.script.borrow().reconcile_prompts
        }
    }

    impl ConfirmationPort for ScriptedConfirmation {
        fn ask_balance_choice(&mut self, prompt: &BalancePrompt) -> BalanceChoice {
            let mut script = self.script.borrow_mut();
            script.balance_prompts.push(prompt.clone());
            script.balance.pop_front().unwrap_or(BalanceChoice::Manual)
        }

        fn ask_commit_or_discard(&mut self) -> CommitChoice {
            let mut script = self.script.borrow_mut();
            script.commit_prompts += 1;
            script.commit.pop_front().unwrap_or(CommitChoice::Cancel)
        }

        fn confirm_reconciled_change(&mut self) -> bool {
            let mut script = self.script.borrow_mut();
            script.reconcile_prompts += 1;
            script.reconcile.pop_front().unwrap_or(false)
        }

        fn confirm_create_account(&mut self, full_name: &str) -> bool {
            let mut script = self.script.borrow_mut();
            script.create_prompts.push(full_name.to_string());
            script.create_account.pop_front().unwrap_or(false)
        }
    }
}
