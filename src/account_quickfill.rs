// 🗂️ Account QuickFill - completion over full account names
//
// One cache per book, sorted alphabetically. Placeholder accounts are not
// offered since they cannot hold splits.

use unicode_normalization::UnicodeNormalization;

use crate::entities::Book;
use crate::quickfill::{QuickFill, QuickFillSort};

#[derive(Debug, Clone)]
pub struct AccountQuickFill {
    qf: QuickFill,
    separator: char,
}

impl AccountQuickFill {
    pub fn new(separator: char) -> Self {
        AccountQuickFill {
            qf: QuickFill::new(),
            separator,
        }
    }

    /// Build from the book's current account tree
    pub fn from_book(book: &Book, separator: char) -> Self {
        let mut cache = Self::new(separator);
        cache.rebuild(book);
        cache
    }

    /// Purge and reload; called after accounts are added or renamed
    pub fn rebuild(&mut self, book: &Book) {
        self.qf.purge();

        for (id, account) in book.accounts() {
            if account.placeholder {
                continue;
            }
            let name = book.full_name(id, self.separator);
            self.qf.insert(&name, QuickFillSort::Alpha);
        }
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    pub fn quickfill(&self) -> &QuickFill {
        &self.qf
    }

    /// Best full completion of what was typed
    pub fn complete(&self, typed: &str) -> Option<String> {
        self.qf.match_prefix(typed)?.text().map(str::to_string)
    }

    /// Complete only as far as every candidate agrees, e.g. when the
    /// separator key is pressed.
    pub fn unique_completion(&self, typed: &str) -> Option<String> {
        let node = self.qf.match_prefix(typed)?;
        let (deepest, extra) = node.unique_completion();
        let text = deepest.text()?;
        // the trie walked the composed form of what was typed
        let keep = typed.nfc().count() + extra;

        Some(text.chars().take(keep).collect())
    }
}
