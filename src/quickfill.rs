// ⚡ QuickFill - prefix trie for fast data entry
//
// Every node keeps one candidate completion for the prefix that leads to it.
// Lookup keys are folded to uppercase, candidates keep their original case.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// SORT POLICY
// ============================================================================

/// Which candidate a node keeps when several inserted strings share its prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QuickFillSort {
    /// Most recent insert wins, unless the stored candidate is a prefix of it
    #[default]
    Lifo,

    /// Lexicographically first candidate wins
    Alpha,
}

// ============================================================================
// TRIE NODE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct QuickFill {
    text: Option<String>,
    len: usize,
    matches: HashMap<char, QuickFill>,
}

impl QuickFill {
    pub fn new() -> Self {
        Self::default()
    }

    /// Best completion stored at this node
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Length of `text()` in characters
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.matches.is_empty()
    }

    pub fn child_count(&self) -> usize {
        self.matches.len()
    }

    /// Child node for one character, case-insensitively
    pub fn char_match(&self, ch: char) -> Option<&QuickFill> {
        self.matches.get(&fold_key(ch))
    }

    pub fn match_prefix(&self, text: &str) -> Option<&QuickFill> {
        self.match_prefix_len(text, usize::MAX)
    }

    /// Walk at most `max_len` characters of `text`
    pub fn match_prefix_len(&self, text: &str, max_len: usize) -> Option<&QuickFill> {
        let normalized: String = text.nfc().collect();
        let mut node = self;

        for ch in normalized.chars().take(max_len) {
            node = node.char_match(ch)?;
        }

        Some(node)
    }

    /// Follow single-child chains; returns the deepest unambiguous node and
    /// the number of characters consumed on the way down.
    pub fn unique_completion(&self) -> (&QuickFill, usize) {
        let mut node = self;
        let mut extra = 0;

        while node.matches.len() == 1 {
            match node.matches.values().next() {
                Some(child) => node = child,
                None => break,
            }
            extra += 1;
        }

        (node, extra)
    }

    pub fn insert(&mut self, text: &str, sort: QuickFillSort) {
        let normalized: String = text.nfc().collect();
        if normalized.is_empty() {
            return;
        }

        let len = normalized.chars().count();
        let mut node = self;

        for ch in normalized.chars() {
            node = node.matches.entry(fold_key(ch)).or_default();
            node.offer(&normalized, len, sort);
        }
    }

    /// Drop every candidate and child; the node stays usable
    pub fn purge(&mut self) {
        self.matches.clear();
        self.text = None;
        self.len = 0;
    }

    /// Distinct candidates stored anywhere below this node, sorted
    pub fn candidates(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack = vec![self];

        while let Some(node) = stack.pop() {
            if let Some(text) = &node.text {
                out.push(text.clone());
            }
            stack.extend(node.matches.values());
        }

        out.sort();
        out.dedup();
        out
    }

    fn offer(&mut self, text: &str, len: usize, sort: QuickFillSort) {
        let keep_old = match &self.text {
            None => false,
            Some(old) => {
                let alpha_keeps = sort == QuickFillSort::Alpha && collate(text, old) != Ordering::Less;
                // a stored prefix of the new string is never displaced
                alpha_keeps || (len > self.len && text.starts_with(old.as_str()))
            }
        };

        if !keep_old {
            self.text = Some(text.to_string());
            self.len = len;
        }
    }
}

fn fold_key(ch: char) -> char {
    let mut upper = ch.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(single), None) => single,
        _ => ch,
    }
}

fn collate(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}
