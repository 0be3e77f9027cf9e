// 💾 QuickFill Store - remembered completions across sessions
//
// A plain load/save pair keyed by cache name. The SQLite store mirrors the
// way the rest of the tool keeps local state (WAL mode, one table).

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::path::Path;

use crate::quickfill::{QuickFill, QuickFillSort};

pub trait QuickFillStore {
    /// Entries saved under `key`, oldest first
    fn load(&self, key: &str) -> Result<Vec<String>>;

    /// Replace everything saved under `key`
    fn save(&mut self, key: &str, entries: &[String]) -> Result<()>;
}

/// Seed a trie from a store
pub fn seed(qf: &mut QuickFill, store: &dyn QuickFillStore, key: &str, sort: QuickFillSort) -> Result<usize> {
    let entries = store.load(key)?;
    for entry in &entries {
        qf.insert(entry, sort);
    }
    Ok(entries.len())
}

/// Flush a trie's candidates into a store
pub fn flush(qf: &QuickFill, store: &mut dyn QuickFillStore, key: &str) -> Result<usize> {
    let entries = qf.candidates();
    store.save(key, &entries)?;
    Ok(entries.len())
}

// ============================================================================
// SQLITE STORE
// ============================================================================

pub struct SqliteQuickFillStore {
    conn: Connection,
}

impl SqliteQuickFillStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open quickfill store: {:?}", path))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS quickfill_entries (
                cache_key TEXT NOT NULL,
                position INTEGER NOT NULL,
                entry TEXT NOT NULL,
                PRIMARY KEY (cache_key, position)
            )",
            [],
        )
        .context("Failed to create quickfill_entries table")?;

        Ok(SqliteQuickFillStore { conn })
    }
}

impl QuickFillStore for SqliteQuickFillStore {
    fn load(&self, key: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT entry FROM quickfill_entries WHERE cache_key = ?1 ORDER BY position")?;

        let rows = stmt.query_map(params![key], |row| row.get::<_, String>(0))?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    fn save(&mut self, key: &str, entries: &[String]) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM quickfill_entries WHERE cache_key = ?1", params![key])?;

        for (position, entry) in entries.iter().enumerate() {
            tx.execute(
                "INSERT INTO quickfill_entries (cache_key, position, entry) VALUES (?1, ?2, ?3)",
                params![key, position as i64, entry],
            )?;
        }

        tx.commit().context("Failed to save quickfill entries")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load() {
        let mut store = SqliteQuickFillStore::in_memory().unwrap();
        store.save("description", &["Rent".to_string(), "Coffee".to_string()]).unwrap();
        store.save("memo", &["tip".to_string()]).unwrap();

        assert_eq!(store.load("description").unwrap(), vec!["Rent", "Coffee"]);
        assert_eq!(store.load("memo").unwrap(), vec!["tip"]);
        assert!(store.load("notes").unwrap().is_empty());

        // save replaces
        store.save("memo", &[]).unwrap();
        assert!(store.load("memo").unwrap().is_empty());
    }

    #[test]
    fn test_seed_and_flush() {
        let mut store = SqliteQuickFillStore::in_memory().unwrap();

        let mut qf = QuickFill::new();
        qf.insert("Groceries", QuickFillSort::Lifo);
        qf.insert("Gas", QuickFillSort::Lifo);
        assert_eq!(flush(&qf, &mut store, "description").unwrap(), 2);

        let mut restored = QuickFill::new();
        assert_eq!(seed(&mut restored, &store, "description", QuickFillSort::Lifo).unwrap(), 2);
        assert_eq!(restored.match_prefix("gr").unwrap().text(), Some("Groceries"));
        assert_eq!(restored.match_prefix("ga").unwrap().text(), Some("Gas"));
    }
}
