//! Access-count history used to rank list items.
//!
//! The file is a flat JSON object mapping item id to a count. A missing or
//! empty file means "no history".

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::page::ListItem;
use crate::io::config::write_atomic;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    entries: BTreeMap<String, i64>,
    path: PathBuf,
}

impl History {
    /// History that is never read from disk, for sessions without a history file.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            entries: BTreeMap::new(),
            path: path.into(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading history");
        if !path.exists() {
            return Ok(Self::empty(path));
        }
        let contents =
            fs::read_to_string(path).with_context(|| format!("read history {}", path.display()))?;
        let entries = if contents.trim().is_empty() {
            BTreeMap::new()
        } else {
            serde_json::from_str(&contents)
                .with_context(|| format!("parse history {}", path.display()))?
        };
        Ok(Self {
            entries,
            path: path.to_path_buf(),
        })
    }

    /// Atomically write the whole map, creating parent directories on first write.
    pub fn save(&self) -> Result<()> {
        debug!(path = %self.path.display(), entries = self.entries.len(), "writing history");
        let mut buf = serde_json::to_string_pretty(&self.entries)?;
        buf.push('\n');
        write_atomic(&self.path, &buf)
    }

    pub fn update(&mut self, id: &str) {
        *self.entries.entry(id.to_string()).or_insert(0) += 1;
    }

    /// Count for `id`; unseen ids count as zero.
    pub fn count(&self, id: &str) -> i64 {
        self.entries.get(id).copied().unwrap_or(0)
    }

    pub fn entries(&self) -> &BTreeMap<String, i64> {
        &self.entries
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stable sort by descending count: ties keep their input order.
    pub fn sort(&self, items: &mut [ListItem]) {
        items.sort_by_key(|item| Reverse(self.count(&item.id)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(items: &[ListItem]) -> Vec<&str> {
        items.iter().map(|item| item.id.as_str()).collect()
    }

    fn items(ids: &[&str]) -> Vec<ListItem> {
        ids.iter()
            .map(|id| ListItem {
                id: (*id).to_string(),
                title: id.to_uppercase(),
                ..ListItem::default()
            })
            .collect()
    }

    #[test]
    fn equal_counts_keep_input_order() {
        let mut history = History::empty("unused.json");
        for (id, count) in [("a", 5), ("b", 5), ("c", 1)] {
            for _ in 0..count {
                history.update(id);
            }
        }
        let mut list = items(&["b", "c", "a"]);
        history.sort(&mut list);
        assert_eq!(ids(&list), vec!["b", "a", "c"]);
    }

    #[test]
    fn unseen_items_sort_last() {
        let mut history = History::empty("unused.json");
        history.update("z");
        let mut list = items(&["x", "y", "z"]);
        history.sort(&mut list);
        assert_eq!(ids(&list), vec!["z", "x", "y"]);
    }

    #[test]
    fn missing_and_empty_files_load_as_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let missing = History::load(&temp.path().join("none.json")).expect("missing");
        assert!(missing.entries().is_empty());

        let empty_path = temp.path().join("empty.json");
        fs::write(&empty_path, "").expect("write");
        let empty = History::load(&empty_path).expect("empty");
        assert!(empty.entries().is_empty());
    }

    #[test]
    fn save_creates_parents_and_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("state").join("history.json");
        let mut history = History::empty(&path);
        history.update("gh:Search");
        history.update("gh:Search");
        history.update("notes:New");
        history.save().expect("save");

        let loaded = History::load(&path).expect("load");
        assert_eq!(loaded, history);
        assert_eq!(loaded.count("gh:Search"), 2);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("history.json");
        fs::write(&path, "[1, 2]").expect("write");
        assert!(History::load(&path).is_err());
    }
}
