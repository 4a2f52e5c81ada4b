use cairn_model::{Hashed, Identifiable};
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// A committed fact: this content was archived under this id.
///
/// Entries are only produced by commits and by replaying the log; nothing
/// mutates them afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub(crate) path: String,
    pub(crate) hash: String,
    pub(crate) archive_id: String,
    pub(crate) recorded_at: OffsetDateTime,
}
impl Entry {
    /// Create an entry recorded now.
    ///
    /// Intended for building in-memory indexes with [`Index::new`](crate::Index::new).
    pub fn new(path: impl Into<String>, hash: impl Into<String>, archive_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            hash: hash.into(),
            archive_id: archive_id.into(),
            recorded_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn recorded_at(&self) -> OffsetDateTime {
        self.recorded_at
    }
}
impl Hashed for Entry {
    fn path(&self) -> &str {
        &self.path
    }

    fn hash(&self) -> &str {
        &self.hash
    }
}
impl Identifiable for Entry {
    fn archive_id(&self) -> &str {
        &self.archive_id
    }
}

/// Materialized index state: every path with its entries in commit order.
///
/// A [`BTreeMap`] keeps iteration (and therefore diff output) deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Entries(BTreeMap<String, Vec<Entry>>);
impl Entries {
    pub(crate) fn add(&mut self, entry: Entry) {
        self.0.entry(entry.path.clone()).or_default().push(entry);
    }

    pub(crate) fn has_entry_with_hash(&self, path: &str, hash: &str) -> bool {
        self.has_entry_matching(path, |e| e.hash == hash)
    }

    pub(crate) fn has_entry_with_archive_id(&self, path: &str, archive_id: &str) -> bool {
        self.has_entry_matching(path, |e| e.archive_id == archive_id)
    }

    fn has_entry_matching(&self, path: &str, filter: impl Fn(&Entry) -> bool) -> bool {
        self.0.get(path).is_some_and(|entries| entries.iter().any(filter))
    }

    /// Removes every entry under `path` carrying `archive_id`.
    ///
    /// A path left without entries is dropped entirely so that replaying a
    /// log of matching adds and deletes ends in the empty state.
    pub(crate) fn remove_by_archive_id(&mut self, path: &str, archive_id: &str) {
        let Some(entries) = self.0.get_mut(path) else {
            return;
        };
        entries.retain(|e| e.archive_id != archive_id);
        if entries.is_empty() {
            self.0.remove(path);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.0.clear();
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.0.values().flatten()
    }

    pub(crate) fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }
}
impl FromIterator<Entry> for Entries {
    fn from_iter<T: IntoIterator<Item = Entry>>(iter: T) -> Self {
        let mut entries = Self::default();
        for entry in iter {
            entries.add(entry);
        }
        entries
    }
}
