use crate::committer::{Committer, NullCommitter};
use crate::entry::{Entries, Entry};
use crate::error::{ErrorKind, Result};
use crate::log::DurableCommitter;
use cairn_model::{
    Changes, CommitEvent, CommitKind, ContentHandle, FileAdded, FileDeleted, Hashed, IdentifiableHashedFile,
};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::instrument;

/// Anything that accepts commits of archived (or removed) content.
///
/// The seam between the change processor and the index: the processor only
/// needs to commit, never to query.
pub trait ChangeCommitter: Send {
    fn commit_add(&mut self, archive_id: &str, file: &dyn Hashed) -> Result<CommitEvent>;
    fn commit_delete(&mut self, archive_id: &str, file: &dyn Hashed) -> Result<CommitEvent>;
}

/// Tracks which file contents have been archived, and under which id.
///
/// The in-memory state is always what replaying the committer's log from
/// empty would produce: every commit is persisted first and applied to
/// memory second. Commits take `&mut self`, so there is exactly one writer.
pub struct Index {
    committer: Box<dyn Committer>,
    entries: Entries,
}
impl Index {
    /// Build an in-memory index that persists nothing.
    pub fn new(entries: impl IntoIterator<Item = Entry>) -> Self {
        Self::with_committer(NullCommitter, entries)
    }

    /// Build an index over an arbitrary committer, seeded with `entries`.
    ///
    /// The seed entries are *not* passed to the committer.
    pub fn with_committer(committer: impl Committer + 'static, entries: impl IntoIterator<Item = Entry>) -> Self {
        Self {
            committer: Box::new(committer),
            entries: entries.into_iter().collect(),
        }
    }

    /// Load the index log at `path`, creating an empty one if it is missing.
    ///
    /// Fails with [`CorruptLog`](ErrorKind::CorruptLog) on the first line that
    /// cannot be decoded; nothing is recovered from a damaged log.
    #[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let committer = DurableCommitter::new(path.as_ref());
        let entries = committer.replay()?;
        Ok(Self {
            committer: Box::new(committer),
            entries,
        })
    }

    /// Diff the live files against the index.
    ///
    /// - A live file is an **addition** unless some entry for its path has
    ///   the same hash.
    /// - Every entry is a **deletion** unless the live file at its path has
    ///   the same hash. This is evaluated per entry: a path holding several
    ///   stale entries yields one deletion each, and a modified file yields a
    ///   deletion of the old entry alongside the addition of the new content.
    pub fn calculate_changes(&self, files: &[ContentHandle]) -> Changes {
        tracing::debug!(files = files.len(), entries = self.entries.len(), "Calculating changes");
        let mut changes = Changes::default();
        let mut live: HashMap<&str, &str> = HashMap::with_capacity(files.len());
        for file in files {
            live.insert(file.path(), file.hash());
            if self.is_changed(file.as_ref()) {
                changes.additions.push(FileAdded(file.clone()));
            }
        }
        for entry in self.entries.iter() {
            if live.get(entry.path.as_str()) != Some(&entry.hash.as_str()) {
                changes.deletions.push(FileDeleted(IdentifiableHashedFile::of(entry)));
            }
        }
        tracing::debug!(
            added = changes.additions.len(),
            deleted = changes.deletions.len(),
            "Calculated changes"
        );
        changes
    }

    /// `true` if no entry for the file's path carries the file's hash.
    pub fn is_changed(&self, file: &(impl Hashed + ?Sized)) -> bool {
        !self.entries.has_entry_with_hash(file.path(), file.hash())
    }

    /// Record that `file` was archived as `archive_id`.
    ///
    /// Committing the same non-empty `(path, archive_id)` twice fails with
    /// [`DuplicateChange`](ErrorKind::DuplicateChange) and changes nothing.
    /// Empty archive ids are not unique, so they skip that check.
    pub fn commit_add(&mut self, archive_id: &str, file: &(impl Hashed + ?Sized)) -> Result<CommitEvent> {
        tracing::debug!(path = file.path(), archive_id, "Committing add");
        if !archive_id.is_empty() && self.entries.has_entry_with_archive_id(file.path(), archive_id) {
            exn::bail!(ErrorKind::DuplicateChange {
                path: file.path().to_string(),
                archive_id: archive_id.to_string(),
            });
        }
        let entry = Entry::new(file.path(), file.hash(), archive_id);
        self.committer.add(&entry)?;
        self.entries.add(entry);
        Ok(CommitEvent::new(CommitKind::Added, archive_id, file))
    }

    /// Record that the archive `archive_id` for `file` is gone.
    ///
    /// Entries are matched on path and archive id, never on hash. Fails with
    /// [`ChangeNotFound`](ErrorKind::ChangeNotFound) when nothing matches.
    pub fn commit_delete(&mut self, archive_id: &str, file: &(impl Hashed + ?Sized)) -> Result<CommitEvent> {
        tracing::debug!(path = file.path(), archive_id, "Committing delete");
        if !self.entries.has_entry_with_archive_id(file.path(), archive_id) {
            exn::bail!(ErrorKind::ChangeNotFound {
                path: file.path().to_string(),
                archive_id: archive_id.to_string(),
            });
        }
        let entry = Entry::new(file.path(), file.hash(), archive_id);
        self.committer.remove(&entry)?;
        self.entries.remove_by_archive_id(file.path(), archive_id);
        Ok(CommitEvent::new(CommitKind::Deleted, archive_id, file))
    }

    /// Forget every entry and truncate the log.
    pub fn clear(&mut self) -> Result<()> {
        tracing::debug!("Clearing index");
        self.committer.clear()?;
        self.entries.clear();
        Ok(())
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
impl fmt::Debug for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Index").field("entries", &self.entries).finish_non_exhaustive()
    }
}
impl ChangeCommitter for Index {
    fn commit_add(&mut self, archive_id: &str, file: &dyn Hashed) -> Result<CommitEvent> {
        Index::commit_add(self, archive_id, file)
    }

    fn commit_delete(&mut self, archive_id: &str, file: &dyn Hashed) -> Result<CommitEvent> {
        Index::commit_delete(self, archive_id, file)
    }
}
