//! Where commits go once they have been accepted by the [`Index`](crate::Index).

use crate::entry::Entry;
use crate::error::Result;

/// Persistence capability behind an [`Index`](crate::Index).
///
/// Chosen once when the index is constructed. Every method is called
/// *before* the in-memory state changes, so a failure leaves memory and
/// storage agreeing with each other.
pub trait Committer: Send + Sync {
    /// Record that `entry` was added.
    fn add(&self, entry: &Entry) -> Result<()>;
    /// Record that every entry under `entry.path` with `entry.archive_id`
    /// was removed.
    fn remove(&self, entry: &Entry) -> Result<()>;
    /// Forget everything.
    fn clear(&self) -> Result<()>;
}

/// Committer that persists nothing.
///
/// Used for in-memory indexes (tests, dry runs).
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCommitter;
impl Committer for NullCommitter {
    fn add(&self, _entry: &Entry) -> Result<()> {
        Ok(())
    }

    fn remove(&self, _entry: &Entry) -> Result<()> {
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        Ok(())
    }
}
