use crate::file::{Hashed, Identifiable};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommitKind {
    Added,
    Deleted,
}
impl fmt::Display for CommitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Added => "added",
            Self::Deleted => "deleted",
        })
    }
}

/// Outcome of a successful commit to the index.
///
/// Returned rather than recorded anywhere, so the caller decides whether it
/// becomes a log line, a counter, or nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitEvent {
    pub kind: CommitKind,
    pub path: String,
    pub hash: String,
    pub archive_id: String,
}
impl CommitEvent {
    pub fn new(kind: CommitKind, archive_id: &str, file: &(impl Hashed + ?Sized)) -> Self {
        Self {
            kind,
            path: file.path().to_string(),
            hash: file.hash().to_string(),
            archive_id: archive_id.to_string(),
        }
    }
}
impl Hashed for CommitEvent {
    fn path(&self) -> &str {
        &self.path
    }

    fn hash(&self) -> &str {
        &self.hash
    }
}
impl Identifiable for CommitEvent {
    fn archive_id(&self) -> &str {
        &self.archive_id
    }
}
