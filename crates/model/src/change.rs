use crate::file::{ContentHandle, Hashed, Identifiable, IdentifiableHashedFile};
use std::fmt;

/// A live file that the index does not know in its current form.
#[derive(Clone)]
pub struct FileAdded(pub ContentHandle);
impl Hashed for FileAdded {
    fn path(&self) -> &str {
        self.0.path()
    }

    fn hash(&self) -> &str {
        self.0.hash()
    }
}
impl fmt::Debug for FileAdded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileAdded").field("path", &self.path()).field("hash", &self.hash()).finish()
    }
}
impl fmt::Display for FileAdded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{added: {{{} {}}}}}", self.path(), self.hash())
    }
}
impl PartialEq for FileAdded {
    fn eq(&self, other: &Self) -> bool {
        self.path() == other.path() && self.hash() == other.hash()
    }
}

/// An index entry that no longer matches any live file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDeleted(pub IdentifiableHashedFile);
impl Hashed for FileDeleted {
    fn path(&self) -> &str {
        self.0.path()
    }

    fn hash(&self) -> &str {
        self.0.hash()
    }
}
impl Identifiable for FileDeleted {
    fn archive_id(&self) -> &str {
        self.0.archive_id()
    }
}
impl fmt::Display for FileDeleted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{deleted: {{{} {} | {}}}}}", self.path(), self.hash(), self.archive_id())
    }
}

/// A batch of changes produced by diffing a live tree against the index.
///
/// Ordering between the two lists carries no meaning; ordering within each
/// list is whatever the diff produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changes {
    pub additions: Vec<FileAdded>,
    pub deletions: Vec<FileDeleted>,
}
impl Changes {
    pub fn append(&mut self, other: Changes) {
        self.additions.extend(other.additions);
        self.deletions.extend(other.deletions);
    }

    pub fn len(&self) -> usize {
        self.additions.len() + self.deletions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.deletions.is_empty()
    }
}
impl fmt::Display for Changes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
            write!(f, "[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{item}")?;
            }
            write!(f, "]")
        }
        write!(f, "{{added: ")?;
        list(f, &self.additions)?;
        write!(f, ", deleted: ")?;
        list(f, &self.deletions)?;
        write!(f, "}}")
    }
}
