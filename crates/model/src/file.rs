//! File identity and content access.

use async_trait::async_trait;
use std::fmt;
use std::io::{Cursor, Result as IoResult};
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::AsyncRead;

/// Owned, `'static` async reader over some file content.
pub type BoxAsyncRead = Pin<Box<dyn AsyncRead + Send + 'static>>;

/// Shared handle to a live file, as produced by a volume walk.
pub type ContentHandle = Arc<dyn FileWithContent>;

/// A relative path paired with the tree hash of its content.
///
/// The hash is a lowercase hex string. An empty string is a valid hash: it is
/// what empty content hashes to, and such files are tracked but never
/// uploaded.
pub trait Hashed {
    fn path(&self) -> &str;
    fn hash(&self) -> &str;
}

/// A [`Hashed`] file that has been (or deliberately was not) archived
/// remotely.
///
/// An empty archive id means no remote archive exists for this file.
pub trait Identifiable: Hashed {
    fn archive_id(&self) -> &str;
}

/// A [`Hashed`] file whose bytes can be read.
///
/// Opening is lazy: implementations should not touch the disk or the network
/// until [`content()`](Self::content) is called, and every call returns a
/// fresh reader positioned at the start.
#[async_trait]
pub trait FileWithContent: Hashed + Send + Sync {
    async fn content(&self) -> IoResult<BoxAsyncRead>;

    /// File on local disk holding exactly this content, if there is one.
    ///
    /// Uploads stream straight from it (and can re-read it on retry) instead
    /// of going through [`content()`](Self::content).
    fn local_path(&self) -> Option<&Path> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HashedFile {
    path: String,
    hash: String,
}
impl HashedFile {
    pub fn new(path: impl Into<String>, hash: impl Into<String>) -> Self {
        Self { path: path.into(), hash: hash.into() }
    }

    pub fn with_archive_id(self, archive_id: impl Into<String>) -> IdentifiableHashedFile {
        IdentifiableHashedFile {
            path: self.path,
            hash: self.hash,
            archive_id: archive_id.into(),
        }
    }
}
impl Hashed for HashedFile {
    fn path(&self) -> &str {
        &self.path
    }

    fn hash(&self) -> &str {
        &self.hash
    }
}
impl fmt::Display for HashedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{} {}}}", self.path, self.hash)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentifiableHashedFile {
    path: String,
    hash: String,
    archive_id: String,
}
impl IdentifiableHashedFile {
    pub fn new(path: impl Into<String>, hash: impl Into<String>, archive_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            hash: hash.into(),
            archive_id: archive_id.into(),
        }
    }

    /// Copy the identity out of anything [`Identifiable`].
    pub fn of(file: &(impl Identifiable + ?Sized)) -> Self {
        Self::new(file.path(), file.hash(), file.archive_id())
    }

    /// Drop the archive id.
    pub fn to_hashed(&self) -> HashedFile {
        HashedFile::new(&self.path, &self.hash)
    }
}
impl Hashed for IdentifiableHashedFile {
    fn path(&self) -> &str {
        &self.path
    }

    fn hash(&self) -> &str {
        &self.hash
    }
}
impl Identifiable for IdentifiableHashedFile {
    fn archive_id(&self) -> &str {
        &self.archive_id
    }
}
impl fmt::Display for IdentifiableHashedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{} {} | {}}}", self.path, self.hash, self.archive_id)
    }
}

/// In-memory [`FileWithContent`].
///
/// Not gated behind `#[cfg(test)]` so other crates can use it in their tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryFile {
    file: HashedFile,
    data: Arc<[u8]>,
}
impl MemoryFile {
    pub fn new(path: impl Into<String>, hash: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            file: HashedFile::new(path, hash),
            data: data.into().into(),
        }
    }

    pub fn into_handle(self) -> ContentHandle {
        Arc::new(self)
    }
}
impl Hashed for MemoryFile {
    fn path(&self) -> &str {
        self.file.path()
    }

    fn hash(&self) -> &str {
        self.file.hash()
    }
}
#[async_trait]
impl FileWithContent for MemoryFile {
    async fn content(&self) -> IoResult<BoxAsyncRead> {
        Ok(Box::pin(Cursor::new(self.data.to_vec())))
    }
}
