//! Shared value types for cairn.
//!
//! Everything that crosses a crate boundary between the index, the volume and
//! the archive connection lives here:
//!
//! - **Identity**: [`Hashed`] (a path with a content hash) and
//!   [`Identifiable`] (additionally carrying the remote archive id), plus the
//!   owned value types [`HashedFile`] and [`IdentifiableHashedFile`].
//! - **Content**: [`FileWithContent`], anything that can hand out an async
//!   reader over its bytes (a file on disk, a retrieved archive, a buffer).
//! - **Changes**: the result of diffing a live tree against the index.
//! - **Events**: structured outcomes of commits, for whoever wants to observe
//!   them (logging, counters) without the core holding global state.

mod change;
mod event;
mod file;

pub use crate::change::{Changes, FileAdded, FileDeleted};
pub use crate::event::{CommitEvent, CommitKind};
pub use crate::file::{
    BoxAsyncRead, ContentHandle, FileWithContent, Hashed, HashedFile, Identifiable, IdentifiableHashedFile, MemoryFile,
};
