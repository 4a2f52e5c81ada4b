//! The change index.
//!
//! Records which file contents have been archived and under which archive id,
//! and diffs a live tree against that record to produce [`Changes`](cairn_model::Changes).
//!
//! State is an append-only JSON line log replayed on load (see [`DurableCommitter`]).
//! In-memory indexes use [`NullCommitter`] and persist nothing.

mod committer;
mod entry;
pub mod error;
mod index;
mod log;

pub use crate::committer::{Committer, NullCommitter};
pub use crate::entry::Entry;
pub use crate::index::{ChangeCommitter, Index};
pub use crate::log::DurableCommitter;
