//! The local side of a backup: walking a directory tree, computing the tree
//! hash of every file, and writing restored content back.

pub mod error;
mod file;
pub mod hash;
mod path;
mod volume;

pub use crate::file::VolumeFile;
pub use crate::hash::{tree_hash, tree_hash_of};
pub use crate::path::validate as validate_path;
pub use crate::volume::Volume;
